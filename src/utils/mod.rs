//! Pure utility functions.
//!
//! Process bootstrap and retry policy shared by the binary and the ledger.

pub mod bootstrap;
pub mod retry;
