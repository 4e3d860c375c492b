//! SQLite repositories.
//!
//! Free functions over a borrowed `SqliteConnection` so that a service can
//! run several of them inside one `BEGIN IMMEDIATE` transaction.

pub mod affiliates;
pub mod aggregates;
pub mod payouts;
pub mod referrals;
pub mod sales;
