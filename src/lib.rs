//! Affiliate ledger - referral attribution and commission accounting.
//!
//! Affiliates earn commission on subscription sales they refer. The crate
//! attributes sales to referral clicks, computes tier-adjusted commission,
//! maintains running balances and monthly rollups, and runs the payout
//! approval workflow. All state lives in SQLite; every mutation is a single
//! immediate transaction retried on lock contention.

pub mod commission;
pub mod config;
pub mod error;
pub mod grpc;
pub mod model;
pub mod money;
pub mod services;
pub mod storage;
pub mod tier;
pub mod utils;

pub mod proto {
    tonic::include_proto!("affiliate.ledger.v1");
}

pub use error::{LedgerError, Result};
pub use money::Money;
pub use services::Ledger;
