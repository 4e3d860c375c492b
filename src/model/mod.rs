//! Ledger records.

mod affiliate;
mod aggregate;
mod payout;
mod product;
mod referral;
mod sale;

pub use affiliate::{normalize_code, AffiliateProfile, NewAffiliate, PayoutMethod};
pub use aggregate::{BalanceReport, MonthlyCommissionAggregate};
pub use payout::{PayoutDecision, PayoutRequest, PayoutStatus};
pub use product::{standard_products, ProductCatalog, ProductDefinition};
pub use referral::Referral;
pub use sale::{CommissionStatus, Sale, SaleEvent, SaleReceipt};
