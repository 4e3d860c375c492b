use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Money;

/// Per-month reporting rollup, updated incrementally at ingestion.
///
/// Not used for payout gating; the affiliate's pending balance is authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyCommissionAggregate {
    pub affiliate_id: Uuid,
    pub year: i32,
    pub month: u32,
    pub sale_count: u64,
    pub sale_amount: Money,
    pub commission_earned: Money,
    pub commission_pending: Money,
}

impl MonthlyCommissionAggregate {
    pub fn empty(affiliate_id: Uuid, year: i32, month: u32) -> Self {
        Self {
            affiliate_id,
            year,
            month,
            sale_count: 0,
            sale_amount: Money::ZERO,
            commission_earned: Money::ZERO,
            commission_pending: Money::ZERO,
        }
    }
}

/// Balance reconciliation snapshot for one affiliate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceReport {
    pub affiliate_id: Uuid,
    pub total_earned: Money,
    pub paid_out: Money,
    pub pending_balance: Money,
}

impl BalanceReport {
    /// `total_earned - paid_out - pending_balance`; zero when the ledger is
    /// consistent, `None` if the difference does not fit in `Money`.
    pub fn drift(&self) -> Option<Money> {
        self.total_earned
            .checked_sub(self.paid_out)?
            .checked_sub(self.pending_balance)
    }

    pub fn is_consistent(&self) -> bool {
        self.drift() == Some(Money::ZERO) && !self.pending_balance.is_negative()
    }
}
