use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::money::Money;

/// Commission lifecycle of a sale.
///
/// ```text
/// pending --(ledger applied)--> payable --(payout completed)--> paid
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommissionStatus {
    Pending,
    Payable,
    Paid,
}

impl CommissionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CommissionStatus::Pending => "pending",
            CommissionStatus::Payable => "payable",
            CommissionStatus::Paid => "paid",
        }
    }

    /// Legal next states.
    pub fn successors(self) -> &'static [CommissionStatus] {
        match self {
            CommissionStatus::Pending => &[CommissionStatus::Payable],
            CommissionStatus::Payable => &[CommissionStatus::Paid],
            CommissionStatus::Paid => &[],
        }
    }

    pub fn can_transition_to(self, next: CommissionStatus) -> bool {
        self.successors().contains(&next)
    }

    pub fn transition_to(self, next: CommissionStatus) -> Result<CommissionStatus, LedgerError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(LedgerError::InvalidTransition {
                entity: "commission",
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }
}

impl fmt::Display for CommissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommissionStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CommissionStatus::Pending),
            "payable" => Ok(CommissionStatus::Payable),
            "paid" => Ok(CommissionStatus::Paid),
            other => Err(LedgerError::Decode(format!("unknown commission status: {other}"))),
        }
    }
}

/// A completed commission-bearing transaction.
///
/// `commission_rate` and `commission` are point-in-time facts captured at
/// ingestion; only `status` changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    pub id: Uuid,
    pub affiliate_id: Uuid,
    pub referral_id: Option<Uuid>,
    pub product_id: String,
    pub plan_name: String,
    pub sale_amount: Money,
    /// Effective percentage applied (base rate plus tier bonus).
    pub commission_rate: Decimal,
    pub commission: Money,
    pub status: CommissionStatus,
    pub transaction_ref: Option<String>,
    pub customer_ref: Option<String>,
    pub subscription_ref: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Inbound "sale occurred" event from the payment collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaleEvent {
    pub affiliate_code: String,
    pub product_id: String,
    /// External transaction reference; the idempotency key when present.
    #[serde(default)]
    pub transaction_ref: Option<String>,
    #[serde(default)]
    pub customer_ref: Option<String>,
    #[serde(default)]
    pub subscription_ref: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl SaleEvent {
    pub fn new(affiliate_code: impl Into<String>, product_id: impl Into<String>) -> Self {
        Self {
            affiliate_code: affiliate_code.into(),
            product_id: product_id.into(),
            ..Default::default()
        }
    }

    pub fn with_transaction_ref(mut self, transaction_ref: impl Into<String>) -> Self {
        self.transaction_ref = Some(transaction_ref.into());
        self
    }
}

/// Result of sale ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleReceipt {
    pub sale_id: Uuid,
    pub commission: Money,
    pub affiliate_code: String,
    pub referral_id: Option<Uuid>,
    /// True when the transaction reference had already been ingested; the
    /// receipt then describes the original sale and nothing was credited.
    pub already_processed: bool,
}

impl SaleReceipt {
    pub fn for_sale(sale: &Sale, affiliate_code: String, already_processed: bool) -> Self {
        Self {
            sale_id: sale.id,
            commission: sale.commission,
            affiliate_code,
            referral_id: sale.referral_id,
            already_processed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commission_transition_table() {
        use CommissionStatus::*;
        assert!(Pending.can_transition_to(Payable));
        assert!(Payable.can_transition_to(Paid));
        assert!(!Pending.can_transition_to(Paid));
        assert!(!Paid.can_transition_to(Payable));
        assert!(!Payable.can_transition_to(Payable));
    }

    #[test]
    fn test_illegal_transition_is_error() {
        let err = CommissionStatus::Paid
            .transition_to(CommissionStatus::Pending)
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InvalidTransition {
                from: "paid",
                to: "pending",
                ..
            }
        ));
    }
}
