use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::money::Money;

use super::PayoutMethod;

/// Payout request state.
///
/// ```text
/// pending --approve--> completed
/// pending --reject---> rejected
/// ```
/// Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    Pending,
    Completed,
    Rejected,
}

impl PayoutStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PayoutStatus::Pending => "pending",
            PayoutStatus::Completed => "completed",
            PayoutStatus::Rejected => "rejected",
        }
    }

    pub fn successors(self) -> &'static [PayoutStatus] {
        match self {
            PayoutStatus::Pending => &[PayoutStatus::Completed, PayoutStatus::Rejected],
            PayoutStatus::Completed | PayoutStatus::Rejected => &[],
        }
    }

    pub fn is_terminal(self) -> bool {
        self.successors().is_empty()
    }

    pub fn can_transition_to(self, next: PayoutStatus) -> bool {
        self.successors().contains(&next)
    }

    pub fn transition_to(self, next: PayoutStatus) -> Result<PayoutStatus, LedgerError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(LedgerError::InvalidTransition {
                entity: "payout",
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayoutStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PayoutStatus::Pending),
            "completed" => Ok(PayoutStatus::Completed),
            "rejected" => Ok(PayoutStatus::Rejected),
            other => Err(LedgerError::Decode(format!("unknown payout status: {other}"))),
        }
    }
}

/// Operator decision on a pending payout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutDecision {
    Approve,
    Reject { reason: Option<String> },
}

impl PayoutDecision {
    pub fn target_status(&self) -> PayoutStatus {
        match self {
            PayoutDecision::Approve => PayoutStatus::Completed,
            PayoutDecision::Reject { .. } => PayoutStatus::Rejected,
        }
    }
}

/// One withdrawal attempt against an affiliate's pending balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutRequest {
    pub id: Uuid,
    pub affiliate_id: Uuid,
    pub amount: Money,
    pub method: PayoutMethod,
    pub status: PayoutStatus,
    pub rejection_reason: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payout_transition_table() {
        use PayoutStatus::*;
        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Rejected));
        for terminal in [Completed, Rejected] {
            assert!(terminal.is_terminal());
            for next in [Pending, Completed, Rejected] {
                assert!(terminal.transition_to(next).is_err());
            }
        }
    }

    #[test]
    fn test_decision_targets() {
        assert_eq!(PayoutDecision::Approve.target_status(), PayoutStatus::Completed);
        assert_eq!(
            PayoutDecision::Reject { reason: None }.target_status(),
            PayoutStatus::Rejected
        );
    }
}
