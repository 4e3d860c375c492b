use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::money::Money;
use crate::tier::Tier;

/// Longest accepted affiliate code.
const MAX_CODE_LEN: usize = 64;

/// Rail used to pay an affiliate out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutMethod {
    BankTransfer,
    Paypal,
    Pix,
}

impl PayoutMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PayoutMethod::BankTransfer => "bank_transfer",
            PayoutMethod::Paypal => "paypal",
            PayoutMethod::Pix => "pix",
        }
    }
}

impl fmt::Display for PayoutMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayoutMethod {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bank_transfer" => Ok(PayoutMethod::BankTransfer),
            "paypal" => Ok(PayoutMethod::Paypal),
            "pix" => Ok(PayoutMethod::Pix),
            other => Err(LedgerError::InvalidArgument(format!(
                "unknown payout method: {other}"
            ))),
        }
    }
}

/// Running ledger state of one affiliate.
///
/// `pending_balance` always equals `total_earned` minus the sum of completed
/// payouts. Profiles are deactivated, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffiliateProfile {
    pub id: Uuid,
    /// Lower-cased referral code.
    pub code: String,
    /// Base commission percentage by plan class.
    pub base_rates: BTreeMap<String, Decimal>,
    pub tier: Tier,
    pub tier_rank: u32,
    pub lifetime_sales: Money,
    pub total_conversions: u64,
    pub total_earned: Money,
    pub pending_balance: Money,
    pub payout_method: PayoutMethod,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AffiliateProfile {
    pub fn base_rate(&self, plan_class: &str) -> Option<Decimal> {
        self.base_rates.get(plan_class).copied()
    }
}

/// Registration input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAffiliate {
    pub code: String,
    pub base_rates: BTreeMap<String, Decimal>,
    pub payout_method: PayoutMethod,
    /// Administrative placement; defaults to the catalog's entry tier.
    #[serde(default)]
    pub initial_tier: Option<Tier>,
}

impl NewAffiliate {
    pub fn new(code: impl Into<String>, payout_method: PayoutMethod) -> Self {
        Self {
            code: code.into(),
            base_rates: BTreeMap::new(),
            payout_method,
            initial_tier: None,
        }
    }

    pub fn with_rate(mut self, plan_class: impl Into<String>, rate: Decimal) -> Self {
        self.base_rates.insert(plan_class.into(), rate);
        self
    }

    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.initial_tier = Some(tier);
        self
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        normalize_code(&self.code)?;
        for (plan_class, rate) in &self.base_rates {
            if plan_class.trim().is_empty() {
                return Err(LedgerError::InvalidArgument("empty plan class".into()));
            }
            if rate.is_sign_negative() || *rate > Decimal::ONE_HUNDRED {
                return Err(LedgerError::InvalidArgument(format!(
                    "rate for {plan_class} must be within 0..=100, got {rate}"
                )));
            }
        }
        Ok(())
    }
}

/// Canonical form of an affiliate code. Codes are matched case-insensitively.
pub fn normalize_code(code: &str) -> Result<String, LedgerError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(LedgerError::InvalidArgument("affiliate code is required".into()));
    }
    if code.len() > MAX_CODE_LEN {
        return Err(LedgerError::InvalidArgument(format!(
            "affiliate code longer than {MAX_CODE_LEN} characters"
        )));
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(LedgerError::InvalidArgument(format!(
            "affiliate code contains invalid characters: {code}"
        )));
    }
    Ok(code.to_ascii_lowercase())
}
