//! Affiliate tiers.
//!
//! The catalog is static configuration, ordered by display order, with
//! thresholds that strictly increase from one tier to the next. Tier
//! selection picks the highest tier whose sales and conversion thresholds
//! are both met; promotion never moves an affiliate backwards.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::money::Money;

/// Affiliate rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Bronze => "bronze",
            Tier::Silver => "silver",
            Tier::Gold => "gold",
            Tier::Platinum => "platinum",
            Tier::Diamond => "diamond",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bronze" => Ok(Tier::Bronze),
            "silver" => Ok(Tier::Silver),
            "gold" => Ok(Tier::Gold),
            "platinum" => Ok(Tier::Platinum),
            "diamond" => Ok(Tier::Diamond),
            other => Err(LedgerError::InvalidArgument(format!("unknown tier: {other}"))),
        }
    }
}

/// Static catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierDefinition {
    pub tier: Tier,
    pub display_order: u32,
    pub min_sales: Money,
    pub min_conversions: u64,
    /// Percentage points added to the affiliate's base rate.
    pub bonus_percent: Decimal,
    #[serde(default)]
    pub benefits: Vec<String>,
}

impl TierDefinition {
    fn is_met_by(&self, lifetime_sales: Money, conversions: u64) -> bool {
        lifetime_sales >= self.min_sales && conversions >= self.min_conversions
    }
}

/// Validated, ordered tier catalog.
#[derive(Debug, Clone)]
pub struct TierCatalog {
    tiers: Vec<TierDefinition>,
}

impl TierCatalog {
    /// Build a catalog, sorting by display order and validating that
    /// thresholds strictly increase and the entry tier has no thresholds.
    pub fn new(mut tiers: Vec<TierDefinition>) -> Result<Self, LedgerError> {
        if tiers.is_empty() {
            return Err(LedgerError::Config("tier catalog is empty".into()));
        }
        tiers.sort_by_key(|t| t.display_order);

        let entry = &tiers[0];
        if entry.min_sales != Money::ZERO || entry.min_conversions != 0 {
            return Err(LedgerError::Config(format!(
                "entry tier {} must have zero thresholds",
                entry.tier
            )));
        }

        for pair in tiers.windows(2) {
            let (lower, upper) = (&pair[0], &pair[1]);
            if upper.display_order == lower.display_order {
                return Err(LedgerError::Config(format!(
                    "tiers {} and {} share display order {}",
                    lower.tier, upper.tier, upper.display_order
                )));
            }
            if upper.min_sales <= lower.min_sales || upper.min_conversions <= lower.min_conversions
            {
                return Err(LedgerError::Config(format!(
                    "tier {} thresholds must exceed those of {}",
                    upper.tier, lower.tier
                )));
            }
        }

        let mut seen = HashSet::new();
        for tier in &tiers {
            if !seen.insert(tier.tier) {
                return Err(LedgerError::Config(format!("tier {} listed twice", tier.tier)));
            }
            if tier.bonus_percent.is_sign_negative() {
                return Err(LedgerError::Config(format!(
                    "tier {} has a negative bonus",
                    tier.tier
                )));
            }
        }

        Ok(Self { tiers })
    }

    /// Built-in catalog (bronze through diamond).
    pub fn standard() -> Self {
        Self {
            tiers: standard_tiers(),
        }
    }

    pub fn entry(&self) -> &TierDefinition {
        &self.tiers[0]
    }

    pub fn get(&self, tier: Tier) -> Option<&TierDefinition> {
        self.tiers.iter().find(|t| t.tier == tier)
    }

    /// Bonus for a tier; tiers absent from the catalog earn no bonus.
    pub fn bonus(&self, tier: Tier) -> Decimal {
        self.get(tier)
            .map(|t| t.bonus_percent)
            .unwrap_or(Decimal::ZERO)
    }

    /// Rank of a tier within this catalog.
    pub fn rank(&self, tier: Tier) -> Option<u32> {
        self.get(tier).map(|t| t.display_order)
    }

    /// Highest tier whose thresholds are all met.
    pub fn qualifying(&self, lifetime_sales: Money, conversions: u64) -> &TierDefinition {
        self.tiers
            .iter()
            .rev()
            .find(|t| t.is_met_by(lifetime_sales, conversions))
            .unwrap_or_else(|| self.entry())
    }

    /// Tier the affiliate should move to, if any. Never demotes.
    pub fn promotion(
        &self,
        current_rank: u32,
        lifetime_sales: Money,
        conversions: u64,
    ) -> Option<&TierDefinition> {
        let candidate = self.qualifying(lifetime_sales, conversions);
        (candidate.display_order > current_rank).then_some(candidate)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TierDefinition> {
        self.tiers.iter()
    }
}

impl Default for TierCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

pub fn standard_tiers() -> Vec<TierDefinition> {
    fn def(
        tier: Tier,
        display_order: u32,
        min_sales: i64,
        min_conversions: u64,
        bonus_percent: i64,
        benefits: &[&str],
    ) -> TierDefinition {
        TierDefinition {
            tier,
            display_order,
            min_sales: Money::from_cents(min_sales * 100),
            min_conversions,
            bonus_percent: Decimal::new(bonus_percent, 0),
            benefits: benefits.iter().map(|b| b.to_string()).collect(),
        }
    }

    vec![
        def(Tier::Bronze, 1, 0, 0, 0, &["Affiliate dashboard"]),
        def(Tier::Silver, 2, 1_000, 10, 2, &["Monthly performance report"]),
        def(Tier::Gold, 3, 5_000, 50, 5, &["Priority payouts"]),
        def(Tier::Platinum, 4, 20_000, 200, 8, &["Dedicated account manager"]),
        def(Tier::Diamond, 5, 50_000, 500, 10, &["Custom landing pages"]),
    ]
}
