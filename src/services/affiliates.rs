//! Affiliate registration, lifecycle and balance reads.

use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

use super::Ledger;
use crate::error::{LedgerError, Result};
use crate::model::{normalize_code, AffiliateProfile, BalanceReport, NewAffiliate};
use crate::money::Money;
use crate::storage::helpers::{begin_immediate, finish};
use crate::storage::sqlite::{affiliates, payouts};
use crate::utils::retry::retry_transient;

impl Ledger {
    /// Create an affiliate at the requested tier, or the catalog's entry tier.
    #[tracing::instrument(name = "ledger.register_affiliate", skip_all, fields(code = %new.code))]
    pub async fn register_affiliate(&self, new: NewAffiliate) -> Result<AffiliateProfile> {
        new.validate()?;
        let code = normalize_code(&new.code)?;
        let tier = match new.initial_tier {
            Some(tier) => self.tiers.get(tier).ok_or_else(|| {
                LedgerError::InvalidArgument(format!("tier {tier} is not in the catalog"))
            })?,
            None => self.tiers.entry(),
        };

        let now = self.now();
        let profile = AffiliateProfile {
            id: Uuid::new_v4(),
            code,
            base_rates: new.base_rates,
            tier: tier.tier,
            tier_rank: tier.display_order,
            lifetime_sales: Money::ZERO,
            total_conversions: 0,
            total_earned: Money::ZERO,
            pending_balance: Money::ZERO,
            payout_method: new.payout_method,
            active: true,
            created_at: now,
            updated_at: now,
        };

        retry_transient("register_affiliate", &self.policy.retry, || {
            self.register_attempt(&profile)
        })
        .await?;

        info!(
            affiliate_id = %profile.id,
            code = %profile.code,
            tier = %profile.tier,
            "Affiliate registered"
        );
        Ok(profile)
    }

    async fn register_attempt(&self, profile: &AffiliateProfile) -> Result<()> {
        let mut conn = begin_immediate(&self.pool).await?;
        let result = Self::register_in_tx(&mut conn, profile).await;
        finish(conn, result).await
    }

    async fn register_in_tx(conn: &mut SqliteConnection, profile: &AffiliateProfile) -> Result<()> {
        if affiliates::find_by_code(conn, &profile.code).await?.is_some() {
            return Err(LedgerError::InvariantViolation(format!(
                "affiliate code {} is already registered",
                profile.code
            )));
        }
        affiliates::insert(conn, profile).await
    }

    /// Stop crediting new sales and clicks. Balances and history are kept.
    #[tracing::instrument(name = "ledger.deactivate_affiliate", skip_all, fields(%affiliate_id))]
    pub async fn deactivate_affiliate(&self, affiliate_id: Uuid) -> Result<AffiliateProfile> {
        let profile = retry_transient("deactivate_affiliate", &self.policy.retry, || {
            self.deactivate_attempt(affiliate_id)
        })
        .await?;

        info!(code = %profile.code, "Affiliate deactivated");
        Ok(profile)
    }

    async fn deactivate_attempt(&self, affiliate_id: Uuid) -> Result<AffiliateProfile> {
        let now = self.now();
        let mut conn = begin_immediate(&self.pool).await?;
        let result = async {
            if !affiliates::set_active(&mut conn, affiliate_id, false, now).await? {
                return Err(LedgerError::not_found("affiliate", affiliate_id));
            }
            affiliates::get(&mut conn, affiliate_id)
                .await?
                .ok_or_else(|| LedgerError::not_found("affiliate", affiliate_id))
        }
        .await;
        finish(conn, result).await
    }

    pub async fn get_affiliate(&self, affiliate_id: Uuid) -> Result<AffiliateProfile> {
        let mut conn = self.pool.acquire().await?;
        affiliates::get(&mut conn, affiliate_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("affiliate", affiliate_id))
    }

    /// Case-insensitive lookup by referral code.
    pub async fn find_affiliate(&self, code: &str) -> Result<AffiliateProfile> {
        let code = normalize_code(code)?;
        let mut conn = self.pool.acquire().await?;
        affiliates::find_by_code(&mut conn, &code)
            .await?
            .ok_or_else(|| LedgerError::not_found("affiliate", code))
    }

    /// Sum of completed payouts for the affiliate.
    pub async fn completed_payout_total(&self, affiliate_id: Uuid) -> Result<Money> {
        let mut conn = self.pool.acquire().await?;
        payouts::completed_total(&mut conn, affiliate_id).await
    }

    /// Earned, paid and pending amounts read from one snapshot.
    pub async fn balance_report(&self, affiliate_id: Uuid) -> Result<BalanceReport> {
        let mut conn = self.pool.begin().await?;
        let result = async {
            let profile = affiliates::get(&mut conn, affiliate_id)
                .await?
                .ok_or_else(|| LedgerError::not_found("affiliate", affiliate_id))?;
            let paid_out = payouts::completed_total(&mut conn, affiliate_id).await?;
            Ok::<_, LedgerError>(BalanceReport {
                affiliate_id,
                total_earned: profile.total_earned,
                paid_out,
                pending_balance: profile.pending_balance,
            })
        }
        .await;
        finish(conn, result).await
    }
}
