//! Click tracking and last-click attribution.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use super::Ledger;
use crate::error::{LedgerError, Result};
use crate::model::{normalize_code, Referral};
use crate::storage::helpers::{begin_immediate, finish};
use crate::storage::sqlite::{affiliates, referrals};
use crate::utils::retry::retry_transient;

impl Ledger {
    /// Record a click-through for an active affiliate.
    #[tracing::instrument(name = "ledger.record_click", skip_all, fields(code = %affiliate_code))]
    pub async fn record_click(&self, affiliate_code: &str) -> Result<Referral> {
        let code = normalize_code(affiliate_code)?;
        let referral = retry_transient("record_click", &self.policy.retry, || {
            self.record_click_attempt(&code)
        })
        .await?;

        debug!(referral_id = %referral.id, affiliate_id = %referral.affiliate_id, "Click recorded");
        Ok(referral)
    }

    async fn record_click_attempt(&self, code: &str) -> Result<Referral> {
        let now = self.now();
        let mut conn = begin_immediate(&self.pool).await?;
        let result = Self::record_click_in_tx(&mut conn, code, now).await;
        finish(conn, result).await
    }

    async fn record_click_in_tx(
        conn: &mut SqliteConnection,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Referral> {
        let affiliate = affiliates::find_by_code(conn, code)
            .await?
            .filter(|a| a.active)
            .ok_or_else(|| LedgerError::not_found("affiliate", code))?;

        let referral = Referral {
            id: Uuid::new_v4(),
            affiliate_id: affiliate.id,
            created_at: now,
            converted: false,
            sale_id: None,
        };
        referrals::insert(conn, &referral).await?;
        Ok(referral)
    }

    /// Most recent unconverted click for the affiliate inside the attribution
    /// window ending at `at`. Last click wins; other affiliates' clicks are
    /// not considered.
    pub async fn resolve_candidate_referral(
        &self,
        affiliate_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<Referral>> {
        let mut conn = self.pool.acquire().await?;
        self.candidate_referral(&mut conn, affiliate_id, at).await
    }

    pub(super) async fn candidate_referral(
        &self,
        conn: &mut SqliteConnection,
        affiliate_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<Referral>> {
        let from = at - self.policy.attribution_window;
        referrals::latest_unconverted(conn, affiliate_id, from, at).await
    }

    pub async fn get_referral(&self, referral_id: Uuid) -> Result<Referral> {
        let mut conn = self.pool.acquire().await?;
        referrals::get(&mut conn, referral_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("referral", referral_id))
    }
}
