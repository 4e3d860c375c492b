//! Sale ingestion: attribution, commission, ledger credit, tier and rollup.
//!
//! One payment event is one transaction. Either the sale row, referral
//! conversion, balance credit, tier promotion and monthly rollup all commit
//! together, or nothing does.

use chrono::{DateTime, Datelike, Utc};
use sqlx::SqliteConnection;
use tracing::{info, warn};
use uuid::Uuid;

use super::Ledger;
use crate::commission::{commission, effective_rate};
use crate::error::{LedgerError, Result};
use crate::model::{
    normalize_code, CommissionStatus, ProductDefinition, Sale, SaleEvent, SaleReceipt,
};
use crate::storage::helpers::{begin_immediate, finish};
use crate::storage::sqlite::{affiliates, aggregates, referrals, sales};
use crate::tier::TierCatalog;
use crate::utils::retry::retry_transient;

/// Validated inputs of one ingestion attempt.
struct IngestRequest<'a> {
    code: String,
    product: &'a ProductDefinition,
    event: &'a SaleEvent,
    transaction_ref: Option<String>,
}

impl Ledger {
    /// Ingest one completed payment.
    ///
    /// A repeated transaction reference is a successful no-op: the receipt
    /// describes the original sale with `already_processed` set.
    #[tracing::instrument(
        name = "ledger.ingest_sale",
        skip_all,
        fields(code = %event.affiliate_code, product = %event.product_id)
    )]
    pub async fn ingest_sale(&self, event: SaleEvent) -> Result<SaleReceipt> {
        let code = normalize_code(&event.affiliate_code)?;
        let product = self
            .products
            .get(&event.product_id)
            .ok_or_else(|| LedgerError::not_found("product", event.product_id.trim()))?;
        let transaction_ref = event
            .transaction_ref
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);

        let request = IngestRequest {
            code,
            product,
            event: &event,
            transaction_ref,
        };

        let receipt = retry_transient("ingest_sale", &self.policy.retry, || {
            self.ingest_attempt(&request)
        })
        .await?;

        if receipt.already_processed {
            info!(
                sale_id = %receipt.sale_id,
                transaction_ref = ?request.transaction_ref,
                "Duplicate payment event, returning original sale"
            );
        } else {
            info!(
                sale_id = %receipt.sale_id,
                commission = %receipt.commission,
                referral_id = ?receipt.referral_id,
                "Sale ingested"
            );
        }
        Ok(receipt)
    }

    async fn ingest_attempt(&self, request: &IngestRequest<'_>) -> Result<SaleReceipt> {
        let now = self.now();
        let mut conn = begin_immediate(&self.pool).await?;
        let result = self.ingest_in_tx(&mut conn, request, now).await;
        finish(conn, result).await
    }

    async fn ingest_in_tx(
        &self,
        conn: &mut SqliteConnection,
        request: &IngestRequest<'_>,
        now: DateTime<Utc>,
    ) -> Result<SaleReceipt> {
        if let Some(reference) = request.transaction_ref.as_deref() {
            if let Some(existing) = sales::find_by_transaction(conn, reference).await? {
                let code = affiliates::get(conn, existing.affiliate_id)
                    .await?
                    .map(|a| a.code)
                    .unwrap_or_else(|| request.code.clone());
                return Ok(SaleReceipt::for_sale(&existing, code, true));
            }
        }

        let affiliate = affiliates::find_by_code(conn, &request.code)
            .await?
            .filter(|a| a.active)
            .ok_or_else(|| LedgerError::not_found("affiliate", &request.code))?;

        let candidate = self.candidate_referral(conn, affiliate.id, now).await?;

        let product = request.product;
        let base_rate = affiliate.base_rate(&product.plan_class).ok_or_else(|| {
            LedgerError::not_found(
                "commission rate",
                format!("{}/{}", affiliate.code, product.plan_class),
            )
        })?;
        let tier_bonus = self.tiers.bonus(affiliate.tier);
        let amount = commission(product.price, base_rate, tier_bonus)?;

        let event = request.event;
        let mut sale = Sale {
            id: Uuid::new_v4(),
            affiliate_id: affiliate.id,
            referral_id: None,
            product_id: product.product_id.clone(),
            plan_name: product.plan_name.clone(),
            sale_amount: product.price,
            commission_rate: effective_rate(base_rate, tier_bonus),
            commission: amount,
            status: CommissionStatus::Pending,
            transaction_ref: request.transaction_ref.clone(),
            customer_ref: event.customer_ref.clone(),
            subscription_ref: event.subscription_ref.clone(),
            metadata: event.metadata.clone(),
            created_at: now,
        };
        sales::insert(conn, &sale).await?;

        if let Some(referral) = candidate {
            if referrals::claim(conn, referral.id, sale.id).await? {
                sales::link_referral(conn, sale.id, referral.id).await?;
                sale.referral_id = Some(referral.id);
            } else {
                warn!(
                    referral_id = %referral.id,
                    sale_id = %sale.id,
                    "Referral claimed by another sale, recording as direct sale"
                );
            }
        }

        apply_ledger(conn, &self.tiers, &sale, now).await?;

        Ok(SaleReceipt::for_sale(&sale, affiliate.code, false))
    }

    /// Apply the balance credit of a sale still in `pending`.
    ///
    /// Keyed by sale id: returns false without touching any balance when the
    /// sale's ledger effects were already applied.
    #[tracing::instrument(name = "ledger.replay_ledger", skip_all, fields(%sale_id))]
    pub async fn replay_ledger(&self, sale_id: Uuid) -> Result<bool> {
        let applied = retry_transient("replay_ledger", &self.policy.retry, || {
            self.replay_attempt(sale_id)
        })
        .await?;

        if applied {
            info!("Ledger application replayed");
        }
        Ok(applied)
    }

    async fn replay_attempt(&self, sale_id: Uuid) -> Result<bool> {
        let now = self.now();
        let mut conn = begin_immediate(&self.pool).await?;
        let result = async {
            let sale = sales::get(&mut conn, sale_id)
                .await?
                .ok_or_else(|| LedgerError::not_found("sale", sale_id))?;
            if sale.status != CommissionStatus::Pending {
                return Ok(false);
            }
            apply_ledger(&mut conn, &self.tiers, &sale, now).await
        }
        .await;
        finish(conn, result).await
    }

    pub async fn get_sale(&self, sale_id: Uuid) -> Result<Sale> {
        let mut conn = self.pool.acquire().await?;
        sales::get(&mut conn, sale_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("sale", sale_id))
    }

    /// Number of sales recorded for an affiliate.
    pub async fn sale_count(&self, affiliate_id: Uuid) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        sales::count_for_affiliate(&mut conn, affiliate_id).await
    }
}

/// Credit a pending sale to its affiliate, then promote and roll up.
///
/// The `pending -> payable` status flip is the idempotency guard: only the
/// caller that wins it applies the increments.
async fn apply_ledger(
    conn: &mut SqliteConnection,
    tiers: &TierCatalog,
    sale: &Sale,
    now: DateTime<Utc>,
) -> Result<bool> {
    if !sales::mark_payable(conn, sale).await? {
        return Ok(false);
    }

    affiliates::apply_sale(conn, sale.affiliate_id, sale.sale_amount, sale.commission, now)
        .await?;

    let profile = affiliates::get(conn, sale.affiliate_id)
        .await?
        .ok_or_else(|| LedgerError::not_found("affiliate", sale.affiliate_id))?;
    if let Some(next) = tiers.promotion(
        profile.tier_rank,
        profile.lifetime_sales,
        profile.total_conversions,
    ) {
        if affiliates::promote_tier(conn, profile.id, next, now).await? {
            info!(
                affiliate_id = %profile.id,
                from = %profile.tier,
                to = %next.tier,
                "Affiliate promoted"
            );
        }
    }

    aggregates::record_sale(
        conn,
        sale.affiliate_id,
        sale.created_at.year(),
        sale.created_at.month(),
        sale.sale_amount,
        sale.commission,
        now,
    )
    .await?;

    Ok(true)
}
