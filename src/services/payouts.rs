//! Payout workflow and commission reporting.

use chrono::{DateTime, Datelike, Utc};
use sqlx::SqliteConnection;
use tracing::{info, warn};
use uuid::Uuid;

use super::Ledger;
use crate::error::{LedgerError, Result};
use crate::model::{
    CommissionStatus, MonthlyCommissionAggregate, PayoutDecision, PayoutMethod, PayoutRequest,
    PayoutStatus,
};
use crate::money::Money;
use crate::storage::helpers::{begin_immediate, finish};
use crate::storage::sqlite::{affiliates, aggregates, payouts, sales};
use crate::utils::retry::retry_transient;

impl Ledger {
    /// Open a withdrawal of the affiliate's whole pending balance.
    ///
    /// Refused with `InvariantViolation` while the balance is below the
    /// configured minimum; nothing is written in that case.
    #[tracing::instrument(name = "ledger.request_payout", skip_all, fields(%affiliate_id))]
    pub async fn request_payout(
        &self,
        affiliate_id: Uuid,
        method: Option<PayoutMethod>,
    ) -> Result<PayoutRequest> {
        let request = retry_transient("request_payout", &self.policy.retry, || {
            self.request_payout_attempt(affiliate_id, method)
        })
        .await
        .inspect_err(|e| {
            if matches!(e, LedgerError::InvariantViolation(_)) {
                warn!(error = %e, "Payout request refused");
            }
        })?;

        info!(
            payout_id = %request.id,
            amount = %request.amount,
            method = request.method.as_str(),
            "Payout requested"
        );
        Ok(request)
    }

    async fn request_payout_attempt(
        &self,
        affiliate_id: Uuid,
        method: Option<PayoutMethod>,
    ) -> Result<PayoutRequest> {
        let now = self.now();
        let mut conn = begin_immediate(&self.pool).await?;
        let result = self
            .request_payout_in_tx(&mut conn, affiliate_id, method, now)
            .await;
        finish(conn, result).await
    }

    async fn request_payout_in_tx(
        &self,
        conn: &mut SqliteConnection,
        affiliate_id: Uuid,
        method: Option<PayoutMethod>,
        now: DateTime<Utc>,
    ) -> Result<PayoutRequest> {
        let affiliate = affiliates::get(conn, affiliate_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("affiliate", affiliate_id))?;
        if !affiliate.active {
            return Err(LedgerError::InvariantViolation(format!(
                "affiliate {} is deactivated",
                affiliate.code
            )));
        }

        let balance = affiliate.pending_balance;
        let minimum = self.policy.minimum_payout;
        if balance < minimum {
            return Err(LedgerError::InvariantViolation(format!(
                "pending balance {balance} is below the payout minimum {minimum}"
            )));
        }
        if balance <= Money::ZERO {
            return Err(LedgerError::InvariantViolation(
                "nothing to pay out".to_string(),
            ));
        }

        let request = PayoutRequest {
            id: Uuid::new_v4(),
            affiliate_id,
            amount: balance,
            method: method.unwrap_or(affiliate.payout_method),
            status: PayoutStatus::Pending,
            rejection_reason: None,
            requested_at: now,
            processed_at: None,
            completed_at: None,
        };
        payouts::insert(conn, &request).await?;
        Ok(request)
    }

    /// Approve or reject a pending payout.
    ///
    /// Approval re-checks the balance inside the debiting transaction and
    /// settles payable sales oldest first up to the payout amount. Deciding
    /// an already decided request fails with `InvalidTransition`.
    #[tracing::instrument(name = "ledger.decide_payout", skip_all, fields(%payout_id))]
    pub async fn decide_payout(
        &self,
        payout_id: Uuid,
        decision: PayoutDecision,
    ) -> Result<PayoutRequest> {
        let request = retry_transient("decide_payout", &self.policy.retry, || {
            self.decide_payout_attempt(payout_id, &decision)
        })
        .await?;

        match request.status {
            PayoutStatus::Completed => info!(
                affiliate_id = %request.affiliate_id,
                amount = %request.amount,
                "Payout completed"
            ),
            _ => info!(
                affiliate_id = %request.affiliate_id,
                reason = ?request.rejection_reason,
                "Payout rejected"
            ),
        }
        Ok(request)
    }

    async fn decide_payout_attempt(
        &self,
        payout_id: Uuid,
        decision: &PayoutDecision,
    ) -> Result<PayoutRequest> {
        let now = self.now();
        let mut conn = begin_immediate(&self.pool).await?;
        let result = Self::decide_payout_in_tx(&mut conn, payout_id, decision, now).await;
        finish(conn, result).await
    }

    async fn decide_payout_in_tx(
        conn: &mut SqliteConnection,
        payout_id: Uuid,
        decision: &PayoutDecision,
        now: DateTime<Utc>,
    ) -> Result<PayoutRequest> {
        let request = payouts::get(conn, payout_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("payout request", payout_id))?;
        let target = request.status.transition_to(decision.target_status())?;

        match decision {
            PayoutDecision::Approve => {
                if !affiliates::debit_pending(conn, request.affiliate_id, request.amount, now)
                    .await?
                {
                    return Err(LedgerError::InvariantViolation(format!(
                        "payout {payout_id} of {} exceeds the pending balance",
                        request.amount
                    )));
                }
                settle_sales(conn, request.affiliate_id, request.amount, now).await?;
                payouts::resolve(conn, payout_id, target, None, now).await?;
            }
            PayoutDecision::Reject { reason } => {
                payouts::resolve(conn, payout_id, target, reason.as_deref(), now).await?;
            }
        }

        payouts::get(conn, payout_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("payout request", payout_id))
    }

    pub async fn get_payout(&self, payout_id: Uuid) -> Result<PayoutRequest> {
        let mut conn = self.pool.acquire().await?;
        payouts::get(&mut conn, payout_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("payout request", payout_id))
    }

    /// Payout requests of an affiliate, newest first.
    pub async fn list_payouts(&self, affiliate_id: Uuid) -> Result<Vec<PayoutRequest>> {
        let mut conn = self.pool.acquire().await?;
        if affiliates::get(&mut conn, affiliate_id).await?.is_none() {
            return Err(LedgerError::not_found("affiliate", affiliate_id));
        }
        payouts::list_for_affiliate(&mut conn, affiliate_id).await
    }

    /// Commission rollup for one calendar month. Months without sales
    /// report zeros.
    pub async fn monthly_aggregate(
        &self,
        affiliate_id: Uuid,
        year: i32,
        month: u32,
    ) -> Result<MonthlyCommissionAggregate> {
        if !(1..=12).contains(&month) {
            return Err(LedgerError::InvalidArgument(format!(
                "month must be within 1..=12, got {month}"
            )));
        }
        let mut conn = self.pool.acquire().await?;
        if affiliates::get(&mut conn, affiliate_id).await?.is_none() {
            return Err(LedgerError::not_found("affiliate", affiliate_id));
        }
        Ok(aggregates::get(&mut conn, affiliate_id, year, month)
            .await?
            .unwrap_or_else(|| MonthlyCommissionAggregate::empty(affiliate_id, year, month)))
    }
}

/// Mark payable sales paid in ledger-application order while they fit in
/// `amount`.
///
/// The payout amount is the balance credited before the request, so the
/// sales it covers are exactly the earliest applied ones; any remainder
/// means sale statuses have drifted from the balance.
async fn settle_sales(
    conn: &mut SqliteConnection,
    affiliate_id: Uuid,
    amount: Money,
    now: DateTime<Utc>,
) -> Result<()> {
    let mut remaining = amount;
    for sale in sales::list_by_status(conn, affiliate_id, CommissionStatus::Payable).await? {
        let Some(left) = remaining
            .checked_sub(sale.commission)
            .filter(|left| !left.is_negative())
        else {
            break;
        };
        if sales::transition(conn, sale.id, CommissionStatus::Payable, CommissionStatus::Paid)
            .await?
        {
            remaining = left;
            aggregates::settle(
                conn,
                affiliate_id,
                sale.created_at.year(),
                sale.created_at.month(),
                sale.commission,
                now,
            )
            .await?;
        }
    }
    if !remaining.is_zero() {
        warn!(%affiliate_id, %amount, unsettled = %remaining, "Payout not fully matched by payable sales");
    }
    Ok(())
}
