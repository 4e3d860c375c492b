//! Conversions between wire messages and ledger types.
//!
//! Money crosses the wire as decimal strings; identifiers as UUID strings.
//! Empty strings stand for absent optional fields.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use prost_types::Timestamp;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{LedgerError, Result};
use crate::model::{
    AffiliateProfile, BalanceReport, MonthlyCommissionAggregate, NewAffiliate, PayoutDecision,
    PayoutMethod, PayoutRequest, Referral, SaleEvent, SaleReceipt,
};
use crate::proto;
use crate::tier::Tier;

pub fn timestamp(ts: DateTime<Utc>) -> Timestamp {
    Timestamp {
        seconds: ts.timestamp(),
        nanos: ts.timestamp_subsec_nanos() as i32,
    }
}

pub fn parse_id(field: &'static str, raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| LedgerError::InvalidArgument(format!("{field} is not a valid id: '{raw}'")))
}

fn non_empty(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn optional_id(id: Option<Uuid>) -> String {
    id.map(|id| id.to_string()).unwrap_or_default()
}

pub fn parse_payout_method(raw: &str) -> Result<Option<PayoutMethod>> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    raw.parse().map(Some)
}

impl TryFrom<proto::RegisterAffiliateRequest> for NewAffiliate {
    type Error = LedgerError;

    fn try_from(request: proto::RegisterAffiliateRequest) -> Result<Self> {
        let payout_method = parse_payout_method(&request.payout_method)?.ok_or_else(|| {
            LedgerError::InvalidArgument("payout_method is required".to_string())
        })?;

        let mut new = NewAffiliate::new(request.code, payout_method);
        for (plan_class, rate) in request.base_rates {
            let rate = Decimal::from_str(rate.trim()).map_err(|_| {
                LedgerError::InvalidArgument(format!("rate for {plan_class} is not a number: '{rate}'"))
            })?;
            new = new.with_rate(plan_class, rate);
        }
        if let Some(tier) = non_empty(request.initial_tier) {
            new = new.with_tier(tier.parse::<Tier>()?);
        }
        Ok(new)
    }
}

impl From<proto::IngestSaleRequest> for SaleEvent {
    fn from(request: proto::IngestSaleRequest) -> Self {
        let metadata = (!request.metadata.is_empty()).then(|| {
            serde_json::Value::Object(
                request
                    .metadata
                    .into_iter()
                    .map(|(k, v)| (k, serde_json::Value::String(v)))
                    .collect(),
            )
        });

        SaleEvent {
            affiliate_code: request.affiliate_code,
            product_id: request.product_id,
            transaction_ref: non_empty(request.transaction_ref),
            customer_ref: non_empty(request.customer_ref),
            subscription_ref: non_empty(request.subscription_ref),
            metadata,
        }
    }
}

pub fn payout_decision(request: &proto::DecidePayoutRequest) -> Result<PayoutDecision> {
    match proto::PayoutDecision::try_from(request.decision) {
        Ok(proto::PayoutDecision::Approve) => Ok(PayoutDecision::Approve),
        Ok(proto::PayoutDecision::Reject) => Ok(PayoutDecision::Reject {
            reason: non_empty(request.reason.clone()),
        }),
        Ok(proto::PayoutDecision::Unspecified) | Err(_) => Err(LedgerError::InvalidArgument(
            "decision must be approve or reject".to_string(),
        )),
    }
}

impl From<AffiliateProfile> for proto::Affiliate {
    fn from(profile: AffiliateProfile) -> Self {
        proto::Affiliate {
            id: profile.id.to_string(),
            code: profile.code,
            base_rates: profile
                .base_rates
                .into_iter()
                .map(|(plan_class, rate)| (plan_class, rate.normalize().to_string()))
                .collect::<HashMap<_, _>>(),
            tier: profile.tier.to_string(),
            lifetime_sales: profile.lifetime_sales.to_string(),
            total_conversions: profile.total_conversions,
            total_earned: profile.total_earned.to_string(),
            pending_balance: profile.pending_balance.to_string(),
            payout_method: profile.payout_method.to_string(),
            active: profile.active,
            created_at: Some(timestamp(profile.created_at)),
        }
    }
}

impl From<Referral> for proto::Referral {
    fn from(referral: Referral) -> Self {
        proto::Referral {
            id: referral.id.to_string(),
            affiliate_id: referral.affiliate_id.to_string(),
            created_at: Some(timestamp(referral.created_at)),
            converted: referral.converted,
            sale_id: optional_id(referral.sale_id),
        }
    }
}

impl From<SaleReceipt> for proto::IngestSaleResponse {
    fn from(receipt: SaleReceipt) -> Self {
        proto::IngestSaleResponse {
            sale_id: receipt.sale_id.to_string(),
            commission: receipt.commission.to_string(),
            affiliate_code: receipt.affiliate_code,
            referral_id: optional_id(receipt.referral_id),
            already_processed: receipt.already_processed,
        }
    }
}

impl From<PayoutRequest> for proto::PayoutRequest {
    fn from(request: PayoutRequest) -> Self {
        proto::PayoutRequest {
            id: request.id.to_string(),
            affiliate_id: request.affiliate_id.to_string(),
            amount: request.amount.to_string(),
            payout_method: request.method.to_string(),
            status: request.status.as_str().to_string(),
            rejection_reason: request.rejection_reason.unwrap_or_default(),
            requested_at: Some(timestamp(request.requested_at)),
            processed_at: request.processed_at.map(timestamp),
            completed_at: request.completed_at.map(timestamp),
        }
    }
}

impl From<MonthlyCommissionAggregate> for proto::MonthlyAggregate {
    fn from(aggregate: MonthlyCommissionAggregate) -> Self {
        proto::MonthlyAggregate {
            affiliate_id: aggregate.affiliate_id.to_string(),
            year: aggregate.year,
            month: aggregate.month,
            sale_count: aggregate.sale_count,
            sale_amount: aggregate.sale_amount.to_string(),
            commission_earned: aggregate.commission_earned.to_string(),
            commission_pending: aggregate.commission_pending.to_string(),
        }
    }
}

impl From<BalanceReport> for proto::BalanceReport {
    fn from(report: BalanceReport) -> Self {
        proto::BalanceReport {
            affiliate_id: report.affiliate_id.to_string(),
            total_earned: report.total_earned.to_string(),
            paid_out: report.paid_out.to_string(),
            pending_balance: report.pending_balance.to_string(),
            consistent: report.is_consistent(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_register_request_conversion() {
        let request = proto::RegisterAffiliateRequest {
            code: "Chef".into(),
            base_rates: HashMap::from([("basic".to_string(), "12.5".to_string())]),
            payout_method: "pix".into(),
            initial_tier: "Silver".into(),
        };
        let new = NewAffiliate::try_from(request).unwrap();
        assert_eq!(new.base_rates["basic"], Decimal::new(125, 1));
        assert_eq!(new.payout_method, PayoutMethod::Pix);
        assert_eq!(new.initial_tier, Some(Tier::Silver));
    }

    #[test]
    fn test_register_request_rejects_bad_input() {
        let base = proto::RegisterAffiliateRequest {
            code: "chef".into(),
            base_rates: HashMap::new(),
            payout_method: "pix".into(),
            initial_tier: String::new(),
        };

        let missing_method = proto::RegisterAffiliateRequest {
            payout_method: String::new(),
            ..base.clone()
        };
        assert!(matches!(
            NewAffiliate::try_from(missing_method),
            Err(LedgerError::InvalidArgument(_))
        ));

        let bad_rate = proto::RegisterAffiliateRequest {
            base_rates: HashMap::from([("basic".to_string(), "twenty".to_string())]),
            ..base
        };
        assert!(matches!(
            NewAffiliate::try_from(bad_rate),
            Err(LedgerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_ingest_request_blank_fields_are_absent() {
        let event = SaleEvent::from(proto::IngestSaleRequest {
            affiliate_code: "chef".into(),
            product_id: "meal_plan_basic_annual".into(),
            transaction_ref: "  ".into(),
            customer_ref: "cus_1".into(),
            subscription_ref: String::new(),
            metadata: HashMap::from([("utm".to_string(), "spring".to_string())]),
        });
        assert_eq!(event.transaction_ref, None);
        assert_eq!(event.customer_ref.as_deref(), Some("cus_1"));
        assert_eq!(event.subscription_ref, None);
        assert_eq!(event.metadata, Some(serde_json::json!({"utm": "spring"})));
    }

    #[test]
    fn test_payout_decision_requires_explicit_choice() {
        let mut request = proto::DecidePayoutRequest {
            payout_id: Uuid::new_v4().to_string(),
            decision: proto::PayoutDecision::Unspecified as i32,
            reason: String::new(),
        };
        assert!(payout_decision(&request).is_err());

        request.decision = 42;
        assert!(payout_decision(&request).is_err());

        request.decision = proto::PayoutDecision::Reject as i32;
        request.reason = "duplicate account".into();
        assert_eq!(
            payout_decision(&request).unwrap(),
            PayoutDecision::Reject {
                reason: Some("duplicate account".into())
            }
        );
    }

    #[test]
    fn test_timestamp_keeps_subsecond_precision() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
            + chrono::Duration::microseconds(250);
        let wire = timestamp(ts);
        assert_eq!(wire.seconds, ts.timestamp());
        assert_eq!(wire.nanos, 250_000);
    }

    #[test]
    fn test_parse_id_is_invalid_argument() {
        assert!(matches!(
            parse_id("affiliate_id", "abc"),
            Err(LedgerError::InvalidArgument(_))
        ));
    }
}
