//! gRPC handlers invoked in-process.

mod common;

use std::collections::HashMap;

use tonic::{Code, Request};

use affiliate_ledger::grpc::AffiliateLedgerService;
use affiliate_ledger::model::ProductCatalog;
use affiliate_ledger::proto::affiliate_ledger_server::AffiliateLedger;
use affiliate_ledger::proto::{self, affiliate_lookup::Key};

use common::{any_balance_policy, memory_ledger, INTERMEDIATE};

async fn service() -> AffiliateLedgerService {
    let (ledger, _) = memory_ledger(ProductCatalog::standard(), any_balance_policy()).await;
    AffiliateLedgerService::new(ledger)
}

fn by_code(code: &str) -> Request<proto::AffiliateLookup> {
    Request::new(proto::AffiliateLookup {
        key: Some(Key::Code(code.to_string())),
    })
}

async fn register(service: &AffiliateLedgerService, code: &str) -> proto::Affiliate {
    service
        .register_affiliate(Request::new(proto::RegisterAffiliateRequest {
            code: code.to_string(),
            base_rates: HashMap::from([("intermediate".to_string(), "20".to_string())]),
            payout_method: "paypal".to_string(),
            initial_tier: "gold".to_string(),
        }))
        .await
        .unwrap()
        .into_inner()
}

#[tokio::test]
async fn test_sale_to_payout_over_grpc() {
    let service = service().await;
    let affiliate = register(&service, "grpc-chef").await;
    assert_eq!(affiliate.tier, "gold");
    assert_eq!(affiliate.base_rates["intermediate"], "20");

    let sale = service
        .ingest_sale(Request::new(proto::IngestSaleRequest {
            affiliate_code: "grpc-chef".into(),
            product_id: INTERMEDIATE.into(),
            transaction_ref: "pi_grpc".into(),
            ..Default::default()
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(sale.commission, "59.75");
    assert!(sale.referral_id.is_empty());

    let payout = service
        .request_payout(Request::new(proto::RequestPayoutRequest {
            affiliate_id: affiliate.id.clone(),
            payout_method: String::new(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(payout.amount, "59.75");
    assert_eq!(payout.payout_method, "paypal");
    assert_eq!(payout.status, "pending");

    let decide = || {
        Request::new(proto::DecidePayoutRequest {
            payout_id: payout.id.clone(),
            decision: proto::PayoutDecision::Approve as i32,
            reason: String::new(),
        })
    };
    let approved = service.decide_payout(decide()).await.unwrap().into_inner();
    assert_eq!(approved.status, "completed");
    assert!(approved.completed_at.is_some());

    let status = service.decide_payout(decide()).await.unwrap_err();
    assert_eq!(status.code(), Code::FailedPrecondition);
    assert!(status.message().starts_with("invalid_transition"));

    let report = service
        .get_balance_report(by_code("grpc-chef"))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(report.total_earned, "59.75");
    assert_eq!(report.paid_out, "59.75");
    assert_eq!(report.pending_balance, "0.00");
    assert!(report.consistent);

    let listed = service
        .list_payouts(by_code("grpc-chef"))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(listed.payouts.len(), 1);
}

#[tokio::test]
async fn test_error_codes() {
    let service = service().await;
    register(&service, "codes-chef").await;

    let missing = service.get_affiliate(by_code("nobody")).await.unwrap_err();
    assert_eq!(missing.code(), Code::NotFound);

    let no_key = service
        .get_affiliate(Request::new(proto::AffiliateLookup { key: None }))
        .await
        .unwrap_err();
    assert_eq!(no_key.code(), Code::InvalidArgument);

    let bad_id = service
        .replay_ledger(Request::new(proto::ReplayLedgerRequest {
            sale_id: "not-a-uuid".into(),
        }))
        .await
        .unwrap_err();
    assert_eq!(bad_id.code(), Code::InvalidArgument);

    let duplicate = service
        .register_affiliate(Request::new(proto::RegisterAffiliateRequest {
            code: "codes-chef".into(),
            payout_method: "pix".into(),
            ..Default::default()
        }))
        .await
        .unwrap_err();
    assert_eq!(duplicate.code(), Code::FailedPrecondition);

    let bad_month = service
        .get_monthly_aggregate(Request::new(proto::MonthlyAggregateRequest {
            affiliate_id: uuid::Uuid::new_v4().to_string(),
            year: 2026,
            month: 13,
        }))
        .await
        .unwrap_err();
    assert_eq!(bad_month.code(), Code::InvalidArgument);

    let below_minimum = {
        let (ledger, _) = memory_ledger(
            ProductCatalog::standard(),
            affiliate_ledger::services::LedgerPolicy::default(),
        )
        .await;
        let strict = AffiliateLedgerService::new(ledger);
        let affiliate = register(&strict, "strict-chef").await;
        strict
            .request_payout(Request::new(proto::RequestPayoutRequest {
                affiliate_id: affiliate.id,
                payout_method: String::new(),
            }))
            .await
            .unwrap_err()
    };
    assert_eq!(below_minimum.code(), Code::FailedPrecondition);
}

#[tokio::test]
async fn test_click_and_deactivate_by_id() {
    let service = service().await;
    let affiliate = register(&service, "click-chef").await;

    let referral = service
        .record_click(Request::new(proto::RecordClickRequest {
            affiliate_code: "Click-Chef".into(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(referral.affiliate_id, affiliate.id);
    assert!(!referral.converted);

    let deactivated = service
        .deactivate_affiliate(Request::new(proto::AffiliateLookup {
            key: Some(Key::Id(affiliate.id.clone())),
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(!deactivated.active);

    let status = service
        .record_click(Request::new(proto::RecordClickRequest {
            affiliate_code: "click-chef".into(),
        }))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::NotFound);
}
