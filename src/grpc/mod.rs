//! gRPC surface of the ledger.
//!
//! Thin adapter: decode the request, call [`Ledger`], encode the result.
//! Business failures map onto status codes through `From<LedgerError>`.

pub mod convert;

use tonic::{Request, Response, Status};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::error::LedgerError;
use crate::model::{AffiliateProfile, NewAffiliate, SaleEvent};
use crate::proto::affiliate_ledger_server::AffiliateLedger;
use crate::proto::{self, affiliate_lookup::Key};
use crate::services::Ledger;

use convert::{parse_id, parse_payout_method, payout_decision};

/// Ledger gRPC service.
#[derive(Debug, Clone)]
pub struct AffiliateLedgerService {
    ledger: Ledger,
}

impl AffiliateLedgerService {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }

    pub fn into_server(self) -> proto::affiliate_ledger_server::AffiliateLedgerServer<Self> {
        proto::affiliate_ledger_server::AffiliateLedgerServer::new(self)
    }

    async fn resolve(&self, lookup: proto::AffiliateLookup) -> Result<AffiliateProfile, LedgerError> {
        match lookup.key {
            Some(Key::Id(id)) => {
                self.ledger
                    .get_affiliate(parse_id("id", &id)?)
                    .await
            }
            Some(Key::Code(code)) => self.ledger.find_affiliate(&code).await,
            None => Err(LedgerError::InvalidArgument(
                "affiliate id or code is required".to_string(),
            )),
        }
    }
}

/// Log a failed call and convert it to a status.
///
/// Internal failures are logged with detail and returned without it.
fn reject(operation: &'static str, err: LedgerError) -> Status {
    match err.code() {
        "internal" => error!(operation, error = %err, "Ledger call failed"),
        code => warn!(operation, code, error = %err, "Ledger call rejected"),
    }
    err.into()
}

#[tonic::async_trait]
impl AffiliateLedger for AffiliateLedgerService {
    async fn register_affiliate(
        &self,
        request: Request<proto::RegisterAffiliateRequest>,
    ) -> Result<Response<proto::Affiliate>, Status> {
        let new = NewAffiliate::try_from(request.into_inner())
            .map_err(|e| reject("register_affiliate", e))?;
        let profile = self
            .ledger
            .register_affiliate(new)
            .await
            .map_err(|e| reject("register_affiliate", e))?;
        Ok(Response::new(profile.into()))
    }

    async fn deactivate_affiliate(
        &self,
        request: Request<proto::AffiliateLookup>,
    ) -> Result<Response<proto::Affiliate>, Status> {
        let result = async {
            let profile = self.resolve(request.into_inner()).await?;
            self.ledger.deactivate_affiliate(profile.id).await
        }
        .await;
        let profile = result.map_err(|e| reject("deactivate_affiliate", e))?;
        Ok(Response::new(profile.into()))
    }

    async fn get_affiliate(
        &self,
        request: Request<proto::AffiliateLookup>,
    ) -> Result<Response<proto::Affiliate>, Status> {
        let profile = self
            .resolve(request.into_inner())
            .await
            .map_err(|e| reject("get_affiliate", e))?;
        Ok(Response::new(profile.into()))
    }

    async fn record_click(
        &self,
        request: Request<proto::RecordClickRequest>,
    ) -> Result<Response<proto::Referral>, Status> {
        let referral = self
            .ledger
            .record_click(&request.into_inner().affiliate_code)
            .await
            .map_err(|e| reject("record_click", e))?;
        Ok(Response::new(referral.into()))
    }

    async fn ingest_sale(
        &self,
        request: Request<proto::IngestSaleRequest>,
    ) -> Result<Response<proto::IngestSaleResponse>, Status> {
        let receipt = self
            .ledger
            .ingest_sale(SaleEvent::from(request.into_inner()))
            .await
            .map_err(|e| reject("ingest_sale", e))?;
        Ok(Response::new(receipt.into()))
    }

    async fn replay_ledger(
        &self,
        request: Request<proto::ReplayLedgerRequest>,
    ) -> Result<Response<proto::ReplayLedgerResponse>, Status> {
        let result = async {
            let sale_id = parse_id("sale_id", &request.into_inner().sale_id)?;
            self.ledger.replay_ledger(sale_id).await
        }
        .await;
        let applied = result.map_err(|e| reject("replay_ledger", e))?;
        Ok(Response::new(proto::ReplayLedgerResponse { applied }))
    }

    async fn request_payout(
        &self,
        request: Request<proto::RequestPayoutRequest>,
    ) -> Result<Response<proto::PayoutRequest>, Status> {
        let request = request.into_inner();
        let result = async {
            let affiliate_id = parse_id("affiliate_id", &request.affiliate_id)?;
            let method = parse_payout_method(&request.payout_method)?;
            self.ledger.request_payout(affiliate_id, method).await
        }
        .await;
        let payout = result.map_err(|e| reject("request_payout", e))?;
        Ok(Response::new(payout.into()))
    }

    async fn decide_payout(
        &self,
        request: Request<proto::DecidePayoutRequest>,
    ) -> Result<Response<proto::PayoutRequest>, Status> {
        let request = request.into_inner();
        let result = async {
            let payout_id = parse_id("payout_id", &request.payout_id)?;
            let decision = payout_decision(&request)?;
            self.ledger.decide_payout(payout_id, decision).await
        }
        .await;
        let payout = result.map_err(|e| reject("decide_payout", e))?;
        Ok(Response::new(payout.into()))
    }

    async fn list_payouts(
        &self,
        request: Request<proto::AffiliateLookup>,
    ) -> Result<Response<proto::PayoutRequestList>, Status> {
        let result = async {
            let profile = self.resolve(request.into_inner()).await?;
            self.ledger.list_payouts(profile.id).await
        }
        .await;
        let payouts = result.map_err(|e| reject("list_payouts", e))?;
        Ok(Response::new(proto::PayoutRequestList {
            payouts: payouts.into_iter().map(Into::into).collect(),
        }))
    }

    async fn get_monthly_aggregate(
        &self,
        request: Request<proto::MonthlyAggregateRequest>,
    ) -> Result<Response<proto::MonthlyAggregate>, Status> {
        let request = request.into_inner();
        let result = async {
            let affiliate_id = parse_id("affiliate_id", &request.affiliate_id)?;
            self.ledger
                .monthly_aggregate(affiliate_id, request.year, request.month)
                .await
        }
        .await;
        let aggregate = result.map_err(|e| reject("get_monthly_aggregate", e))?;
        Ok(Response::new(aggregate.into()))
    }

    async fn get_balance_report(
        &self,
        request: Request<proto::AffiliateLookup>,
    ) -> Result<Response<proto::BalanceReport>, Status> {
        let result = async {
            let profile = self.resolve(request.into_inner()).await?;
            self.ledger.balance_report(profile.id).await
        }
        .await;
        let report = result.map_err(|e| reject("get_balance_report", e))?;
        if !report.is_consistent() {
            error!(
                affiliate_id = %report.affiliate_id,
                drift = ?report.drift(),
                "Balance invariant broken"
            );
        }
        Ok(Response::new(report.into()))
    }
}

/// Tower trace layer opening one span per gRPC call, tagged with the
/// request path and any `x-request-id` header.
pub fn grpc_trace_layer() -> TraceLayer<
    tower_http::classify::SharedClassifier<tower_http::classify::GrpcErrorsAsFailures>,
    impl Fn(&http::Request<tonic::body::BoxBody>) -> tracing::Span + Clone,
> {
    TraceLayer::new_for_grpc().make_span_with(|request: &http::Request<tonic::body::BoxBody>| {
        let request_id = request
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        let path = request.uri().path();
        tracing::info_span!("grpc", %request_id, %path)
    })
}
