//! affiliate-ledger-server: gRPC front end for the commission ledger.
//!
//! ## Configuration
//! - `--config <path>` or AFFILIATE_LEDGER_CONFIG: YAML config file
//! - AFFILIATE_LEDGER__SERVER__PORT, AFFILIATE_LEDGER__STORAGE__PATH, ...:
//!   per-key overrides
//! - AFFILIATE_LEDGER_LOG: tracing filter (default `info`)

use tonic::transport::Server;
use tonic_health::server::health_reporter;
use tracing::{error, info};

use affiliate_ledger::config::Config;
use affiliate_ledger::grpc::{grpc_trace_layer, AffiliateLedgerService};
use affiliate_ledger::proto::affiliate_ledger_server::AffiliateLedgerServer;
use affiliate_ledger::services::Ledger;
use affiliate_ledger::storage;
use affiliate_ledger::utils::bootstrap::{init_tracing, parse_config_path};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config_path = parse_config_path();
    let config = Config::load(config_path.as_deref()).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    let pool = storage::open(&config.storage).await?;
    info!(path = %config.storage.path, "Storage initialized");

    let ledger = Ledger::from_config(pool, &config)?;
    info!(
        tiers = ledger.tiers().iter().count(),
        products = ledger.products().len(),
        minimum_payout = %ledger.policy().minimum_payout,
        "Ledger ready"
    );

    let (mut health_reporter, health_service) = health_reporter();
    health_reporter
        .set_serving::<AffiliateLedgerServer<AffiliateLedgerService>>()
        .await;

    let addr = config.server.bind_address().parse()?;
    info!(%addr, "Affiliate ledger listening");

    Server::builder()
        .layer(grpc_trace_layer())
        .add_service(health_service)
        .add_service(AffiliateLedgerService::new(ledger).into_server())
        .serve_with_shutdown(addr, shutdown_signal())
        .await?;

    info!("Affiliate ledger stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
}
