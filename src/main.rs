//! paybridge - Merchant-side bridge for the PayAxis mobile-payment gateway.
//!
//! Startup order matters: config first, then logging, then every shared
//! component is built once and injected. Nothing constructs transports or
//! stores lazily at request time.
//!
//! ```text
//! ┌──────────┐    ┌───────────┐    ┌──────────┐    ┌─────────┐
//! │  Config  │───▶│ Transport │───▶│ Pipeline │───▶│  Axum   │
//! │  (YAML)  │    │ (pooled)  │    │ (shared) │    │ Server  │
//! └──────────┘    └───────────┘    └──────────┘    └─────────┘
//! ```

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use paybridge::audit::{AuditStore, MemoryAuditStore};
use paybridge::callback::CallbackVerifier;
use paybridge::config::AppConfig;
use paybridge::instrument::InstrumentRegistry;
use paybridge::logging;
use paybridge::pipeline::{TransactionPipeline, TxnIdGenerator};
use paybridge::server::{self, AppState};
use paybridge::transport::GatewayTransport;

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "sandbox".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env);
    let _log_guard = logging::init_logging(&config);

    info!(env = %env, instruments = config.instruments.len(), "Starting paybridge");

    let registry = Arc::new(
        InstrumentRegistry::from_config(&config.instruments)
            .context("Invalid instrument configuration")?,
    );
    let transport = Arc::new(
        GatewayTransport::new(&config.transport).context("Failed to build gateway transport")?,
    );
    let audit: Arc<dyn AuditStore> = Arc::new(MemoryAuditStore::new());
    let txn_ids = TxnIdGenerator::new(config.txn_id.length, &config.txn_id.alphabet);

    let pipeline = Arc::new(TransactionPipeline::new(
        registry.clone(),
        transport,
        audit.clone(),
        txn_ids,
        config.txn_id.collision_retries,
    ));
    let callbacks = Arc::new(CallbackVerifier::new(registry.clone(), audit));

    let state = Arc::new(AppState {
        pipeline,
        callbacks,
        registry,
    });

    let port = get_port_override().unwrap_or(config.server.port);
    server::serve(state, &config.server.host, port).await
}
