//! Downstream HTTP surface for merchant backends.
//!
//! Routes:
//! - `POST /api/v1/pay/{instrument}/init`
//! - `POST /api/v1/pay/{instrument}/cancel`
//! - `POST /api/v1/pay/{instrument}/refund`
//! - `GET  /api/v1/pay/{instrument}/status/{merchant_id}/{txn_id}`
//! - `POST /api/v1/callback/{instrument}`
//! - `GET  /api/v1/health`

pub mod handlers;
pub mod state;
pub mod types;

pub use state::AppState;
pub use types::ApiReply;

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tracing::info;

pub fn router(state: Arc<AppState>) -> Router {
    let pay = Router::new()
        .route("/{instrument}/init", post(handlers::init))
        .route("/{instrument}/cancel", post(handlers::cancel))
        .route("/{instrument}/refund", post(handlers::refund))
        .route(
            "/{instrument}/status/{merchant_id}/{txn_id}",
            get(handlers::status),
        );

    Router::new()
        .nest("/api/v1/pay", pay)
        .route("/api/v1/callback/{instrument}", post(handlers::callback))
        .route("/api/v1/health", get(handlers::health))
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn serve(state: Arc<AppState>, host: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    println!("🚀 paybridge listening on http://{}", addr);
    println!("📂 Payment API: /api/v1/pay/{{instrument}}/...");
    println!("📡 Callbacks:   /api/v1/callback/{{instrument}}");
    info!(addr = %addr, "Server started");

    axum::serve(listener, router(state))
        .await
        .context("Server error")?;
    Ok(())
}
