//! Downstream HTTP handlers.
//!
//! Handlers stay thin: parse the instrument, delegate to the pipeline or
//! the callback verifier, map faults to the shared response envelope.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::instrument::Instrument;
use crate::pipeline::types::{
    CancelRequest, GatewayReply, InitRequest, InitResult, PaymentSummary, RefundRequest,
};

use super::state::AppState;
use super::types::{ApiReply, callback_fault_response, fault_response};

fn parse_instrument(raw: &str) -> Result<Instrument, Response> {
    raw.parse::<Instrument>().map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiReply::fault("UNKNOWN_INSTRUMENT", e.to_string())),
        )
            .into_response()
    })
}

/// Init response payload: the locally generated transaction id plus
/// whatever the gateway returned, flattened alongside it.
#[derive(Debug, Serialize)]
struct InitResponseData {
    transaction_id: String,
    #[serde(flatten)]
    detail: Option<InitResult>,
}

#[derive(Debug, Serialize)]
struct RefundResponseData {
    refund_transaction_id: String,
    #[serde(flatten)]
    detail: Option<PaymentSummary>,
}

/// POST /api/v1/pay/{instrument}/init
pub async fn init(
    State(state): State<Arc<AppState>>,
    Path(instrument): Path<String>,
    Json(request): Json<InitRequest>,
) -> Response {
    let instrument = match parse_instrument(&instrument) {
        Ok(i) => i,
        Err(resp) => return resp,
    };

    match state.pipeline.init(instrument, request).await {
        Ok(receipt) => {
            let reply = receipt.reply;
            Json(GatewayReply {
                success: reply.success,
                code: reply.code,
                message: reply.message,
                data: Some(InitResponseData {
                    transaction_id: receipt.transaction_id,
                    detail: reply.data,
                }),
            })
            .into_response()
        }
        Err(err) => fault_response(&err),
    }
}

/// POST /api/v1/pay/{instrument}/cancel
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(instrument): Path<String>,
    Json(request): Json<CancelRequest>,
) -> Response {
    let instrument = match parse_instrument(&instrument) {
        Ok(i) => i,
        Err(resp) => return resp,
    };

    match state.pipeline.cancel(instrument, request).await {
        Ok(reply) => Json(reply).into_response(),
        Err(err) => fault_response(&err),
    }
}

/// POST /api/v1/pay/{instrument}/refund
pub async fn refund(
    State(state): State<Arc<AppState>>,
    Path(instrument): Path<String>,
    Json(request): Json<RefundRequest>,
) -> Response {
    let instrument = match parse_instrument(&instrument) {
        Ok(i) => i,
        Err(resp) => return resp,
    };

    match state.pipeline.refund(instrument, request).await {
        Ok(receipt) => {
            let reply = receipt.reply;
            Json(GatewayReply {
                success: reply.success,
                code: reply.code,
                message: reply.message,
                data: Some(RefundResponseData {
                    refund_transaction_id: receipt.refund_transaction_id,
                    detail: reply.data,
                }),
            })
            .into_response()
        }
        Err(err) => fault_response(&err),
    }
}

/// GET /api/v1/pay/{instrument}/status/{merchant_id}/{txn_id}
pub async fn status(
    State(state): State<Arc<AppState>>,
    Path((instrument, merchant_id, txn_id)): Path<(String, String, String)>,
) -> Response {
    let instrument = match parse_instrument(&instrument) {
        Ok(i) => i,
        Err(resp) => return resp,
    };

    match state.pipeline.status(instrument, &merchant_id, &txn_id).await {
        Ok(reply) => Json(reply).into_response(),
        Err(err) => fault_response(&err),
    }
}

#[derive(Debug, Serialize)]
struct CallbackAck {
    instrument: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    transaction_id: Option<String>,
}

/// POST /api/v1/callback/{instrument}
///
/// The body is read raw and handed to the verifier whole: the signature is
/// checked over the exact base64 bytes the gateway sent, and a body that
/// never parses as a response wrapper is still audited before the 400.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Path(instrument): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let instrument = match parse_instrument(&instrument) {
        Ok(i) => i,
        Err(resp) => return resp,
    };

    let signature = headers.get("X-VERIFY").and_then(|v| v.to_str().ok());

    match state.callbacks.handle(instrument, &body, signature).await {
        Ok(notice) => Json(ApiReply::ok(CallbackAck {
            instrument: notice.instrument.to_string(),
            transaction_id: notice.report.map(|r| r.transaction_id),
        }))
        .into_response(),
        Err(err) => callback_fault_response(&err),
    }
}

#[derive(Debug, Serialize)]
pub struct HealthData {
    pub timestamp_ms: u64,
    /// How many instruments this deployment serves.
    pub instruments: usize,
}

/// GET /api/v1/health
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<ApiReply<HealthData>>) {
    let timestamp_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    (
        StatusCode::OK,
        Json(ApiReply::ok(HealthData {
            timestamp_ms,
            instruments: state.registry.len(),
        })),
    )
}
