//! Downstream API response envelope.
//!
//! Every response carries `{success, code, message, data}` so merchant
//! backends parse one shape for gateway passthroughs and local faults
//! alike.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::callback::CallbackError;
use crate::pipeline::PipelineError;

/// Uniform downstream response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiReply<T> {
    pub success: bool,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiReply<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            code: "SUCCESS".to_string(),
            message: "ok".to_string(),
            data: Some(data),
        }
    }
}

impl ApiReply<()> {
    pub fn fault(code: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            code: code.to_string(),
            message: message.into(),
            data: None,
        }
    }
}

/// Map a pipeline fault to its HTTP response.
pub fn fault_response(err: &PipelineError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ApiReply::fault(err.code(), err.to_string()))).into_response()
}

/// Map a callback fault to its HTTP response.
pub fn callback_fault_response(err: &CallbackError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ApiReply::fault(err.code(), err.to_string()))).into_response()
}
