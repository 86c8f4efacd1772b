//! Pipeline fault taxonomy and gateway failure classification.
//!
//! Error codes and HTTP statuses are fixed here so every handler maps
//! faults the same way.

use once_cell::sync::Lazy;
use thiserror::Error;

use crate::envelope::CodecError;
use crate::money::MoneyError;
use crate::transport::TransportError;

use super::types::GatewayReply;

/// Business rejections the gateway reports for specific causes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusinessFault {
    #[error("Duplicate transaction: {0}")]
    Duplicate(String),

    #[error("Gateway rejected credentials: {0}")]
    Unauthorized(String),

    #[error("Transaction not found: {0}")]
    NotFound(String),

    #[error("Gateway rejected request: {0}")]
    BadRequest(String),
}

/// Tokens scanned, in order, when a failure carries no structured code.
static FALLBACK_TOKENS: Lazy<Vec<(&'static str, fn(String) -> BusinessFault)>> =
    Lazy::new(|| {
        vec![
            ("DUPLICATE", BusinessFault::Duplicate as fn(String) -> BusinessFault),
            ("UNAUTHORIZED", BusinessFault::Unauthorized),
            ("AUTHORIZATION", BusinessFault::Unauthorized),
            ("NOT_FOUND", BusinessFault::NotFound),
            ("NOT FOUND", BusinessFault::NotFound),
            ("BAD_REQUEST", BusinessFault::BadRequest),
            ("BAD REQUEST", BusinessFault::BadRequest),
            ("INVALID", BusinessFault::BadRequest),
        ]
    });

impl BusinessFault {
    /// Classify from the structured `code` field of a gateway reply.
    pub fn from_code(code: &str, message: &str) -> Option<Self> {
        let detail = if message.is_empty() {
            code.to_string()
        } else {
            message.to_string()
        };
        match code {
            "DUPLICATE_TXN" | "DUPLICATE_TRANSACTION" => Some(BusinessFault::Duplicate(detail)),
            "UNAUTHORIZED" | "AUTHORIZATION_FAILED" | "KEY_NOT_CONFIGURED" => {
                Some(BusinessFault::Unauthorized(detail))
            }
            "TRANSACTION_NOT_FOUND" | "TXN_NOT_FOUND" | "NO_RECORD_FOUND" => {
                Some(BusinessFault::NotFound(detail))
            }
            "BAD_REQUEST" | "INVALID_REQUEST" | "INVALID_TXN_ID" => {
                Some(BusinessFault::BadRequest(detail))
            }
            _ => None,
        }
    }

    /// Substring fallback over raw failure text, for rejections that never
    /// decoded into the reply envelope.
    pub fn from_text(text: &str) -> Option<Self> {
        let upper = text.to_ascii_uppercase();
        FALLBACK_TOKENS
            .iter()
            .find(|(token, _)| upper.contains(token))
            .map(|(_, build)| build(snippet(text)))
    }
}

/// Faults surfaced to callers of the transaction pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid amount: {0}")]
    Amount(#[from] MoneyError),

    #[error("Serialization fault: {0}")]
    Serialization(#[from] CodecError),

    /// Gateway never gave a usable answer (connectivity, timeout, 5xx,
    /// retry budget spent).
    #[error("Gateway unreachable: {0}")]
    Transport(TransportError),

    #[error(transparent)]
    Business(#[from] BusinessFault),

    /// Instrument parsed but this deployment carries no profile for it.
    #[error("Instrument not configured: {0}")]
    NotConfigured(String),

    #[error("Internal fault: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Stable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Amount(_) => "INVALID_AMOUNT",
            PipelineError::Serialization(_) => "SERIALIZATION_FAULT",
            PipelineError::Transport(_) => "GATEWAY_UNREACHABLE",
            PipelineError::Business(BusinessFault::Duplicate(_)) => "DUPLICATE_TXN",
            PipelineError::Business(BusinessFault::Unauthorized(_)) => "UNAUTHORIZED",
            PipelineError::Business(BusinessFault::NotFound(_)) => "TXN_NOT_FOUND",
            PipelineError::Business(BusinessFault::BadRequest(_)) => "BAD_REQUEST",
            PipelineError::NotConfigured(_) => "INSTRUMENT_NOT_CONFIGURED",
            PipelineError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status for API responses.
    pub fn http_status(&self) -> u16 {
        match self {
            PipelineError::Amount(_)
            | PipelineError::NotConfigured(_)
            | PipelineError::Business(BusinessFault::Duplicate(_))
            | PipelineError::Business(BusinessFault::BadRequest(_)) => 400,
            PipelineError::Business(BusinessFault::Unauthorized(_)) => 401,
            PipelineError::Business(BusinessFault::NotFound(_)) => 404,
            PipelineError::Serialization(_)
            | PipelineError::Transport(_)
            | PipelineError::Internal(_) => 500,
        }
    }
}

/// Map a failed gateway exchange to the caller-facing fault.
///
/// Only 4xx rejections are candidates for business classification; 5xx and
/// connectivity faults stay transport-level. Structured codes win over the
/// substring fallback, and anything unrecognized becomes a generic internal
/// fault that keeps the original text.
pub(crate) fn classify_failure(err: TransportError) -> PipelineError {
    let client_reject = err.status().is_some_and(|s| (400..500).contains(&s));
    if !client_reject {
        return PipelineError::Transport(err);
    }

    let body = err.body().unwrap_or_default();
    if let Ok(reply) = serde_json::from_str::<GatewayReply<serde_json::Value>>(body) {
        if let Some(fault) = BusinessFault::from_code(&reply.code, &reply.message) {
            return PipelineError::Business(fault);
        }
    }
    if let Some(fault) = BusinessFault::from_text(body) {
        return PipelineError::Business(fault);
    }

    let status = err.status().unwrap_or_default();
    PipelineError::Internal(format!(
        "Gateway rejected call with HTTP {status}: {}",
        snippet(body)
    ))
}

/// Bounded copy of failure text for fault payloads. Gateway bodies can be
/// arbitrarily large.
fn snippet(text: &str) -> String {
    const MAX: usize = 240;
    if text.len() <= MAX {
        text.trim().to_string()
    } else {
        let mut cut: String = text.chars().take(MAX).collect();
        cut.push_str("...");
        cut
    }
}
