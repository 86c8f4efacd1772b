//! Inbound gateway callbacks.
//!
//! The gateway pushes payment results to the callback URL registered at
//! init time. The `X-VERIFY` signature is checked over the raw base64
//! payload exactly as the gateway sent it, before any decoding; a tampered
//! byte fails verification even if the decoded JSON looks plausible. Every
//! delivery attempt lands in the audit trail, verified or not, including
//! bodies that never parsed as a response wrapper.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, warn};
use ulid::Ulid;

use crate::audit::{AuditStore, CallbackAttempt};
use crate::envelope;
use crate::instrument::{Instrument, InstrumentRegistry};
use crate::pipeline::types::{GatewayReply, PaymentReport, PaymentSummary};

/// Callback handling faults
#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("Callback signature missing or invalid")]
    Unverified,

    #[error("Malformed callback payload: {0}")]
    Malformed(String),

    #[error("Instrument not configured: {0}")]
    NotConfigured(String),
}

impl CallbackError {
    pub fn code(&self) -> &'static str {
        match self {
            CallbackError::Unverified => "SIGNATURE_INVALID",
            CallbackError::Malformed(_) => "MALFORMED_CALLBACK",
            CallbackError::NotConfigured(_) => "INSTRUMENT_NOT_CONFIGURED",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            CallbackError::Unverified => 401,
            CallbackError::Malformed(_) | CallbackError::NotConfigured(_) => 400,
        }
    }
}

/// A verified, decoded callback ready for the merchant's own handling.
#[derive(Debug, Clone)]
pub struct CallbackNotice {
    pub instrument: Instrument,
    pub success: bool,
    pub code: String,
    pub message: String,
    pub report: Option<PaymentSummary>,
}

/// Verifies and decodes callback deliveries.
pub struct CallbackVerifier {
    registry: Arc<InstrumentRegistry>,
    audit: Arc<dyn AuditStore>,
}

impl CallbackVerifier {
    pub fn new(registry: Arc<InstrumentRegistry>, audit: Arc<dyn AuditStore>) -> Self {
        Self { registry, audit }
    }

    /// Handle one callback delivery. `body` is the request body exactly as
    /// received; the `{"response": ...}` wrapper is peeled here so the
    /// signature is checked over the raw base64 inside it.
    ///
    /// Returns the decoded notice only when the signature verifies against
    /// the instrument's secret. The raw attempt is recorded in every branch,
    /// wrapperless bodies included, so forged or broken deliveries remain
    /// visible to operators.
    pub async fn handle(
        &self,
        instrument: Instrument,
        body: &str,
        signature: Option<&str>,
    ) -> Result<CallbackNotice, CallbackError> {
        let Some(profile) = self.registry.profile(instrument) else {
            self.record(instrument, body, signature, false).await;
            return Err(CallbackError::NotConfigured(instrument.to_string()));
        };

        let wrapper: envelope::CallbackBody = match serde_json::from_str(body) {
            Ok(w) => w,
            Err(e) => {
                self.record(instrument, body, signature, false).await;
                warn!(instrument = %instrument, "Rejected callback with no response wrapper");
                return Err(CallbackError::Malformed(format!(
                    "body is not a response wrapper: {e}"
                )));
            }
        };

        let valid = signature
            .map(|sig| profile.signing.verify(&wrapper.response, sig))
            .unwrap_or(false);
        self.record(instrument, &wrapper.response, signature, valid).await;

        if !valid {
            warn!(instrument = %instrument, "Rejected callback with bad or missing signature");
            return Err(CallbackError::Unverified);
        }

        let payload: GatewayReply<PaymentReport> = envelope::decode_callback(&wrapper.response)
            .map_err(|e| CallbackError::Malformed(e.to_string()))?;

        let notice = CallbackNotice {
            instrument,
            success: payload.success,
            code: payload.code,
            message: payload.message,
            report: payload.data.map(|d| d.into_api(true)),
        };
        info!(
            instrument = %instrument,
            success = notice.success,
            txn_id = notice
                .report
                .as_ref()
                .map(|r| r.transaction_id.as_str())
                .unwrap_or("-"),
            "Verified gateway callback"
        );
        Ok(notice)
    }

    async fn record(
        &self,
        instrument: Instrument,
        raw_body: &str,
        signature: Option<&str>,
        valid: bool,
    ) {
        let attempt = CallbackAttempt {
            id: Ulid::new().to_string(),
            instrument,
            raw_body: raw_body.to_string(),
            signature: signature.map(str::to_string),
            valid,
            received_at: Utc::now(),
        };
        if let Err(e) = self.audit.record_callback(attempt).await {
            error!(instrument = %instrument, error = %e, "Failed to record callback attempt");
        }
    }
}
