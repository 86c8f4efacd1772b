//! The shared transaction pipeline.
//!
//! Every gateway operation on every instrument runs the same steps:
//! resolve the instrument profile, fix the transaction id, convert amounts
//! to minor units, envelope and sign, dispatch with retry, decode and
//! convert back, write the audit trail, classify failures. What differs
//! between operations is data, carried by [`descriptor::OpDescriptor`] and
//! the payload types. There is one pipeline, not one per instrument.

pub mod descriptor;
pub mod error;
pub mod state;
pub mod txid;
pub mod types;

pub use descriptor::{OpDescriptor, Phase};
pub use error::{BusinessFault, PipelineError};
pub use state::TxnState;
pub use txid::TxnIdGenerator;
pub use types::{
    CancelRequest, GatewayReply, InitReceipt, InitRequest, InitResult, PayModeBreakdown,
    PaymentSummary, RefundReceipt, RefundRequest,
};

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{error, info, warn};

use crate::audit::{AuditStore, TransactionRecord};
use crate::envelope::{self, EnvelopeBody};
use crate::instrument::{Instrument, InstrumentProfile, InstrumentRegistry};
use crate::money::to_minor;
use crate::transport::{GatewayTransport, OutboundCall};

use error::classify_failure;
use types::{InitData, PaymentReport, WireInitRequest, WireRefundRequest};

pub struct TransactionPipeline {
    registry: Arc<InstrumentRegistry>,
    transport: Arc<GatewayTransport>,
    audit: Arc<dyn AuditStore>,
    txn_ids: TxnIdGenerator,
    /// How many times a colliding generated id is redrawn before giving up.
    collision_retries: u32,
}

impl TransactionPipeline {
    pub fn new(
        registry: Arc<InstrumentRegistry>,
        transport: Arc<GatewayTransport>,
        audit: Arc<dyn AuditStore>,
        txn_ids: TxnIdGenerator,
        collision_retries: u32,
    ) -> Self {
        Self {
            registry,
            transport,
            audit,
            txn_ids,
            collision_retries,
        }
    }

    /// Start a collection on the given instrument.
    pub async fn init(
        &self,
        instrument: Instrument,
        request: InitRequest,
    ) -> Result<InitReceipt, PipelineError> {
        let profile = self.profile(instrument)?;
        let descriptor = OpDescriptor::init(instrument);
        let txn_id = self.fresh_txn_id(instrument).await?;
        let amount = to_minor(request.amount)?;

        let wire = WireInitRequest {
            merchant_id: request.merchant_id,
            transaction_id: txn_id.clone(),
            merchant_order_id: request.order_id,
            amount,
            message: request.message,
            expires_in: request.expires_in,
            store_id: request.store_id,
            terminal_id: request.terminal_id,
            payer_phone: request.payer_phone,
        };

        let reply = self
            .execute::<_, InitData>(profile, &descriptor, &txn_id, Some(&wire))
            .await?;
        let convert = descriptor.converts_amount;
        Ok(InitReceipt {
            transaction_id: txn_id,
            reply: reply.map_data(|d| d.into_api(convert)),
        })
    }

    /// Cancel a transaction that has not completed.
    pub async fn cancel(
        &self,
        instrument: Instrument,
        request: CancelRequest,
    ) -> Result<GatewayReply<PaymentSummary>, PipelineError> {
        let profile = self.profile(instrument)?;
        let descriptor = OpDescriptor::cancel(&request.merchant_id, &request.transaction_id);
        let reply = self
            .execute::<(), PaymentReport>(profile, &descriptor, &request.transaction_id, None)
            .await?;
        let convert = descriptor.converts_amount;
        Ok(reply.map_data(|d| d.into_api(convert)))
    }

    /// Refund a completed transaction, in full or in part. The refund is a
    /// transaction of its own and gets a freshly generated id.
    pub async fn refund(
        &self,
        instrument: Instrument,
        request: RefundRequest,
    ) -> Result<RefundReceipt, PipelineError> {
        let profile = self.profile(instrument)?;
        let descriptor = OpDescriptor::refund();
        let refund_txn_id = self.fresh_txn_id(instrument).await?;
        let amount = to_minor(request.amount)?;

        let wire = WireRefundRequest {
            merchant_id: request.merchant_id,
            transaction_id: refund_txn_id.clone(),
            original_transaction_id: request.transaction_id,
            amount,
            message: request.message,
        };

        let reply = self
            .execute::<_, PaymentReport>(profile, &descriptor, &refund_txn_id, Some(&wire))
            .await?;
        let convert = descriptor.converts_amount;
        Ok(RefundReceipt {
            refund_transaction_id: refund_txn_id,
            reply: reply.map_data(|d| d.into_api(convert)),
        })
    }

    /// Authoritative state of a transaction, straight from the gateway.
    pub async fn status(
        &self,
        instrument: Instrument,
        merchant_id: &str,
        transaction_id: &str,
    ) -> Result<GatewayReply<PaymentSummary>, PipelineError> {
        let profile = self.profile(instrument)?;
        let descriptor = OpDescriptor::status(merchant_id, transaction_id);
        let reply = self
            .execute::<(), PaymentReport>(profile, &descriptor, transaction_id, None)
            .await?;
        let convert = descriptor.converts_amount;
        Ok(reply.map_data(|d| d.into_api(convert)))
    }

    fn profile(&self, instrument: Instrument) -> Result<&InstrumentProfile, PipelineError> {
        self.registry
            .profile(instrument)
            .ok_or_else(|| PipelineError::NotConfigured(instrument.to_string()))
    }

    /// Draw a transaction id that is not already in the audit trail.
    /// Collisions are redrawn a bounded number of times; an audit outage
    /// does not block the payment, the gateway's duplicate detection is
    /// the backstop.
    async fn fresh_txn_id(&self, instrument: Instrument) -> Result<String, PipelineError> {
        for attempt in 0..=self.collision_retries {
            let candidate = self.txn_ids.generate(instrument.txn_prefix());
            match self.audit.exists(&candidate).await {
                Ok(false) => return Ok(candidate),
                Ok(true) => {
                    warn!(txn_id = %candidate, attempt, "Generated transaction id collided, redrawing");
                }
                Err(e) => {
                    warn!(error = %e, "Audit lookup failed during id generation, proceeding unchecked");
                    return Ok(candidate);
                }
            }
        }
        Err(PipelineError::Internal(
            "Transaction id generation exhausted its collision budget".to_string(),
        ))
    }

    /// The shared call skeleton. `body` is `Some` for enveloped operations
    /// and `None` for path-only ones; `D` is the reply data shape.
    async fn execute<B: Serialize, D: DeserializeOwned>(
        &self,
        profile: &InstrumentProfile,
        descriptor: &OpDescriptor,
        txn_id: &str,
        body: Option<&B>,
    ) -> Result<GatewayReply<D>, PipelineError> {
        // Envelope and signature come first; nothing is recorded or
        // dispatched for a payload that cannot be canonically encoded.
        let (request_json, envelope_b64, call_body) = match body {
            Some(value) => {
                let canonical = envelope::canonical_json(value)?;
                let b64 = envelope::encode_canonical(&canonical);
                let call_body = envelope::canonical_json(&EnvelopeBody {
                    request: b64.clone(),
                })?;
                (canonical, Some(b64), Some(call_body))
            }
            None => (descriptor.path.clone(), None, None),
        };

        let signature = match &envelope_b64 {
            Some(b64) => profile.signing.sign(&format!("{}{}", b64, descriptor.path)),
            None => profile.signing.sign(&descriptor.path),
        };

        let mut headers: Vec<(&'static str, String)> = vec![
            ("Content-Type", "application/json".to_string()),
            ("X-VERIFY", signature),
            ("X-CALLBACK-URL", profile.callback_url.clone()),
            ("X-PROVIDER-ID", profile.provider_id.clone()),
        ];
        if descriptor.enveloped {
            headers.push(("X-CALL-MODE", "POST".to_string()));
        }

        let call = OutboundCall {
            method: descriptor.method,
            path: descriptor.path.clone(),
            headers,
            body: call_body,
        };

        self.record_new(profile.kind, descriptor.phase, txn_id, request_json)
            .await;
        self.mark(txn_id, descriptor.phase, TxnState::Sent).await;

        info!(
            txn_id = %txn_id,
            instrument = %profile.kind,
            phase = %descriptor.phase,
            path = %descriptor.path,
            "Dispatching gateway call"
        );

        match self.transport.execute(&call).await {
            Ok(reply) => match envelope::decode_reply::<GatewayReply<D>>(&reply.body) {
                Ok(decoded) => {
                    self.finish(txn_id, descriptor.phase, reply.body, TxnState::Succeeded)
                        .await;
                    info!(
                        txn_id = %txn_id,
                        phase = %descriptor.phase,
                        success = decoded.success,
                        code = %decoded.code,
                        "Gateway call completed"
                    );
                    Ok(decoded)
                }
                Err(codec_err) => {
                    // 2xx arrived but did not decode; keep the raw body
                    // for forensics.
                    self.finish(txn_id, descriptor.phase, reply.body, TxnState::FailedTerminal)
                        .await;
                    Err(PipelineError::Serialization(codec_err))
                }
            },
            Err(transport_err) => {
                let failure_body = transport_err.body().map(str::to_string);
                let classified = classify_failure(transport_err);
                let state = match &classified {
                    PipelineError::Transport(_) => TxnState::FailedRetryable,
                    _ => TxnState::FailedTerminal,
                };
                match failure_body {
                    Some(body) => self.finish(txn_id, descriptor.phase, body, state).await,
                    None => self.mark(txn_id, descriptor.phase, state).await,
                }
                warn!(
                    txn_id = %txn_id,
                    phase = %descriptor.phase,
                    state = %state,
                    error = %classified,
                    "Gateway call failed"
                );
                Err(classified)
            }
        }
    }

    // Audit writes are deliberate fire-and-log: a broken audit store is an
    // incident, not a reason to fail or mask a payment result.

    async fn record_new(&self, instrument: Instrument, phase: Phase, txn_id: &str, request_json: String) {
        let record = TransactionRecord::new(txn_id, instrument, phase, request_json);
        if let Err(e) = self.audit.insert(record).await {
            error!(txn_id = %txn_id, error = %e, "Audit insert failed");
        }
    }

    async fn mark(&self, txn_id: &str, phase: Phase, state: TxnState) {
        if let Err(e) = self.audit.mark_state(txn_id, phase, state).await {
            error!(txn_id = %txn_id, state = %state, error = %e, "Audit state update failed");
        }
    }

    async fn finish(&self, txn_id: &str, phase: Phase, response_json: String, state: TxnState) {
        if let Err(e) = self.audit.complete(txn_id, phase, response_json, state).await {
            error!(txn_id = %txn_id, state = %state, error = %e, "Audit completion failed");
        }
    }
}
