//! Request and reply payloads, both caller-facing and wire-facing.
//!
//! Caller-facing types carry amounts in major units as `Decimal`; wire
//! types carry minor-unit `i64` and serialize in the gateway's camelCase.
//! Wire structs keep their field order stable: the envelope signature
//! covers the serialized bytes.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money::to_major;

// ============================================================================
// Gateway reply envelope
// ============================================================================

/// The gateway's uniform reply shape. `data` varies by operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayReply<D> {
    pub success: bool,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<D>,
}

impl<D> GatewayReply<D> {
    pub fn map_data<T>(self, f: impl FnOnce(D) -> T) -> GatewayReply<T> {
        GatewayReply {
            success: self.success,
            code: self.code,
            message: self.message,
            data: self.data.map(f),
        }
    }
}

// ============================================================================
// Caller-facing requests (downstream API, major units)
// ============================================================================

/// Collection initiation request from the merchant backend.
#[derive(Debug, Clone, Deserialize)]
pub struct InitRequest {
    pub merchant_id: String,
    /// Merchant's own order reference; echoed back, never used as the
    /// gateway idempotency key.
    pub order_id: String,
    pub amount: Decimal,
    pub message: Option<String>,
    /// QR or link validity in seconds, where the instrument supports it.
    pub expires_in: Option<u32>,
    pub store_id: Option<String>,
    pub terminal_id: Option<String>,
    /// Payer's phone number, required by the call-based instrument.
    pub payer_phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelRequest {
    pub merchant_id: String,
    pub transaction_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefundRequest {
    pub merchant_id: String,
    /// Id of the transaction being refunded.
    pub transaction_id: String,
    pub amount: Decimal,
    pub message: Option<String>,
}

// ============================================================================
// Wire requests (gateway API, minor units, camelCase)
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireInitRequest {
    pub merchant_id: String,
    pub transaction_id: String,
    pub merchant_order_id: String,
    pub amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer_phone: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireRefundRequest {
    pub merchant_id: String,
    /// Fresh id for the refund itself; the idempotency key of this call.
    pub transaction_id: String,
    pub original_transaction_id: String,
    pub amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ============================================================================
// Wire reply data (gateway API, minor units)
// ============================================================================

/// Init reply payload. Which artifact field is present depends on the
/// instrument (QR string, payment link, terminal acknowledgement).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitData {
    pub transaction_id: String,
    pub provider_reference_id: Option<String>,
    pub amount: Option<i64>,
    pub qr_string: Option<String>,
    pub pay_link: Option<String>,
}

/// Per-mode settlement split reported by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayModeAmount {
    pub mode: String,
    pub amount: i64,
}

/// Sparse transaction report. Shared by cancel and refund replies, status
/// replies, and callback payloads; absent fields stay `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReport {
    pub transaction_id: String,
    pub merchant_id: Option<String>,
    pub provider_reference_id: Option<String>,
    pub amount: Option<i64>,
    /// Gateway-side payment state, e.g. `COMPLETED`, `PENDING`, `FAILED`.
    pub payment_state: Option<String>,
    pub response_code: Option<String>,
    #[serde(default)]
    pub payment_modes: Vec<PayModeAmount>,
    /// Free-form context echoed by the gateway. Ordered map so replies
    /// re-serialize deterministically.
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

// ============================================================================
// Caller-facing reply data (major units)
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct InitResult {
    /// Gateway echo of the submitted transaction id. Never serialized; the
    /// init response body carries the id exactly once, at the top level.
    #[serde(skip_serializing)]
    pub transaction_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_reference_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_string: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pay_link: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PayModeBreakdown {
    pub mode: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentSummary {
    pub transaction_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_reference_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_code: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub payment_modes: Vec<PayModeBreakdown>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
}

impl InitData {
    /// Lift to caller units. `convert` comes from the operation descriptor.
    pub fn into_api(self, convert: bool) -> InitResult {
        InitResult {
            transaction_id: self.transaction_id,
            provider_reference_id: self.provider_reference_id,
            amount: self.amount.map(|a| lift_amount(a, convert)),
            qr_string: self.qr_string,
            pay_link: self.pay_link,
        }
    }
}

impl PaymentReport {
    pub fn into_api(self, convert: bool) -> PaymentSummary {
        PaymentSummary {
            transaction_id: self.transaction_id,
            merchant_id: self.merchant_id,
            provider_reference_id: self.provider_reference_id,
            amount: self.amount.map(|a| lift_amount(a, convert)),
            payment_state: self.payment_state,
            response_code: self.response_code,
            payment_modes: self
                .payment_modes
                .into_iter()
                .map(|m| PayModeBreakdown {
                    mode: m.mode,
                    amount: lift_amount(m.amount, convert),
                })
                .collect(),
            context: self.context,
        }
    }
}

fn lift_amount(minor: i64, convert: bool) -> Decimal {
    if convert { to_major(minor) } else { Decimal::from(minor) }
}

// ============================================================================
// Operation receipts
// ============================================================================

/// What an init call hands back: the generated transaction id plus the
/// gateway's reply in caller units.
#[derive(Debug, Clone, Serialize)]
pub struct InitReceipt {
    pub transaction_id: String,
    pub reply: GatewayReply<InitResult>,
}

/// Same for refunds; the refund gets its own transaction id.
#[derive(Debug, Clone, Serialize)]
pub struct RefundReceipt {
    pub refund_transaction_id: String,
    pub reply: GatewayReply<PaymentSummary>,
}
