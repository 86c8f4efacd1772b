//! Gateway envelope codec.
//!
//! Outbound request bodies are wrapped as `{"request": base64(json)}`. The
//! JSON passes through one canonical writer (struct fields serialize in
//! declaration order, free-form maps are `BTreeMap`), because the `X-VERIFY`
//! signature covers the exact base64 bytes. Any encoding drift between
//! signer and body builder breaks verification at the gateway, so both pull
//! from the same canonical string.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Envelope codec errors
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Request serialization failed: {0}")]
    Encode(String),

    #[error("Empty gateway response body")]
    EmptyBody,

    #[error("Malformed gateway response: {0}")]
    MalformedReply(String),

    #[error("Callback body is not valid base64: {0}")]
    BadBase64(String),

    #[error("Callback payload is not valid JSON: {0}")]
    MalformedPayload(String),
}

/// Literal wire wrapper for enveloped POST bodies.
#[derive(Debug, Serialize, Deserialize)]
pub struct EnvelopeBody {
    pub request: String,
}

/// Literal wire wrapper for inbound callback deliveries.
#[derive(Debug, Serialize, Deserialize)]
pub struct CallbackBody {
    pub response: String,
}

/// Canonical JSON text for `value`.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, CodecError> {
    serde_json::to_string(value).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Base64 over already-canonical JSON text.
pub fn encode_canonical(json: &str) -> String {
    BASE64.encode(json.as_bytes())
}

/// Canonical JSON for `value`, then base64. Shorthand for the two steps.
pub fn encode<T: Serialize>(value: &T) -> Result<String, CodecError> {
    Ok(encode_canonical(&canonical_json(value)?))
}

/// Decode a gateway response body.
///
/// Empty and whitespace-only bodies are a distinct fault so callers never
/// feed nothing into serde and report a misleading parse error.
pub fn decode_reply<T: DeserializeOwned>(raw: &str) -> Result<T, CodecError> {
    if raw.trim().is_empty() {
        return Err(CodecError::EmptyBody);
    }
    serde_json::from_str(raw).map_err(|e| CodecError::MalformedReply(e.to_string()))
}

/// Decode a base64 callback payload to its JSON form.
pub fn decode_callback<T: DeserializeOwned>(raw_b64: &str) -> Result<T, CodecError> {
    let bytes = BASE64
        .decode(raw_b64.trim())
        .map_err(|e| CodecError::BadBase64(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| CodecError::MalformedPayload(e.to_string()))
}
