//! Transport fault types and retry classification.

use thiserror::Error;

/// Faults raised by the gateway transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// TCP connect failed (refused, DNS, TLS handshake).
    #[error("Gateway connect failed: {0}")]
    Connect(String),

    /// The configured deadline elapsed before a full response arrived.
    #[error("Gateway call timed out: {0}")]
    Timeout(String),

    /// Connection dropped mid-exchange (reset, broken pipe, truncated body).
    #[error("Gateway connection dropped: {0}")]
    ConnectionDropped(String),

    /// Gateway answered with a non-2xx status. The body is retained for
    /// business-fault classification upstream.
    #[error("Gateway returned HTTP {status}")]
    Status { status: u16, body: String },

    /// Retry budget exhausted. Carries the attempt count and last fault.
    #[error("Gateway unreachable after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: Box<TransportError>,
    },

    /// Client construction or request assembly failed before any dispatch.
    #[error("Transport configuration invalid: {0}")]
    Config(String),
}

impl TransportError {
    /// Whether a retry may help.
    ///
    /// Only connectivity faults and 5xx qualify. A 4xx means the gateway
    /// received and rejected the call; replaying a rejected financial
    /// request cannot succeed and risks duplicate side effects.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Connect(_)
            | TransportError::Timeout(_)
            | TransportError::ConnectionDropped(_) => true,
            TransportError::Status { status, .. } => *status >= 500,
            TransportError::Exhausted { .. } | TransportError::Config(_) => false,
        }
    }

    /// The HTTP status carried by this fault, if any. Looks through the
    /// `Exhausted` wrapper to the final attempt.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            TransportError::Exhausted { source, .. } => source.status(),
            _ => None,
        }
    }

    /// The response body carried by this fault, if any.
    pub fn body(&self) -> Option<&str> {
        match self {
            TransportError::Status { body, .. } => Some(body),
            TransportError::Exhausted { source, .. } => source.body(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::ConnectionDropped(err.to_string())
        }
    }
}
