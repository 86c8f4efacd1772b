//! Per-operation call descriptors.
//!
//! The pipeline itself is phase-agnostic; everything that differs between
//! init, cancel, refund, and status is captured here as data. Adding a
//! gateway operation means adding a descriptor constructor, not a new
//! pipeline.

use std::fmt;

use crate::instrument::Instrument;
use crate::transport::CallMethod;

/// The four gateway operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Init,
    Cancel,
    Refund,
    Status,
}

impl Phase {
    pub const ALL: [Phase; 4] = [Phase::Init, Phase::Cancel, Phase::Refund, Phase::Status];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::Cancel => "cancel",
            Phase::Refund => "refund",
            Phase::Status => "status",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything the pipeline needs to shape one gateway call: the verb, the
/// resolved path, whether an envelope body rides along, and whether amount
/// conversion applies to this operation's payloads.
#[derive(Debug, Clone)]
pub struct OpDescriptor {
    pub phase: Phase,
    pub method: CallMethod,
    pub path: String,
    pub enveloped: bool,
    pub converts_amount: bool,
}

impl OpDescriptor {
    /// Collection initiation. Enveloped POST to the instrument's endpoint.
    pub fn init(instrument: Instrument) -> Self {
        Self {
            phase: Phase::Init,
            method: CallMethod::Post,
            path: format!("/v3/{}/init", instrument.init_segment()),
            enveloped: true,
            converts_amount: true,
        }
    }

    /// Cancellation of a pending transaction. Body-less POST; identity
    /// rides in the path.
    pub fn cancel(merchant_id: &str, txn_id: &str) -> Self {
        Self {
            phase: Phase::Cancel,
            method: CallMethod::Post,
            path: format!("/v3/transaction/{merchant_id}/{txn_id}/cancel"),
            enveloped: false,
            converts_amount: false,
        }
    }

    /// Refund against a completed transaction. Enveloped POST, one shared
    /// endpoint for all instruments.
    pub fn refund() -> Self {
        Self {
            phase: Phase::Refund,
            method: CallMethod::Post,
            path: "/v3/credit/refund".to_string(),
            enveloped: true,
            converts_amount: true,
        }
    }

    /// Authoritative state lookup. GET; identity rides in the path.
    pub fn status(merchant_id: &str, txn_id: &str) -> Self {
        Self {
            phase: Phase::Status,
            method: CallMethod::Get,
            path: format!("/v3/transaction/{merchant_id}/{txn_id}/status"),
            enveloped: false,
            converts_amount: true,
        }
    }
}
