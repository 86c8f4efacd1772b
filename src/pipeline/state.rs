//! Transaction call lifecycle states.
//!
//! Every outbound gateway call moves through an explicit, persisted state
//! machine. State IDs are stable integers so audit rows survive enum
//! reordering.

use std::fmt;

/// Lifecycle of one gateway round trip.
///
/// Terminal states: SUCCEEDED (20), FAILED_RETRYABLE (-10),
/// FAILED_TERMINAL (-20).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum TxnState {
    /// Request built and recorded, nothing on the wire yet
    New = 0,

    /// Handed to the transport (persist-before-call)
    Sent = 10,

    /// Terminal: gateway answered and the reply decoded
    Succeeded = 20,

    /// Terminal for this call: transport never got an answer. The request
    /// may be replayed later under the same transaction id.
    FailedRetryable = -10,

    /// Terminal: gateway rejected the call. Replaying cannot succeed.
    FailedTerminal = -20,
}

impl TxnState {
    /// Whether no further transition is possible for this call.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TxnState::Succeeded | TxnState::FailedRetryable | TxnState::FailedTerminal
        )
    }

    /// Numeric state ID for persisted storage.
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    /// Convert from a persisted state ID.
    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(TxnState::New),
            10 => Some(TxnState::Sent),
            20 => Some(TxnState::Succeeded),
            -10 => Some(TxnState::FailedRetryable),
            -20 => Some(TxnState::FailedTerminal),
            _ => None,
        }
    }

    /// Human-readable state name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TxnState::New => "NEW",
            TxnState::Sent => "SENT",
            TxnState::Succeeded => "SUCCEEDED",
            TxnState::FailedRetryable => "FAILED_RETRYABLE",
            TxnState::FailedTerminal => "FAILED_TERMINAL",
        }
    }
}

impl fmt::Display for TxnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<i16> for TxnState {
    type Error = ();

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        TxnState::from_id(value).ok_or(())
    }
}
