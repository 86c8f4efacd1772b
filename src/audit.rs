//! Audit trail for gateway traffic.
//!
//! Two things are recorded: one `TransactionRecord` per outbound round trip
//! (request payload, response payload, lifecycle state) and one
//! `CallbackAttempt` per inbound callback, valid or not. The store is a
//! port; the bundled implementation keeps everything in process memory and
//! doubles as the test store. A durable backend implements the same trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use thiserror::Error;

use crate::instrument::Instrument;
use crate::pipeline::descriptor::Phase;
use crate::pipeline::state::TxnState;

/// Audit store faults
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Audit store unavailable: {0}")]
    Unavailable(String),

    #[error("No audit record for transaction {txn_id} phase {phase}")]
    UnknownRecord { txn_id: String, phase: Phase },
}

/// One persisted request/response pair. A transaction phase accumulates one
/// of these per dispatch, so repeated status polls each leave a row.
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    pub txn_id: String,
    pub instrument: Instrument,
    pub phase: Phase,
    pub state: TxnState,
    /// Canonical JSON of the outbound payload, or the call path for
    /// body-less operations.
    pub request_json: String,
    /// Raw gateway response body once the round trip completed.
    pub response_json: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn new(
        txn_id: impl Into<String>,
        instrument: Instrument,
        phase: Phase,
        request_json: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            txn_id: txn_id.into(),
            instrument,
            phase,
            state: TxnState::New,
            request_json: request_json.into(),
            response_json: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One raw inbound callback delivery.
#[derive(Debug, Clone)]
pub struct CallbackAttempt {
    pub id: String,
    pub instrument: Instrument,
    /// Body exactly as received, before any decoding.
    pub raw_body: String,
    pub signature: Option<String>,
    /// Whether the signature verified against the instrument secret.
    pub valid: bool,
    pub received_at: DateTime<Utc>,
}

/// Persistence port for the audit trail.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Record a freshly built request in state NEW. A repeat of the same
    /// transaction phase appends a new row; earlier rows stay intact.
    async fn insert(&self, record: TransactionRecord) -> Result<(), AuditError>;

    /// Advance the lifecycle state of the newest row for the pair.
    async fn mark_state(
        &self,
        txn_id: &str,
        phase: Phase,
        state: TxnState,
    ) -> Result<(), AuditError>;

    /// Attach the gateway response and the terminal state in one write,
    /// against the newest row for the pair.
    async fn complete(
        &self,
        txn_id: &str,
        phase: Phase,
        response_json: String,
        state: TxnState,
    ) -> Result<(), AuditError>;

    /// The newest row recorded for the pair, if any.
    async fn find(
        &self,
        txn_id: &str,
        phase: Phase,
    ) -> Result<Option<TransactionRecord>, AuditError>;

    /// Whether any phase has been recorded under this transaction id.
    /// Used to detect generated-id collisions before dispatch.
    async fn exists(&self, txn_id: &str) -> Result<bool, AuditError>;

    /// Record an inbound callback delivery, verified or not.
    async fn record_callback(&self, attempt: CallbackAttempt) -> Result<(), AuditError>;
}

/// In-process store backed by concurrent maps. Each `{txn}:{phase}` key
/// holds the full run of attempts in arrival order.
#[derive(Debug, Default)]
pub struct MemoryAuditStore {
    transactions: DashMap<String, Vec<TransactionRecord>>,
    callbacks: DashMap<String, CallbackAttempt>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(txn_id: &str, phase: Phase) -> String {
        format!("{txn_id}:{}", phase.as_str())
    }

    fn missing(txn_id: &str, phase: Phase) -> AuditError {
        AuditError::UnknownRecord {
            txn_id: txn_id.to_string(),
            phase,
        }
    }

    /// All recorded callback attempts for an instrument, newest last.
    pub fn callback_attempts(&self, instrument: Instrument) -> Vec<CallbackAttempt> {
        let mut attempts: Vec<CallbackAttempt> = self
            .callbacks
            .iter()
            .filter(|entry| entry.instrument == instrument)
            .map(|entry| entry.clone())
            .collect();
        attempts.sort_by_key(|a| a.received_at);
        attempts
    }

    /// Every row recorded for a transaction phase, oldest first.
    pub fn history(&self, txn_id: &str, phase: Phase) -> Vec<TransactionRecord> {
        self.transactions
            .get(&Self::key(txn_id, phase))
            .map(|rows| rows.value().clone())
            .unwrap_or_default()
    }

    /// Total rows across all transactions, phases, and repeats.
    pub fn transaction_count(&self) -> usize {
        self.transactions.iter().map(|rows| rows.len()).sum()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn insert(&self, record: TransactionRecord) -> Result<(), AuditError> {
        self.transactions
            .entry(Self::key(&record.txn_id, record.phase))
            .or_default()
            .push(record);
        Ok(())
    }

    async fn mark_state(
        &self,
        txn_id: &str,
        phase: Phase,
        state: TxnState,
    ) -> Result<(), AuditError> {
        let mut rows = self
            .transactions
            .get_mut(&Self::key(txn_id, phase))
            .ok_or_else(|| Self::missing(txn_id, phase))?;
        let row = rows
            .last_mut()
            .ok_or_else(|| Self::missing(txn_id, phase))?;
        row.state = state;
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn complete(
        &self,
        txn_id: &str,
        phase: Phase,
        response_json: String,
        state: TxnState,
    ) -> Result<(), AuditError> {
        let mut rows = self
            .transactions
            .get_mut(&Self::key(txn_id, phase))
            .ok_or_else(|| Self::missing(txn_id, phase))?;
        let row = rows
            .last_mut()
            .ok_or_else(|| Self::missing(txn_id, phase))?;
        row.response_json = Some(response_json);
        row.state = state;
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn find(
        &self,
        txn_id: &str,
        phase: Phase,
    ) -> Result<Option<TransactionRecord>, AuditError> {
        Ok(self
            .transactions
            .get(&Self::key(txn_id, phase))
            .and_then(|rows| rows.last().cloned()))
    }

    async fn exists(&self, txn_id: &str) -> Result<bool, AuditError> {
        Ok(Phase::ALL
            .iter()
            .any(|phase| self.transactions.contains_key(&Self::key(txn_id, *phase))))
    }

    async fn record_callback(&self, attempt: CallbackAttempt) -> Result<(), AuditError> {
        self.callbacks.insert(attempt.id.clone(), attempt);
        Ok(())
    }
}
