//! Shared server state.

use std::sync::Arc;

use crate::callback::CallbackVerifier;
use crate::instrument::InstrumentRegistry;
use crate::pipeline::TransactionPipeline;

/// Application state shared by all handlers.
pub struct AppState {
    pub pipeline: Arc<TransactionPipeline>,
    pub callbacks: Arc<CallbackVerifier>,
    pub registry: Arc<InstrumentRegistry>,
}
