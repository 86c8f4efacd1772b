//! paybridge - Merchant-side bridge for the PayAxis mobile-payment gateway.
//!
//! Signed envelopes out, verified callbacks in, one pipeline for every
//! payment instrument.
//!
//! # Modules
//!
//! - [`instrument`] - The five payment instruments and their profiles
//! - [`money`] - Major/minor unit conversion at the wire boundary
//! - [`signing`] - Keyed-hash `X-VERIFY` signing and verification
//! - [`envelope`] - Canonical JSON / base64 envelope codec
//! - [`transport`] - Pooled HTTP client with retry and backoff
//! - [`pipeline`] - The shared transaction pipeline (init/cancel/refund/status)
//! - [`callback`] - Inbound callback verification
//! - [`audit`] - Request/response/callback audit trail
//! - [`server`] - Downstream HTTP API for merchant backends
//! - [`config`] - YAML configuration
//! - [`logging`] - Tracing setup

pub mod audit;
pub mod callback;
pub mod config;
pub mod envelope;
pub mod instrument;
pub mod logging;
pub mod money;
pub mod pipeline;
pub mod server;
pub mod signing;
pub mod transport;

// Convenient re-exports at crate root
pub use audit::{AuditStore, MemoryAuditStore};
pub use callback::{CallbackNotice, CallbackVerifier};
pub use config::AppConfig;
pub use instrument::{Instrument, InstrumentProfile, InstrumentRegistry};
pub use pipeline::{PipelineError, TransactionPipeline, TxnIdGenerator, TxnState};
pub use signing::SigningContext;
pub use transport::{GatewayTransport, TransportConfig};
