//! Resilient HTTP transport for gateway calls.
//!
//! Split in three: `client` owns the pooled dispatcher and the retry loop,
//! `retry` owns the backoff schedule, `error` owns fault classification.

pub mod client;
pub mod error;
pub mod retry;

pub use client::{
    CallMethod, Dispatcher, GatewayTransport, HttpDispatcher, HttpReply, OutboundCall,
    TransportConfig,
};
pub use error::TransportError;
pub use retry::RetryPolicy;
