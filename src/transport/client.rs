//! Pooled HTTP transport for the gateway.
//!
//! One `GatewayTransport` is built at startup and injected into every
//! consumer; nothing constructs clients lazily at request time. The
//! `Dispatcher` seam carries exactly one attempt so the retry loop above it
//! can be exercised without a network.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::TransportError;
use super::retry::RetryPolicy;

/// Transport configuration (`transport` block of the config file).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Gateway origin, e.g. `https://api-sandbox.payaxis.example`
    pub base_url: String,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    /// Overall per-attempt deadline, covering send and receive.
    pub request_timeout_secs: u64,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    pub pool_max_idle: usize,
    pub pool_idle_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api-sandbox.payaxis.example".to_string(),
            connect_timeout_secs: 30,
            read_timeout_secs: 30,
            request_timeout_secs: 30,
            max_attempts: 3,
            backoff_base_ms: 1_000,
            backoff_cap_ms: 30_000,
            pool_max_idle: 16,
            pool_idle_timeout_secs: 90,
        }
    }
}

/// HTTP verb for an outbound gateway call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallMethod {
    Get,
    Post,
}

/// One fully prepared gateway call. Built per operation, cheap to retry.
#[derive(Debug, Clone)]
pub struct OutboundCall {
    pub method: CallMethod,
    /// Path relative to the gateway origin, e.g. `/v3/qr/dynamic/init`.
    pub path: String,
    pub headers: Vec<(&'static str, String)>,
    /// Pre-serialized body (already enveloped), absent for GET and
    /// body-less POST calls.
    pub body: Option<String>,
}

/// Raw outcome of one dispatched attempt.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One attempt on the wire. No retry at this layer.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, call: &OutboundCall) -> Result<HttpReply, TransportError>;
}

/// reqwest-backed dispatcher. The connection pool lives inside `Client`
/// and is shared by clone.
pub struct HttpDispatcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDispatcher {
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .pool_max_idle_per_host(config.pool_max_idle)
            .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
            .user_agent(concat!("paybridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Dispatcher for HttpDispatcher {
    async fn dispatch(&self, call: &OutboundCall) -> Result<HttpReply, TransportError> {
        let url = format!("{}{}", self.base_url, call.path);
        let mut request = match call.method {
            CallMethod::Get => self.client.get(&url),
            CallMethod::Post => self.client.post(&url),
        };
        for (name, value) in &call.headers {
            request = request.header(*name, value);
        }
        if let Some(body) = &call.body {
            request = request.body(body.clone());
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpReply { status, body })
    }
}

/// Shared gateway transport: dispatcher plus retry policy.
pub struct GatewayTransport {
    dispatcher: Arc<dyn Dispatcher>,
    policy: RetryPolicy,
}

impl GatewayTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let policy = RetryPolicy::new(
            config.max_attempts,
            Duration::from_millis(config.backoff_base_ms),
            Duration::from_millis(config.backoff_cap_ms),
        );
        Ok(Self::with_dispatcher(
            Arc::new(HttpDispatcher::new(config)?),
            policy,
        ))
    }

    pub fn with_dispatcher(dispatcher: Arc<dyn Dispatcher>, policy: RetryPolicy) -> Self {
        Self { dispatcher, policy }
    }

    /// Execute a call with retry.
    ///
    /// 2xx replies return their body. Transient faults (connectivity, 5xx)
    /// are retried per policy with exponential backoff; 4xx surfaces
    /// immediately so a rejected financial call is never replayed.
    pub async fn execute(&self, call: &OutboundCall) -> Result<HttpReply, TransportError> {
        let mut attempt = 1u32;
        loop {
            debug!(path = %call.path, attempt, "Dispatching gateway call");
            let err = match self.dispatcher.dispatch(call).await {
                Ok(reply) if reply.is_success() => return Ok(reply),
                Ok(reply) => TransportError::Status {
                    status: reply.status,
                    body: reply.body,
                },
                Err(e) => e,
            };

            if !err.is_retryable() {
                return Err(err);
            }

            match self.policy.delay_after(attempt) {
                Some(delay) => {
                    warn!(
                        path = %call.path,
                        attempt,
                        max_attempts = self.policy.max_attempts(),
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient gateway failure, will retry"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => {
                    return Err(TransportError::Exhausted {
                        attempts: attempt,
                        source: Box::new(err),
                    });
                }
            }
        }
    }
}
