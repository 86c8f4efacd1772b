use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;

use crate::pipeline::txid;
use crate::transport::TransportConfig;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub server: ServerConfig,
    pub transport: TransportConfig,
    #[serde(default)]
    pub txn_id: TxnIdConfig,
    /// One entry per instrument this deployment offers.
    pub instruments: Vec<InstrumentConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TxnIdConfig {
    pub length: usize,
    pub alphabet: String,
    pub collision_retries: u32,
}

impl Default for TxnIdConfig {
    fn default() -> Self {
        Self {
            length: txid::DEFAULT_LENGTH,
            alphabet: txid::DEFAULT_ALPHABET.to_string(),
            collision_retries: 3,
        }
    }
}

/// Per-instrument gateway credentials and routing. Secrets arrive through
/// config, never through code; `Debug` keeps them out of logs.
#[derive(Serialize, Deserialize, Clone)]
pub struct InstrumentConfig {
    /// Instrument short name: dqr, sqr, edc, paylink, ivr.
    pub kind: String,
    pub secret: String,
    pub key_version: String,
    pub provider_id: String,
    pub callback_url: String,
}

impl fmt::Debug for InstrumentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentConfig")
            .field("kind", &self.kind)
            .field("secret", &"<redacted>")
            .field("key_version", &self.key_version)
            .field("provider_id", &self.provider_id)
            .field("callback_url", &self.callback_url)
            .finish()
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Self {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .unwrap_or_else(|_| panic!("Failed to read config file: {}", config_path));
        serde_yaml::from_str(&content).expect("Failed to parse config yaml")
    }
}
