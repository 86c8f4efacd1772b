//! Payment instrument definitions and per-instrument configuration.
//!
//! Five gateway instruments share one transaction pipeline; the only
//! per-instrument facts are the identity below (URL segments, id prefixes)
//! and the signing/routing profile loaded from config.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::config::InstrumentConfig;
use crate::signing::SigningContext;

/// A payment instrument supported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instrument {
    /// Per-transaction QR rendered by the merchant, scanned by the payer
    DynamicQr,
    /// Printed store QR; payer enters the amount
    StaticQr,
    /// Card machine (EDC terminal) at the point of sale
    CardTerminal,
    /// Hosted payment page link sent to the payer
    PayLink,
    /// Automated outbound call collecting approval
    PayByCall,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown payment instrument: {0}")]
pub struct UnknownInstrument(pub String);

impl Instrument {
    pub const ALL: [Instrument; 5] = [
        Instrument::DynamicQr,
        Instrument::StaticQr,
        Instrument::CardTerminal,
        Instrument::PayLink,
        Instrument::PayByCall,
    ];

    /// Short name used in config files and downstream URLs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Instrument::DynamicQr => "dqr",
            Instrument::StaticQr => "sqr",
            Instrument::CardTerminal => "edc",
            Instrument::PayLink => "paylink",
            Instrument::PayByCall => "ivr",
        }
    }

    /// Path segment of this instrument's init endpoint on the gateway.
    pub fn init_segment(&self) -> &'static str {
        match self {
            Instrument::DynamicQr => "qr/dynamic",
            Instrument::StaticQr => "qr/static",
            Instrument::CardTerminal => "edc",
            Instrument::PayLink => "paylink",
            Instrument::PayByCall => "ivr",
        }
    }

    /// Prefix baked into generated transaction ids so the instrument is
    /// readable off the id itself.
    pub fn txn_prefix(&self) -> &'static str {
        match self {
            Instrument::DynamicQr => "DQR",
            Instrument::StaticQr => "SQR",
            Instrument::CardTerminal => "EDC",
            Instrument::PayLink => "PLK",
            Instrument::PayByCall => "IVR",
        }
    }
}

impl FromStr for Instrument {
    type Err = UnknownInstrument;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dqr" => Ok(Instrument::DynamicQr),
            "sqr" => Ok(Instrument::StaticQr),
            "edc" => Ok(Instrument::CardTerminal),
            "paylink" => Ok(Instrument::PayLink),
            "ivr" => Ok(Instrument::PayByCall),
            other => Err(UnknownInstrument(other.to_string())),
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything instrument-specific the pipeline needs for one call.
#[derive(Debug, Clone)]
pub struct InstrumentProfile {
    pub kind: Instrument,
    pub signing: SigningContext,
    /// Merchant identity assigned by the gateway for this instrument.
    pub provider_id: String,
    /// Where the gateway should deliver the asynchronous result.
    pub callback_url: String,
}

/// Immutable lookup of configured instrument profiles, built once at
/// startup and shared read-only.
#[derive(Debug, Default)]
pub struct InstrumentRegistry {
    profiles: HashMap<Instrument, InstrumentProfile>,
}

impl InstrumentRegistry {
    pub fn new(profiles: impl IntoIterator<Item = InstrumentProfile>) -> Self {
        Self {
            profiles: profiles.into_iter().map(|p| (p.kind, p)).collect(),
        }
    }

    /// Build the registry from config entries. Rejects unknown instrument
    /// names so a typo fails startup instead of a live request.
    pub fn from_config(entries: &[InstrumentConfig]) -> Result<Self, UnknownInstrument> {
        let mut profiles = Vec::with_capacity(entries.len());
        for entry in entries {
            let kind = entry.kind.parse::<Instrument>()?;
            profiles.push(InstrumentProfile {
                kind,
                signing: SigningContext::new(&entry.secret, &entry.key_version),
                provider_id: entry.provider_id.clone(),
                callback_url: entry.callback_url.clone(),
            });
        }
        Ok(Self::new(profiles))
    }

    pub fn profile(&self, kind: Instrument) -> Option<&InstrumentProfile> {
        self.profiles.get(&kind)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
