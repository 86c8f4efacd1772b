//! Keyed-hash request signing for gateway authentication.
//!
//! Every outbound gateway call and every inbound callback carries an
//! `X-VERIFY` header of the form `hex(sha256(message + secret)) + "###" +
//! key_version`. The message is the base64 envelope concatenated with the
//! endpoint path for enveloped calls, the bare path for body-less calls,
//! and the raw base64 body for callbacks. Requester and verifier must agree
//! byte for byte, so both directions live here.

use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;

/// Separator between digest and key version in the header value.
const VERSION_SEPARATOR: &str = "###";

/// Signing material for one instrument.
///
/// The secret is shared with the gateway out of band and MUST never appear
/// in logs. `Debug` redacts it.
#[derive(Clone)]
pub struct SigningContext {
    secret: String,
    key_version: String,
}

impl SigningContext {
    pub fn new(secret: impl Into<String>, key_version: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            key_version: key_version.into(),
        }
    }

    pub fn key_version(&self) -> &str {
        &self.key_version
    }

    /// Compute the `X-VERIFY` value for `message`.
    pub fn sign(&self, message: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(message.as_bytes());
        hasher.update(self.secret.as_bytes());
        let digest = hasher.finalize();

        format!("{}{}{}", hex::encode(digest), VERSION_SEPARATOR, self.key_version)
    }

    /// Verify a candidate `X-VERIFY` value against `message`.
    ///
    /// Fail-closed: malformed, truncated, or mismatched candidates are all
    /// `false`, never an error. The comparison is constant-time; only the
    /// candidate length is observable.
    pub fn verify(&self, message: &str, candidate: &str) -> bool {
        let expected = self.sign(message);
        expected.as_bytes().ct_eq(candidate.as_bytes()).into()
    }
}

impl fmt::Debug for SigningContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningContext")
            .field("secret", &"<redacted>")
            .field("key_version", &self.key_version)
            .finish()
    }
}
