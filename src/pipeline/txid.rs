//! Gateway-facing transaction id generation.
//!
//! Ids double as the gateway's idempotency key, so they must be unique per
//! merchant. The pipeline re-checks the audit store and regenerates on
//! collision; the gateway's own duplicate detection backstops the rest.

use rand::Rng;

/// Uppercase alphanumerics minus the lookalikes I/O/0/1. Ids end up read
/// aloud over support calls.
pub const DEFAULT_ALPHABET: &str = "ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub const DEFAULT_LENGTH: usize = 20;

/// Random id generator with a configurable alphabet and length.
#[derive(Debug, Clone)]
pub struct TxnIdGenerator {
    length: usize,
    alphabet: Vec<char>,
}

impl TxnIdGenerator {
    /// Lengths below 8 are clamped up; shorter ids collide too easily to
    /// serve as idempotency keys.
    pub fn new(length: usize, alphabet: &str) -> Self {
        let alphabet: Vec<char> = alphabet.chars().collect();
        assert!(!alphabet.is_empty(), "txn id alphabet must not be empty");
        Self {
            length: length.max(8),
            alphabet,
        }
    }

    /// Draw a fresh id with the given instrument prefix.
    pub fn generate(&self, prefix: &str) -> String {
        let mut rng = rand::thread_rng();
        let mut id = String::with_capacity(prefix.len() + self.length);
        id.push_str(prefix);
        for _ in 0..self.length {
            id.push(self.alphabet[rng.gen_range(0..self.alphabet.len())]);
        }
        id
    }
}

impl Default for TxnIdGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_LENGTH, DEFAULT_ALPHABET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_have_prefix_and_length() {
        let generator = TxnIdGenerator::default();
        let id = generator.generate("DQR");
        assert!(id.starts_with("DQR"));
        assert_eq!(id.len(), 3 + DEFAULT_LENGTH);
    }

    #[test]
    fn generated_ids_stay_inside_the_alphabet() {
        let generator = TxnIdGenerator::new(64, "AB");
        let id = generator.generate("");
        assert!(id.chars().all(|c| c == 'A' || c == 'B'));
    }

    #[test]
    fn consecutive_ids_differ() {
        let generator = TxnIdGenerator::default();
        assert_ne!(generator.generate("PLK"), generator.generate("PLK"));
    }

    #[test]
    fn short_lengths_are_clamped() {
        let generator = TxnIdGenerator::new(2, DEFAULT_ALPHABET);
        assert_eq!(generator.generate("X").len(), 1 + 8);
    }
}
