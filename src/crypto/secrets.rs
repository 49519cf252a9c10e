//! One-time secret generation
//!
//! Secrets are handed to the next custodian (or printed on the consumer
//! certificate) and committed to the ledger as hashes.

use chrono::Utc;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use super::commitment::{commit, Commitment};

/// A freshly generated secret together with its commitment
#[derive(Debug, Clone)]
pub struct SecretPair {
    pub secret: String,
    pub commitment: Commitment,
}

impl SecretPair {
    fn from_secret(secret: String) -> Self {
        let commitment = commit(&secret);
        Self { secret, commitment }
    }
}

/// Generate a 64-character hex secret.
///
/// The label (asset id, name) is mixed in with 32 random bytes and the current
/// time so two secrets for the same asset never collide.
pub fn generate_secret(label: &str) -> SecretPair {
    let mut random = [0u8; 32];
    OsRng.fill_bytes(&mut random);

    let mut hasher = Sha256::new();
    hasher.update(label.as_bytes());
    hasher.update(b"-");
    hasher.update(Utc::now().timestamp_millis().to_be_bytes());
    hasher.update(b"-");
    hasher.update(random);

    SecretPair::from_secret(hex::encode(hasher.finalize()))
}

/// Generate a short, typeable secret like `9F2C-0B7A-44E1-D3C8`
pub fn generate_short_secret(label: &str) -> SecretPair {
    let full = generate_secret(label).secret.to_ascii_uppercase();
    let groups: Vec<&str> = (0..4).map(|i| &full[i * 4..i * 4 + 4]).collect();
    SecretPair::from_secret(groups.join("-"))
}
