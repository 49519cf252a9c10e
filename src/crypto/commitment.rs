//! Hash-lock commitments
//!
//! A commitment is the one-way hash of a secret. The ledger only ever stores
//! commitments; the secret itself travels out of band and is revealed once,
//! when custody is accepted or ownership is claimed.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;

use crate::error::CustodyError;

const PREFIX: &str = "sha256:";

/// One-way hash of a secret, formatted as `sha256:<64 hex chars>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Commitment(String);

impl Commitment {
    /// Commit to a secret
    pub fn from_secret(secret: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        Self(format!("{}{}", PREFIX, hex::encode(hasher.finalize())))
    }

    /// Parse a commitment received from a caller or read back from storage
    pub fn parse(value: &str) -> Result<Self, CustodyError> {
        let value = value.trim();
        let digest = value.strip_prefix(PREFIX).ok_or_else(|| {
            CustodyError::InvalidInput(format!("Commitment must start with {}: {}", PREFIX, value))
        })?;

        if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CustodyError::InvalidInput(format!(
                "Commitment digest must be 64 hex characters: {}",
                value
            )));
        }

        Ok(Self(format!("{}{}", PREFIX, digest.to_ascii_lowercase())))
    }

    /// Check whether `secret` opens this commitment. Compares in constant
    /// time.
    pub fn is_opened_by(&self, secret: &str) -> bool {
        let presented = Self::from_secret(secret);
        self.0.as_bytes().ct_eq(presented.0.as_bytes()).into()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Commit to a secret
pub fn commit(secret: &str) -> Commitment {
    Commitment::from_secret(secret)
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Commitment {
    type Error = CustodyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Commitment> for String {
    fn from(value: Commitment) -> Self {
        value.0
    }
}
