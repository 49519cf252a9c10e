//! Journal Entry
//!
//! One committed ledger mutation, linked to its predecessor by hash.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ledger::models::AssetId;

pub const ZERO_HASH: &str =
    "sha256:0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub sequence: u64,
    pub operation: String,
    pub asset_id: Option<AssetId>,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
    pub payload_hash: String,
    pub previous_hash: String,
    pub this_hash: String,
}

impl JournalEntry {
    pub fn new(
        sequence: u64,
        operation: &str,
        asset_id: Option<AssetId>,
        actor: &str,
        payload: &[u8],
        previous_hash: String,
    ) -> Self {
        let mut entry = Self {
            sequence,
            operation: operation.to_string(),
            asset_id,
            actor: actor.to_string(),
            timestamp: Utc::now(),
            payload_hash: hash_bytes(payload),
            previous_hash,
            this_hash: String::new(),
        };
        entry.this_hash = entry.calculate_hash();
        entry
    }

    pub fn canonical_string(&self) -> String {
        format!(
            "sequence:{}|operation:{}|asset_id:{}|actor:{}|timestamp:{}|payload_hash:{}|previous_hash:{}",
            self.sequence,
            self.operation,
            self.asset_id.map(|id| id.to_string()).unwrap_or_default(),
            self.actor,
            self.timestamp.to_rfc3339(),
            self.payload_hash,
            self.previous_hash,
        )
    }

    pub fn calculate_hash(&self) -> String {
        hash_bytes(self.canonical_string().as_bytes())
    }

    pub fn verify_hash(&self) -> bool {
        self.this_hash == self.calculate_hash()
    }

    pub fn summary(&self) -> String {
        match self.asset_id {
            Some(id) => format!("#{} {} on asset {} by {}", self.sequence, self.operation, id, self.actor),
            None => format!("#{} {} by {}", self.sequence, self.operation, self.actor),
        }
    }
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

pub fn create_genesis_entry() -> JournalEntry {
    JournalEntry::new(0, "genesis", None, "ledger", b"", ZERO_HASH.to_string())
}
