//! Handover mirror
//!
//! Convenience cache of the most recently generated, not yet consumed,
//! handover secret per asset, so an owner can re-display a pending QR code.
//! It is never authoritative: the ledger's handover commitment decides, and
//! any entry that no longer matches it is discarded.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::crypto::{commit, Commitment};
use crate::ledger::models::{Asset, AssetId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingHandover {
    pub secret: String,
    pub commitment: Commitment,
    pub generated_at: DateTime<Utc>,
}

#[derive(Clone, Default)]
pub struct HandoverMirror {
    entries: Arc<RwLock<HashMap<AssetId, PendingHandover>>>,
}

impl HandoverMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn remember(&self, asset_id: AssetId, secret: &str) -> PendingHandover {
        let pending = PendingHandover {
            secret: secret.to_string(),
            commitment: commit(secret),
            generated_at: Utc::now(),
        };
        self.entries.write().await.insert(asset_id, pending.clone());
        pending
    }

    /// Pending secret, only if it still opens the ledger's live commitment
    pub async fn pending_for(&self, asset: &Asset) -> Option<PendingHandover> {
        if !self.reconcile(asset).await {
            return None;
        }
        self.entries.read().await.get(&asset.id).cloned()
    }

    /// Drop the cached entry when it no longer matches the ledger. Returns
    /// whether a matching entry remains.
    pub async fn reconcile(&self, asset: &Asset) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get(&asset.id) {
            Some(pending) if pending.commitment == asset.handover_commitment && !asset.is_claimed() => {
                true
            }
            Some(_) => {
                debug!("Discarding stale mirrored handover for asset {}", asset.id);
                entries.remove(&asset.id);
                false
            }
            None => false,
        }
    }

    pub async fn forget(&self, asset_id: AssetId) {
        self.entries.write().await.remove(&asset_id);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::models::{AssetState, Principal};

    fn asset_with(handover: &str) -> Asset {
        let owner = Principal::new("0xfactory").unwrap();
        Asset {
            id: 1,
            name: "Watch-1".to_string(),
            creator: owner.clone(),
            current_owner: owner,
            state: AssetState::Created,
            consumer_commitment: commit("S0"),
            handover_commitment: commit(handover),
            claim: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_pending_matches_ledger() {
        tokio_test::block_on(async {
            let mirror = HandoverMirror::new();
            mirror.remember(1, "H1").await;

            let pending = mirror.pending_for(&asset_with("H1")).await.unwrap();
            assert_eq!(pending.secret, "H1");
            assert_eq!(mirror.len().await, 1);
        });
    }

    #[test]
    fn test_stale_entry_discarded() {
        tokio_test::block_on(async {
            let mirror = HandoverMirror::new();
            mirror.remember(1, "H1").await;

            // ledger moved on to a commitment the mirror never saw
            assert!(mirror.pending_for(&asset_with("H2")).await.is_none());
            assert_eq!(mirror.len().await, 0);
        });
    }

    #[test]
    fn test_forget() {
        tokio_test::block_on(async {
            let mirror = HandoverMirror::new();
            mirror.remember(1, "H1").await;
            mirror.forget(1).await;
            assert!(!mirror.reconcile(&asset_with("H1")).await);
        });
    }
}
