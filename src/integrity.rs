//! Integrity Checker (N-1 check)
//!
//! Read-only validation that the latest custody event's actor is the asset's
//! current owner. Clients run it before trusting a displayed custody chain
//! and before attempting a handover; it catches desync introduced by caches
//! or mirrors sitting between the ledger and the reader.

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::CustodyError;
use crate::ledger::models::{Asset, AssetId, CustodyEvent, Principal};
use crate::ledger::Ledger;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub asset_id: AssetId,
    pub history_len: usize,
    pub current_owner: Principal,
}

pub struct IntegrityChecker;

impl IntegrityChecker {
    /// Check an asset record against a custody history, from whatever source
    /// they were read
    pub fn check(asset: &Asset, history: &[CustodyEvent]) -> Result<IntegrityReport, CustodyError> {
        let (first, last) = match (history.first(), history.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                error!("Asset {} has an empty custody history", asset.id);
                return Err(CustodyError::integrity(asset.id, "custody history is empty"));
            }
        };

        if first.actor != asset.creator {
            error!(
                "Asset {} history starts with {} but creator is {}",
                asset.id, first.actor, asset.creator
            );
            return Err(CustodyError::integrity(
                asset.id,
                format!("first custodian {} is not creator {}", first.actor, asset.creator),
            ));
        }

        if last.actor != asset.current_owner {
            error!(
                "Asset {} last custodian {} differs from current owner {}",
                asset.id, last.actor, asset.current_owner
            );
            return Err(CustodyError::integrity(
                asset.id,
                format!(
                    "last custodian {} is not current owner {}",
                    last.actor, asset.current_owner
                ),
            ));
        }

        debug!("Asset {} passed integrity check ({} events)", asset.id, history.len());
        Ok(IntegrityReport {
            asset_id: asset.id,
            history_len: history.len(),
            current_owner: asset.current_owner.clone(),
        })
    }

    /// Check the authoritative ledger copy of an asset
    pub async fn verify_asset(ledger: &Ledger, id: AssetId) -> Result<IntegrityReport, CustodyError> {
        let (asset, history) = ledger.get_asset_with_history(id).await?;
        Self::check(&asset, &history)
    }

    /// Check a mirrored snapshot, then compare it with the ledger. A snapshot
    /// that is internally consistent but behind the ledger is still refused.
    pub async fn verify_mirror(
        ledger: &Ledger,
        mirrored: &Asset,
        mirrored_history: &[CustodyEvent],
    ) -> Result<IntegrityReport, CustodyError> {
        let report = Self::check(mirrored, mirrored_history)?;
        let (asset, history) = ledger.get_asset_with_history(mirrored.id).await?;

        if history.len() != mirrored_history.len() || asset.current_owner != mirrored.current_owner {
            error!(
                "Mirror of asset {} is stale: {} events owned by {}, ledger has {} owned by {}",
                mirrored.id,
                mirrored_history.len(),
                mirrored.current_owner,
                history.len(),
                asset.current_owner
            );
            return Err(CustodyError::integrity(
                mirrored.id,
                format!(
                    "mirror shows {} events, ledger has {}",
                    mirrored_history.len(),
                    history.len()
                ),
            ));
        }
        Ok(report)
    }

    /// Gate for clients about to submit `accept_handover`: refuses when the
    /// displayed record is inconsistent or no longer transferable
    pub fn guard_handover(
        asset: &Asset,
        history: &[CustodyEvent],
    ) -> Result<IntegrityReport, CustodyError> {
        let report = Self::check(asset, history)?;
        if asset.is_claimed() {
            return Err(CustodyError::TerminalAsset(asset.id));
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::commit;
    use crate::ledger::models::{AssetState, Claim};
    use chrono::Utc;

    fn principal(s: &str) -> Principal {
        Principal::new(s).unwrap()
    }

    fn event(actor: &str) -> CustodyEvent {
        CustodyEvent {
            actor: principal(actor),
            resulting_state: AssetState::InTransit,
            timestamp: Utc::now(),
            location: "somewhere".to_string(),
            consumed_commitment: None,
        }
    }

    fn asset(owner: &str) -> Asset {
        Asset {
            id: 1,
            name: "Watch-1".to_string(),
            creator: principal("0xfactory"),
            current_owner: principal(owner),
            state: AssetState::InTransit,
            consumer_commitment: commit("S0"),
            handover_commitment: commit("H2"),
            claim: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_consistent_history_passes() {
        let report = IntegrityChecker::check(
            &asset("0xcarrier"),
            &[event("0xfactory"), event("0xcarrier")],
        )
        .unwrap();
        assert_eq!(report.history_len, 2);
        assert_eq!(report.current_owner, principal("0xcarrier"));
    }

    #[test]
    fn test_corrupted_mirror_detected() {
        let result = IntegrityChecker::check(
            &asset("0xcarrier"),
            &[event("0xfactory"), event("0xforger")],
        );
        assert!(matches!(result, Err(CustodyError::IntegrityMismatch { asset_id: 1, .. })));
    }

    #[test]
    fn test_wrong_genesis_detected() {
        let result = IntegrityChecker::check(&asset("0xcarrier"), &[event("0xcarrier")]);
        assert!(matches!(result, Err(CustodyError::IntegrityMismatch { .. })));
    }

    #[test]
    fn test_empty_history_detected() {
        let result = IntegrityChecker::check(&asset("0xfactory"), &[]);
        assert!(matches!(result, Err(CustodyError::IntegrityMismatch { .. })));
    }

    #[test]
    fn test_guard_refuses_claimed_asset() {
        let mut claimed = asset("0xfactory");
        claimed.claim = Some(Claim {
            customer_name: "Alice".to_string(),
            claimed_by: principal("0xalice"),
            location: "City-Y".to_string(),
            timestamp: Utc::now(),
            is_claimed: true,
        });
        let result = IntegrityChecker::guard_handover(&claimed, &[event("0xfactory")]);
        assert!(matches!(result, Err(CustodyError::TerminalAsset(1))));
    }

    #[tokio::test]
    async fn test_stale_mirror_detected() {
        use crate::custody::HandoverEngine;
        use crate::roles::{Role, RoleRegistry};

        let ledger = Ledger::new_in_memory().await.unwrap();
        let roles = RoleRegistry::new(ledger.clone());
        let admin = principal("0xadmin");
        roles.bootstrap_admin(&admin).await.unwrap();
        roles.grant_role(&admin, Role::Creator, &principal("0xfactory")).await.unwrap();
        ledger
            .create_asset(&principal("0xfactory"), "Watch-1", commit("S0"), commit("H1"), "Factory")
            .await
            .unwrap();

        let (snapshot, snapshot_history) = ledger.get_asset_with_history(1).await.unwrap();
        assert!(IntegrityChecker::verify_mirror(&ledger, &snapshot, &snapshot_history)
            .await
            .is_ok());

        HandoverEngine::new(ledger.clone())
            .accept_handover(&principal("0xcarrier"), 1, "H1", commit("H2"), "Dock")
            .await
            .unwrap();

        let result = IntegrityChecker::verify_mirror(&ledger, &snapshot, &snapshot_history).await;
        assert!(matches!(result, Err(CustodyError::IntegrityMismatch { asset_id: 1, .. })));
    }
}
