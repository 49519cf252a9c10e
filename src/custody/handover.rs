//! Handover Protocol Engine
//!
//! Hash-lock custody chain: accepting custody opens the current handover
//! commitment with its secret and, in the same transaction, commits a fresh
//! secret for the next hop.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{info, warn};

use super::classification::{classify, Classification, HandoverWarning};
use crate::crypto::{commit, Commitment};
use crate::error::CustodyError;
use crate::ledger::models::*;
use crate::ledger::{queries, Ledger};
use crate::roles;

/// Result of a successful `accept_handover`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoverReceipt {
    pub asset: Asset,
    pub previous_owner: Principal,
    pub event: CustodyEvent,
    pub warning: Option<HandoverWarning>,
}

#[derive(Clone)]
pub struct HandoverEngine {
    ledger: Ledger,
}

impl HandoverEngine {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }

    /// Replace the pending handover commitment. Owner only.
    ///
    /// Any secret issued for the previous commitment stops working. Replaced
    /// commitments are not remembered.
    pub async fn generate_handover(
        &self,
        caller: &Principal,
        id: AssetId,
        next_commitment: Commitment,
    ) -> Result<Asset, CustodyError> {
        let mut tx = self.ledger.begin_write().await?;
        let asset = queries::require_asset(tx.conn(), id).await?;

        if asset.is_claimed() {
            return Err(CustodyError::TerminalAsset(id));
        }
        if asset.current_owner != *caller {
            return Err(CustodyError::NotOwner {
                asset_id: id,
                principal: caller.to_string(),
            });
        }
        reject_reused_commitment(tx.conn(), &asset, &next_commitment).await?;

        let changed = queries::replace_handover_commitment(
            tx.conn(),
            id,
            caller,
            &asset.handover_commitment,
            &next_commitment,
        )
        .await?;
        if changed == 0 {
            return Err(CustodyError::StaleCommitment(id));
        }

        let updated = queries::require_asset(tx.conn(), id).await?;
        tx.commit().await?;

        info!("Owner {} rotated handover commitment of asset {}", caller, id);
        Ok(updated)
    }

    /// Accept custody by revealing the secret behind the current handover
    /// commitment. Any principal holding the secret may accept.
    ///
    /// Failures are reported in order: `NotFound`, `TerminalAsset`, then
    /// `StaleCommitment` or `InvalidSecret`, then invalid input.
    pub async fn accept_handover(
        &self,
        caller: &Principal,
        id: AssetId,
        presented_secret: &str,
        next_commitment: Commitment,
        location: &str,
    ) -> Result<HandoverReceipt, CustodyError> {
        let mut tx = self.ledger.begin_write().await?;
        let asset = queries::require_asset(tx.conn(), id).await?;

        if asset.is_claimed() {
            return Err(CustodyError::TerminalAsset(id));
        }

        if !asset.handover_commitment.is_opened_by(presented_secret) {
            let presented = commit(presented_secret);
            if queries::was_consumed(tx.conn(), id, &presented).await? {
                warn!("{} replayed a consumed handover secret on asset {}", caller, id);
                return Err(CustodyError::StaleCommitment(id));
            }
            warn!("{} presented an invalid handover secret on asset {}", caller, id);
            return Err(CustodyError::InvalidSecret(id));
        }

        // input checks come after the asset and secret checks
        let location = require_non_empty("location", location)?;
        reject_reused_commitment(tx.conn(), &asset, &next_commitment).await?;

        let caller_roles = roles::roles_of_in(tx.conn(), caller).await?;
        let classification = classify(&caller_roles, asset.state);
        let resulting_state = classification.state();

        let changed = queries::swap_custody(
            tx.conn(),
            id,
            &asset.handover_commitment,
            &next_commitment,
            caller,
            resulting_state,
        )
        .await?;
        if changed == 0 {
            return Err(CustodyError::StaleCommitment(id));
        }

        let event = CustodyEvent {
            actor: caller.clone(),
            resulting_state,
            timestamp: Utc::now(),
            location,
            consumed_commitment: Some(asset.handover_commitment.clone()),
        };
        queries::append_custody_event(tx.conn(), id, &event).await?;

        let updated = queries::require_asset(tx.conn(), id).await?;
        tx.commit().await?;

        let warning = match classification {
            Classification::Classified { .. } => None,
            Classification::RoleMismatch { retained } => {
                warn!(
                    "{} accepted asset {} without a carrier or outlet role; state stays {}",
                    caller, id, retained
                );
                Some(HandoverWarning::RoleMismatch {
                    retained_state: retained,
                })
            }
        };

        info!(
            "Custody of asset {} moved {} -> {} ({})",
            id, asset.current_owner, caller, resulting_state
        );

        Ok(HandoverReceipt {
            asset: updated,
            previous_owner: asset.current_owner,
            event,
            warning,
        })
    }
}

/// A next-hop commitment must be fresh: not the live one, not the consumer
/// commitment, and not one any earlier handover already opened.
async fn reject_reused_commitment(
    conn: &mut SqliteConnection,
    asset: &Asset,
    next: &Commitment,
) -> Result<(), CustodyError> {
    if *next == asset.handover_commitment
        || *next == asset.consumer_commitment
        || queries::was_consumed(conn, asset.id, next).await?
    {
        return Err(CustodyError::InvalidInput(format!(
            "Next handover commitment for asset {} has already been used",
            asset.id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::{Role, RoleRegistry};

    struct Fixture {
        ledger: Ledger,
        engine: HandoverEngine,
        creator: Principal,
        carrier: Principal,
        outlet: Principal,
    }

    fn principal(s: &str) -> Principal {
        Principal::new(s).unwrap()
    }

    async fn fixture() -> Fixture {
        let ledger = Ledger::new_in_memory().await.unwrap();
        let roles = RoleRegistry::new(ledger.clone());
        let admin = principal("0xadmin");
        let creator = principal("0xfactory");
        let carrier = principal("0xcarrier");
        let outlet = principal("0xshop");
        roles.bootstrap_admin(&admin).await.unwrap();
        roles.grant_role(&admin, Role::Creator, &creator).await.unwrap();
        roles.grant_role(&admin, Role::Carrier, &carrier).await.unwrap();
        roles.grant_role(&admin, Role::Outlet, &outlet).await.unwrap();

        ledger
            .create_asset(&creator, "Watch-1", commit("S0"), commit("H1"), "Factory")
            .await
            .unwrap();

        Fixture {
            engine: HandoverEngine::new(ledger.clone()),
            ledger,
            creator,
            carrier,
            outlet,
        }
    }

    #[tokio::test]
    async fn test_accept_moves_custody() {
        let f = fixture().await;

        let receipt = f
            .engine
            .accept_handover(&f.carrier, 1, "H1", commit("H2"), "Warehouse-X")
            .await
            .unwrap();

        assert_eq!(receipt.previous_owner, f.creator);
        assert_eq!(receipt.asset.current_owner, f.carrier);
        assert_eq!(receipt.asset.state, AssetState::InTransit);
        assert_eq!(receipt.asset.handover_commitment, commit("H2"));
        assert_eq!(receipt.event.consumed_commitment, Some(commit("H1")));
        assert!(receipt.warning.is_none());

        let history = f.ledger.get_history(1).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].actor, f.carrier);
        assert_eq!(history[1].location, "Warehouse-X");
    }

    #[tokio::test]
    async fn test_invalid_secret_changes_nothing() {
        let f = fixture().await;
        let before = f.ledger.get_asset(1).await.unwrap();

        let result = f
            .engine
            .accept_handover(&f.carrier, 1, "wrong", commit("H2"), "Dock")
            .await;
        assert!(matches!(result, Err(CustodyError::InvalidSecret(1))));

        let after = f.ledger.get_asset(1).await.unwrap();
        assert_eq!(after.current_owner, before.current_owner);
        assert_eq!(after.state, before.state);
        assert_eq!(after.handover_commitment, before.handover_commitment);
        assert_eq!(f.ledger.get_history(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_replayed_secret_is_stale() {
        let f = fixture().await;
        f.engine
            .accept_handover(&f.carrier, 1, "H1", commit("H2"), "Warehouse-X")
            .await
            .unwrap();

        let replay = f
            .engine
            .accept_handover(&f.outlet, 1, "H1", commit("H3"), "Mall")
            .await;
        assert!(matches!(replay, Err(CustodyError::StaleCommitment(1))));
        assert_eq!(f.ledger.get_asset(1).await.unwrap().current_owner, f.carrier);
    }

    #[tokio::test]
    async fn test_racing_accepts_first_writer_wins() {
        let f = fixture().await;

        let a = f.engine.clone();
        let b = f.engine.clone();
        let (carrier, outlet) = (f.carrier.clone(), f.outlet.clone());
        let first = tokio::spawn(async move {
            a.accept_handover(&carrier, 1, "H1", commit("H2-a"), "Dock A").await
        });
        let second = tokio::spawn(async move {
            b.accept_handover(&outlet, 1, "H1", commit("H2-b"), "Dock B").await
        });

        let results = [first.await.unwrap(), second.await.unwrap()];
        let wins = results.iter().filter(|r| r.is_ok()).count();
        let stale = results
            .iter()
            .filter(|r| matches!(r, Err(CustodyError::StaleCommitment(1))))
            .count();
        assert_eq!(wins, 1);
        assert_eq!(stale, 1);
        assert_eq!(f.ledger.get_history(1).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_role_mismatch_keeps_state_and_warns() {
        let f = fixture().await;
        f.engine
            .accept_handover(&f.carrier, 1, "H1", commit("H2"), "Warehouse-X")
            .await
            .unwrap();

        let walk_in = principal("0xwalkin");
        let receipt = f
            .engine
            .accept_handover(&walk_in, 1, "H2", commit("H3"), "Street")
            .await
            .unwrap();

        assert_eq!(receipt.asset.current_owner, walk_in);
        assert_eq!(receipt.asset.state, AssetState::InTransit);
        assert_eq!(
            receipt.warning,
            Some(HandoverWarning::RoleMismatch {
                retained_state: AssetState::InTransit
            })
        );
    }

    #[tokio::test]
    async fn test_generate_handover_rotates_without_history() {
        let f = fixture().await;

        let asset = f
            .engine
            .generate_handover(&f.creator, 1, commit("H1b"))
            .await
            .unwrap();
        assert_eq!(asset.handover_commitment, commit("H1b"));
        assert_eq!(asset.current_owner, f.creator);
        assert_eq!(f.ledger.get_history(1).await.unwrap().len(), 1);

        // the abandoned secret is plainly invalid, not stale
        let old = f
            .engine
            .accept_handover(&f.carrier, 1, "H1", commit("H2"), "Dock")
            .await;
        assert!(matches!(old, Err(CustodyError::InvalidSecret(1))));

        f.engine
            .accept_handover(&f.carrier, 1, "H1b", commit("H2"), "Dock")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_generate_handover_owner_only() {
        let f = fixture().await;
        let result = f
            .engine
            .generate_handover(&f.carrier, 1, commit("H9"))
            .await;
        assert!(matches!(result, Err(CustodyError::NotOwner { asset_id: 1, .. })));

        let missing = f.engine.generate_handover(&f.creator, 99, commit("H9")).await;
        assert!(matches!(missing, Err(CustodyError::NotFound(99))));
    }

    #[tokio::test]
    async fn test_next_commitment_must_be_fresh() {
        let f = fixture().await;

        let same = f
            .engine
            .accept_handover(&f.carrier, 1, "H1", commit("H1"), "Dock")
            .await;
        assert!(matches!(same, Err(CustodyError::InvalidInput(_))));

        let consumer = f
            .engine
            .accept_handover(&f.carrier, 1, "H1", commit("S0"), "Dock")
            .await;
        assert!(matches!(consumer, Err(CustodyError::InvalidInput(_))));
        assert_eq!(f.ledger.get_history(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_accept_unknown_asset() {
        let f = fixture().await;
        let result = f
            .engine
            .accept_handover(&f.carrier, 7, "H1", commit("H2"), "Dock")
            .await;
        assert!(matches!(result, Err(CustodyError::NotFound(7))));
    }

    async fn claim(f: &Fixture) {
        crate::custody::ClaimModule::new(f.ledger.clone())
            .claim_ownership(&principal("0xalice"), 1, "S0", "Alice", "City-Y")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_asset_errors_precede_input_errors() {
        let f = fixture().await;

        let missing = f
            .engine
            .accept_handover(&f.carrier, 42, "H1", commit("H2"), "")
            .await;
        assert!(matches!(missing, Err(CustodyError::NotFound(42))));

        let wrong = f
            .engine
            .accept_handover(&f.carrier, 1, "wrong", commit("H2"), "")
            .await;
        assert!(matches!(wrong, Err(CustodyError::InvalidSecret(1))));

        let blank = f
            .engine
            .accept_handover(&f.carrier, 1, "H1", commit("H2"), "  ")
            .await;
        assert!(matches!(blank, Err(CustodyError::InvalidInput(_))));

        claim(&f).await;
        let terminal = f
            .engine
            .accept_handover(&f.carrier, 1, "H1", commit("H2"), "")
            .await;
        assert!(matches!(terminal, Err(CustodyError::TerminalAsset(1))));
    }

    #[tokio::test]
    async fn test_generate_handover_refused_after_claim() {
        let f = fixture().await;
        claim(&f).await;

        let result = f
            .engine
            .generate_handover(&f.creator, 1, commit("H1b"))
            .await;
        assert!(matches!(result, Err(CustodyError::TerminalAsset(1))));
        assert_eq!(f.ledger.get_asset(1).await.unwrap().handover_commitment, commit("H1"));
    }
}
