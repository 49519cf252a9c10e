//! Consumer Claim Module
//!
//! Terminal step of the lifecycle. The consumer proves possession of the
//! secret behind the consumer commitment, which is fixed at creation and
//! never rotated.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::CustodyError;
use crate::ledger::models::*;
use crate::ledger::{queries, Ledger};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClaimOutcome {
    FirstClaim { claim: Claim },
    /// Correct secret, but the asset was claimed before. Nothing changed.
    AlreadyClaimed { claim: Claim },
}

impl ClaimOutcome {
    pub fn claim(&self) -> &Claim {
        match self {
            ClaimOutcome::FirstClaim { claim } | ClaimOutcome::AlreadyClaimed { claim } => claim,
        }
    }

    pub fn is_first(&self) -> bool {
        matches!(self, ClaimOutcome::FirstClaim { .. })
    }
}

#[derive(Clone)]
pub struct ClaimModule {
    ledger: Ledger,
}

impl ClaimModule {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }

    /// Claim with the consumer secret. Fails with `NotFound`, then
    /// `InvalidSecret`; a correct secret on a claimed asset reports the
    /// existing claim.
    pub async fn claim_ownership(
        &self,
        caller: &Principal,
        id: AssetId,
        presented_secret: &str,
        customer_name: &str,
        location: &str,
    ) -> Result<ClaimOutcome, CustodyError> {
        let mut tx = self.ledger.begin_write().await?;
        let asset = queries::require_asset(tx.conn(), id).await?;

        if !asset.consumer_commitment.is_opened_by(presented_secret) {
            warn!("{} presented an invalid consumer secret on asset {}", caller, id);
            return Err(CustodyError::InvalidSecret(id));
        }

        if let Some(existing) = asset.claim.filter(|c| c.is_claimed) {
            info!("Asset {} re-verified by {}; already claimed", id, caller);
            return Ok(ClaimOutcome::AlreadyClaimed { claim: existing });
        }

        let customer_name = require_non_empty("customer name", customer_name)?;
        let claim = Claim {
            customer_name,
            claimed_by: caller.clone(),
            location: location.trim().to_string(),
            timestamp: Utc::now(),
            is_claimed: true,
        };

        if queries::write_claim(tx.conn(), id, &claim).await? == 0 {
            // lost to a claim committed through another connection
            let current = queries::require_asset(tx.conn(), id).await?;
            if let Some(existing) = current.claim {
                return Ok(ClaimOutcome::AlreadyClaimed { claim: existing });
            }
            return Err(CustodyError::StaleCommitment(id));
        }
        tx.commit().await?;

        info!("Asset {} claimed by {} ({})", id, claim.customer_name, caller);
        Ok(ClaimOutcome::FirstClaim { claim })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::commit;
    use crate::roles::{Role, RoleRegistry};

    async fn claimable() -> (Ledger, ClaimModule) {
        let ledger = Ledger::new_in_memory().await.unwrap();
        let roles = RoleRegistry::new(ledger.clone());
        let admin = Principal::new("0xadmin").unwrap();
        let creator = Principal::new("0xfactory").unwrap();
        roles.bootstrap_admin(&admin).await.unwrap();
        roles.grant_role(&admin, Role::Creator, &creator).await.unwrap();
        ledger
            .create_asset(&creator, "Watch-1", commit("S0"), commit("H1"), "Factory")
            .await
            .unwrap();
        (ledger.clone(), ClaimModule::new(ledger))
    }

    #[tokio::test]
    async fn test_claim_is_idempotent() {
        let (ledger, claims) = claimable().await;
        let consumer = Principal::new("0xalice").unwrap();

        let first = claims
            .claim_ownership(&consumer, 1, "S0", "Alice", "City-Y")
            .await
            .unwrap();
        assert!(first.is_first());
        assert_eq!(ledger.get_asset(1).await.unwrap().state, AssetState::Claimed);

        let other = Principal::new("0xmallory").unwrap();
        let second = claims
            .claim_ownership(&other, 1, "S0", "Mallory", "Elsewhere")
            .await
            .unwrap();
        assert!(!second.is_first());
        assert_eq!(second.claim(), first.claim());

        let stored = ledger.get_asset(1).await.unwrap().claim.unwrap();
        assert_eq!(stored.customer_name, "Alice");
        assert_eq!(stored.claimed_by, consumer);
        assert_eq!(stored.timestamp, first.claim().timestamp);
    }

    #[tokio::test]
    async fn test_wrong_secret_does_not_claim() {
        let (ledger, claims) = claimable().await;
        let consumer = Principal::new("0xalice").unwrap();

        let result = claims
            .claim_ownership(&consumer, 1, "H1", "Alice", "City-Y")
            .await;
        assert!(matches!(result, Err(CustodyError::InvalidSecret(1))));

        let asset = ledger.get_asset(1).await.unwrap();
        assert!(asset.claim.is_none());
        assert_eq!(asset.state, AssetState::Created);
    }

    #[tokio::test]
    async fn test_claim_owner_unchanged() {
        let (ledger, claims) = claimable().await;
        let consumer = Principal::new("0xalice").unwrap();
        claims
            .claim_ownership(&consumer, 1, "S0", "Alice", "City-Y")
            .await
            .unwrap();

        let asset = ledger.get_asset(1).await.unwrap();
        let history = ledger.get_history(1).await.unwrap();
        assert_eq!(asset.current_owner, history.last().unwrap().actor);
    }

    #[tokio::test]
    async fn test_claim_unknown_asset() {
        let (_, claims) = claimable().await;
        let consumer = Principal::new("0xalice").unwrap();
        let result = claims
            .claim_ownership(&consumer, 5, "S0", "Alice", "City-Y")
            .await;
        assert!(matches!(result, Err(CustodyError::NotFound(5))));
    }

    #[tokio::test]
    async fn test_unknown_asset_reported_before_input_errors() {
        let (_, claims) = claimable().await;
        let consumer = Principal::new("0xalice").unwrap();
        let result = claims.claim_ownership(&consumer, 42, "S0", "", "").await;
        assert!(matches!(result, Err(CustodyError::NotFound(42))));

        let result = claims.claim_ownership(&consumer, 1, "wrong", "", "").await;
        assert!(matches!(result, Err(CustodyError::InvalidSecret(1))));

        let result = claims.claim_ownership(&consumer, 1, "S0", "  ", "").await;
        assert!(matches!(result, Err(CustodyError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_reclaim_needs_no_customer_name() {
        let (_, claims) = claimable().await;
        let consumer = Principal::new("0xalice").unwrap();
        claims
            .claim_ownership(&consumer, 1, "S0", "Alice", "City-Y")
            .await
            .unwrap();

        let again = claims.claim_ownership(&consumer, 1, "S0", "", "").await.unwrap();
        assert_eq!(again.claim().customer_name, "Alice");
    }
}
