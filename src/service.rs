//! Custody service
//!
//! The operation surface of the ledger. Every mutating call names the
//! calling principal explicitly; every call returns a typed result or a
//! typed `CustodyError`.

use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::audit::AuditTrail;
use crate::crypto::{generate_secret, Commitment};
use crate::custody::{ClaimModule, ClaimOutcome, HandoverEngine, HandoverReceipt};
use crate::directory::{DisplayProfile, IdentityDirectory};
use crate::error::CustodyError;
use crate::integrity::{IntegrityChecker, IntegrityReport};
use crate::journal::Journal;
use crate::ledger::models::*;
use crate::ledger::Ledger;
use crate::mirror::{HandoverMirror, PendingHandover};
use crate::roles::{Role, RoleRegistry};

/// A custody event decorated with whatever the directory knows about its actor
#[derive(Debug, Clone, Serialize)]
pub struct DisplayedEvent {
    #[serde(flatten)]
    pub event: CustodyEvent,
    pub actor_profile: Option<DisplayProfile>,
}

#[derive(Clone)]
pub struct CustodyService {
    ledger: Ledger,
    roles: RoleRegistry,
    handover: HandoverEngine,
    claims: ClaimModule,
    audit: AuditTrail,
    journal: Option<Journal>,
    /// Held across a write and its journal entry, so the journal lists
    /// operations in ledger commit order
    journal_order: Arc<Mutex<()>>,
    directory: IdentityDirectory,
    mirror: HandoverMirror,
}

impl CustodyService {
    /// Service over `ledger` with no journal and no directory
    pub fn new(ledger: Ledger) -> Self {
        Self {
            roles: RoleRegistry::new(ledger.clone()),
            handover: HandoverEngine::new(ledger.clone()),
            claims: ClaimModule::new(ledger.clone()),
            audit: AuditTrail::new(ledger.clone()),
            ledger,
            journal: None,
            journal_order: Arc::new(Mutex::new(())),
            directory: IdentityDirectory::Disabled,
            mirror: HandoverMirror::new(),
        }
    }

    /// Journal every committed write to `journal`
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Decorate displayed history from `directory`
    pub fn with_directory(mut self, directory: IdentityDirectory) -> Self {
        self.directory = directory;
        self
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn roles(&self) -> &RoleRegistry {
        &self.roles
    }

    pub fn mirror(&self) -> &HandoverMirror {
        &self.mirror
    }

    async fn ordered(&self) -> MutexGuard<'_, ()> {
        self.journal_order.lock().await
    }

    /// Register an asset. Caller must hold CREATOR.
    pub async fn create_asset(
        &self,
        caller: &Principal,
        name: &str,
        consumer_commitment: Commitment,
        handover_commitment: Commitment,
        location: &str,
    ) -> Result<Asset, CustodyError> {
        let _order = self.ordered().await;
        let asset = self
            .ledger
            .create_asset(caller, name, consumer_commitment, handover_commitment, location)
            .await?;

        self.journal(
            "create_asset",
            Some(asset.id),
            caller,
            json!({
                "name": asset.name,
                "consumer_commitment": asset.consumer_commitment,
                "handover_commitment": asset.handover_commitment,
            }),
        )
        .await;
        Ok(asset)
    }

    /// Rotate the pending handover commitment. Owner only.
    pub async fn generate_handover(
        &self,
        caller: &Principal,
        id: AssetId,
        next_commitment: Commitment,
    ) -> Result<Asset, CustodyError> {
        let _order = self.ordered().await;
        let asset = self.handover.generate_handover(caller, id, next_commitment).await?;
        self.journal(
            "generate_handover",
            Some(id),
            caller,
            json!({ "handover_commitment": asset.handover_commitment }),
        )
        .await;
        Ok(asset)
    }

    /// Generate a fresh secret, commit it as the next handover and keep the
    /// secret in the mirror so the owner can show it again later
    pub async fn issue_handover(
        &self,
        caller: &Principal,
        id: AssetId,
    ) -> Result<(Asset, PendingHandover), CustodyError> {
        let pair = generate_secret(&id.to_string());
        let asset = self.generate_handover(caller, id, pair.commitment).await?;
        let pending = self.mirror.remember(id, &pair.secret).await;
        debug!("Mirrored pending handover for asset {}", id);
        Ok((asset, pending))
    }

    /// The mirrored secret for the live handover commitment. Owner only.
    /// `None` once the ledger has moved past it.
    pub async fn pending_handover(
        &self,
        caller: &Principal,
        id: AssetId,
    ) -> Result<Option<PendingHandover>, CustodyError> {
        let asset = self.ledger.get_asset(id).await?;
        if asset.current_owner != *caller {
            return Err(CustodyError::NotOwner {
                asset_id: id,
                principal: caller.to_string(),
            });
        }
        Ok(self.mirror.pending_for(&asset).await)
    }

    /// Take custody by revealing the handover secret
    pub async fn accept_handover(
        &self,
        caller: &Principal,
        id: AssetId,
        presented_secret: &str,
        next_commitment: Commitment,
        location: &str,
    ) -> Result<HandoverReceipt, CustodyError> {
        let _order = self.ordered().await;
        let receipt = self
            .handover
            .accept_handover(caller, id, presented_secret, next_commitment, location)
            .await?;

        self.journal(
            "accept_handover",
            Some(id),
            caller,
            json!({
                "previous_owner": receipt.previous_owner,
                "resulting_state": receipt.event.resulting_state,
                "location": receipt.event.location,
                "consumed_commitment": receipt.event.consumed_commitment,
                "handover_commitment": receipt.asset.handover_commitment,
            }),
        )
        .await;
        self.mirror.reconcile(&receipt.asset).await;
        Ok(receipt)
    }

    /// Client-side flow: refuse to hand over against a record that fails the
    /// integrity check, then accept
    pub async fn accept_handover_checked(
        &self,
        caller: &Principal,
        id: AssetId,
        presented_secret: &str,
        next_commitment: Commitment,
        location: &str,
    ) -> Result<HandoverReceipt, CustodyError> {
        let (asset, history) = self.ledger.get_asset_with_history(id).await?;
        IntegrityChecker::guard_handover(&asset, &history)?;
        self.accept_handover(caller, id, presented_secret, next_commitment, location)
            .await
    }

    /// Append an inspection record. Open to any principal.
    pub async fn record_verification(
        &self,
        caller: &Principal,
        id: AssetId,
        location: &str,
        remarks: &str,
    ) -> Result<AuditEvent, CustodyError> {
        let _order = self.ordered().await;
        let event = self.audit.record_verification(caller, id, location, remarks).await?;
        self.journal("record_verification", Some(id), caller, &event).await;
        Ok(event)
    }

    /// Terminal consumer claim
    pub async fn claim_ownership(
        &self,
        caller: &Principal,
        id: AssetId,
        presented_secret: &str,
        customer_name: &str,
        location: &str,
    ) -> Result<ClaimOutcome, CustodyError> {
        let _order = self.ordered().await;
        let outcome = self
            .claims
            .claim_ownership(caller, id, presented_secret, customer_name, location)
            .await?;
        if outcome.is_first() {
            self.journal("claim_ownership", Some(id), caller, outcome.claim()).await;
        }
        Ok(outcome)
    }

    /// Admin only. Returns whether anything changed.
    pub async fn grant_role(
        &self,
        caller: &Principal,
        role: Role,
        principal: &Principal,
    ) -> Result<bool, CustodyError> {
        let _order = self.ordered().await;
        let changed = self.roles.grant_role(caller, role, principal).await?;
        if changed {
            self.journal("grant_role", None, caller, json!({ "role": role, "principal": principal }))
                .await;
        }
        Ok(changed)
    }

    /// Admin only. Returns whether anything changed.
    pub async fn revoke_role(
        &self,
        caller: &Principal,
        role: Role,
        principal: &Principal,
    ) -> Result<bool, CustodyError> {
        let _order = self.ordered().await;
        let changed = self.roles.revoke_role(caller, role, principal).await?;
        if changed {
            self.journal("revoke_role", None, caller, json!({ "role": role, "principal": principal }))
                .await;
        }
        Ok(changed)
    }

    pub async fn has_role(&self, role: Role, principal: &Principal) -> Result<bool, CustodyError> {
        self.roles.has_role(role, principal).await
    }

    pub async fn get_asset(&self, id: AssetId) -> Result<Asset, CustodyError> {
        self.ledger.get_asset(id).await
    }

    pub async fn get_history(&self, id: AssetId) -> Result<Vec<CustodyEvent>, CustodyError> {
        self.ledger.get_history(id).await
    }

    pub async fn get_verifications(&self, id: AssetId) -> Result<Vec<AuditEvent>, CustodyError> {
        self.ledger.get_verifications(id).await
    }

    /// Integrity check against the ledger copy
    pub async fn verify_integrity(&self, id: AssetId) -> Result<IntegrityReport, CustodyError> {
        IntegrityChecker::verify_asset(&self.ledger, id).await
    }

    /// History for display. Directory failures only blank the profile.
    pub async fn displayed_history(&self, id: AssetId) -> Result<Vec<DisplayedEvent>, CustodyError> {
        let history = self.ledger.get_history(id).await?;
        let mut displayed = Vec::with_capacity(history.len());
        for event in history {
            let actor_profile = self.directory.display_profile(&event.actor).await;
            displayed.push(DisplayedEvent {
                event,
                actor_profile,
            });
        }
        Ok(displayed)
    }

    /// Append to the operation journal after a committed write. Never fails
    /// the operation: the ledger is already committed.
    async fn journal<T: Serialize>(
        &self,
        operation: &str,
        asset_id: Option<AssetId>,
        actor: &Principal,
        payload: T,
    ) {
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.append(operation, asset_id, actor.as_str(), &payload).await {
                warn!("Failed to journal {} by {}: {}", operation, actor, e);
            }
        }
    }
}
