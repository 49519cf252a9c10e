//! Inspection log
//!
//! Any principal may record a verification against any asset, claimed or
//! not. Recording never touches custody, state or commitments.

use chrono::Utc;
use tracing::info;

use crate::error::CustodyError;
use crate::ledger::models::*;
use crate::ledger::{queries, Ledger};

#[derive(Clone)]
pub struct AuditTrail {
    ledger: Ledger,
}

impl AuditTrail {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }

    pub async fn record_verification(
        &self,
        caller: &Principal,
        id: AssetId,
        location: &str,
        remarks: &str,
    ) -> Result<AuditEvent, CustodyError> {
        let location = require_non_empty("location", location)?;

        let mut tx = self.ledger.begin_write().await?;
        if !queries::asset_exists(tx.conn(), id).await? {
            return Err(CustodyError::NotFound(id));
        }

        let event = AuditEvent {
            verifier: caller.clone(),
            timestamp: Utc::now(),
            location,
            remarks: remarks.trim().to_string(),
        };
        queries::append_audit_event(tx.conn(), id, &event).await?;
        tx.commit().await?;

        info!("{} recorded a verification on asset {} at {}", caller, id, event.location);
        Ok(event)
    }
}
