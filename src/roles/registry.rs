use chrono::Utc;
use sqlx::{Row, SqliteConnection};
use std::collections::BTreeSet;
use std::str::FromStr;
use tracing::{info, warn};

use super::Role;
use crate::error::CustodyError;
use crate::ledger::models::Principal;
use crate::ledger::Ledger;

/// Role lookup inside an open transaction
pub async fn has_role_in(
    conn: &mut SqliteConnection,
    role: Role,
    principal: &Principal,
) -> Result<bool, CustodyError> {
    let row = sqlx::query("SELECT 1 FROM role_assignments WHERE principal = ? AND role = ?")
        .bind(principal.as_str())
        .bind(role.as_str())
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.is_some())
}

/// Full role set of a principal inside an open transaction
pub async fn roles_of_in(
    conn: &mut SqliteConnection,
    principal: &Principal,
) -> Result<BTreeSet<Role>, CustodyError> {
    let rows = sqlx::query("SELECT role FROM role_assignments WHERE principal = ?")
        .bind(principal.as_str())
        .fetch_all(&mut *conn)
        .await?;

    let mut roles = BTreeSet::new();
    for row in rows {
        let name: String = row.try_get("role")?;
        match Role::from_str(&name) {
            Ok(role) => {
                roles.insert(role);
            }
            Err(e) => warn!("Ignoring stored role for {}: {}", principal, e),
        }
    }
    Ok(roles)
}

/// Admin-gated role assignments, stored in the ledger
#[derive(Clone)]
pub struct RoleRegistry {
    ledger: Ledger,
}

impl RoleRegistry {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }

    /// Grant ADMIN to the genesis administrator.
    ///
    /// Only succeeds while no ADMIN exists; returns false when the registry
    /// already has one (including `principal` itself).
    pub async fn bootstrap_admin(&self, principal: &Principal) -> Result<bool, CustodyError> {
        let mut tx = self.ledger.begin_write().await?;

        let existing = sqlx::query("SELECT 1 FROM role_assignments WHERE role = ? LIMIT 1")
            .bind(Role::Admin.as_str())
            .fetch_optional(&mut *tx.conn())
            .await?;
        if existing.is_some() {
            return Ok(false);
        }

        insert_assignment(tx.conn(), Role::Admin, principal, None).await?;
        tx.commit().await?;

        info!("Bootstrapped admin {}", principal);
        Ok(true)
    }

    /// Grant `role` to `principal`. Returns false if it was already held.
    pub async fn grant_role(
        &self,
        caller: &Principal,
        role: Role,
        principal: &Principal,
    ) -> Result<bool, CustodyError> {
        let mut tx = self.ledger.begin_write().await?;
        require_admin(tx.conn(), caller).await?;

        let changed = insert_assignment(tx.conn(), role, principal, Some(caller)).await?;
        tx.commit().await?;

        if changed {
            info!("{} granted {} to {}", caller, role, principal);
        }
        Ok(changed)
    }

    /// Revoke `role` from `principal`. Returns false if it was not held.
    ///
    /// Past custody events are unaffected; roles only matter at the time of
    /// the operation that consults them.
    pub async fn revoke_role(
        &self,
        caller: &Principal,
        role: Role,
        principal: &Principal,
    ) -> Result<bool, CustodyError> {
        let mut tx = self.ledger.begin_write().await?;
        require_admin(tx.conn(), caller).await?;

        let result = sqlx::query("DELETE FROM role_assignments WHERE principal = ? AND role = ?")
            .bind(principal.as_str())
            .bind(role.as_str())
            .execute(&mut *tx.conn())
            .await?;
        tx.commit().await?;

        let changed = result.rows_affected() > 0;
        if changed {
            info!("{} revoked {} from {}", caller, role, principal);
        }
        Ok(changed)
    }

    /// Whether `principal` currently holds `role`
    pub async fn has_role(&self, role: Role, principal: &Principal) -> Result<bool, CustodyError> {
        let mut conn = self.ledger.pool().acquire().await?;
        has_role_in(&mut conn, role, principal).await
    }

    /// All roles currently held by `principal`
    pub async fn roles_of(&self, principal: &Principal) -> Result<BTreeSet<Role>, CustodyError> {
        let mut conn = self.ledger.pool().acquire().await?;
        roles_of_in(&mut conn, principal).await
    }
}

async fn require_admin(conn: &mut SqliteConnection, caller: &Principal) -> Result<(), CustodyError> {
    if has_role_in(conn, Role::Admin, caller).await? {
        Ok(())
    } else {
        Err(CustodyError::unauthorized(caller, Role::Admin))
    }
}

async fn insert_assignment(
    conn: &mut SqliteConnection,
    role: Role,
    principal: &Principal,
    granted_by: Option<&Principal>,
) -> Result<bool, CustodyError> {
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO role_assignments (principal, role, granted_by, granted_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(principal.as_str())
    .bind(role.as_str())
    .bind(granted_by.map(|p| p.as_str().to_string()))
    .bind(Utc::now().to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}
