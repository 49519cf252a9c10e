use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::crypto::Commitment;
use crate::error::CustodyError;
use crate::ledger::models::*;

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, CustodyError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| CustodyError::Database(format!("Invalid timestamp {}: {}", value, e)))
}

fn parse_state(value: &str) -> Result<AssetState, CustodyError> {
    value
        .parse::<AssetState>()
        .map_err(|e| CustodyError::Database(format!("Invalid stored state: {}", e)))
}

fn parse_principal(value: &str) -> Result<Principal, CustodyError> {
    Principal::new(value)
        .map_err(|e| CustodyError::Database(format!("Invalid stored principal: {}", e)))
}

fn parse_commitment(value: &str) -> Result<Commitment, CustodyError> {
    Commitment::parse(value)
        .map_err(|e| CustodyError::Database(format!("Invalid stored commitment: {}", e)))
}

fn asset_from_row(row: &SqliteRow) -> Result<Asset, CustodyError> {
    let is_claimed: bool = row.try_get("is_claimed")?;
    let claim = if is_claimed {
        let claimed_by: String = row.try_get("claim_claimed_by")?;
        let timestamp: String = row.try_get("claim_timestamp")?;
        Some(Claim {
            customer_name: row.try_get("claim_customer_name")?,
            claimed_by: parse_principal(&claimed_by)?,
            location: row.try_get("claim_location")?,
            timestamp: parse_timestamp(&timestamp)?,
            is_claimed: true,
        })
    } else {
        None
    };

    Ok(Asset {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        creator: parse_principal(&row.try_get::<String, _>("creator")?)?,
        current_owner: parse_principal(&row.try_get::<String, _>("current_owner")?)?,
        state: parse_state(&row.try_get::<String, _>("state")?)?,
        consumer_commitment: parse_commitment(&row.try_get::<String, _>("consumer_commitment")?)?,
        handover_commitment: parse_commitment(&row.try_get::<String, _>("handover_commitment")?)?,
        claim,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
    })
}

pub(crate) async fn fetch_asset(
    conn: &mut SqliteConnection,
    id: AssetId,
) -> Result<Option<Asset>, CustodyError> {
    let row = sqlx::query(
        r#"
        SELECT id, name, creator, current_owner, state, consumer_commitment,
               handover_commitment, is_claimed, claim_customer_name, claim_claimed_by,
               claim_location, claim_timestamp, created_at
        FROM assets
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(asset_from_row).transpose()
}

pub(crate) async fn require_asset(
    conn: &mut SqliteConnection,
    id: AssetId,
) -> Result<Asset, CustodyError> {
    fetch_asset(conn, id).await?.ok_or(CustodyError::NotFound(id))
}

pub(crate) async fn fetch_history(
    conn: &mut SqliteConnection,
    id: AssetId,
) -> Result<Vec<CustodyEvent>, CustodyError> {
    let rows = sqlx::query(
        r#"
        SELECT actor, resulting_state, location, timestamp, consumed_commitment
        FROM custody_events
        WHERE asset_id = ?
        ORDER BY seq ASC
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    let mut events = Vec::with_capacity(rows.len());
    for row in rows {
        let consumed = row
            .try_get::<Option<String>, _>("consumed_commitment")?
            .map(|c| parse_commitment(&c))
            .transpose()?;

        events.push(CustodyEvent {
            actor: parse_principal(&row.try_get::<String, _>("actor")?)?,
            resulting_state: parse_state(&row.try_get::<String, _>("resulting_state")?)?,
            timestamp: parse_timestamp(&row.try_get::<String, _>("timestamp")?)?,
            location: row.try_get("location")?,
            consumed_commitment: consumed,
        });
    }

    Ok(events)
}

pub(crate) async fn fetch_verifications(
    conn: &mut SqliteConnection,
    id: AssetId,
) -> Result<Vec<AuditEvent>, CustodyError> {
    let rows = sqlx::query(
        r#"
        SELECT verifier, location, remarks, timestamp
        FROM audit_events
        WHERE asset_id = ?
        ORDER BY seq ASC
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| -> Result<AuditEvent, CustodyError> {
            Ok(AuditEvent {
                verifier: parse_principal(&row.try_get::<String, _>("verifier")?)?,
                timestamp: parse_timestamp(&row.try_get::<String, _>("timestamp")?)?,
                location: row.try_get("location")?,
                remarks: row.try_get("remarks")?,
            })
        })
        .collect()
}

pub(crate) async fn asset_exists(
    conn: &mut SqliteConnection,
    id: AssetId,
) -> Result<bool, CustodyError> {
    let row = sqlx::query("SELECT 1 FROM assets WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.is_some())
}

pub(crate) async fn insert_asset(
    conn: &mut SqliteConnection,
    name: &str,
    creator: &Principal,
    consumer_commitment: &Commitment,
    handover_commitment: &Commitment,
    created_at: DateTime<Utc>,
) -> Result<AssetId, CustodyError> {
    let result = sqlx::query(
        r#"
        INSERT INTO assets
        (name, creator, current_owner, state, consumer_commitment, handover_commitment, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(name)
    .bind(creator.as_str())
    .bind(creator.as_str())
    .bind(AssetState::Created.as_str())
    .bind(consumer_commitment.as_str())
    .bind(handover_commitment.as_str())
    .bind(created_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

pub(crate) async fn append_custody_event(
    conn: &mut SqliteConnection,
    id: AssetId,
    event: &CustodyEvent,
) -> Result<(), CustodyError> {
    sqlx::query(
        r#"
        INSERT INTO custody_events
        (asset_id, seq, actor, resulting_state, location, timestamp, consumed_commitment)
        VALUES (?, (SELECT COALESCE(MAX(seq), 0) + 1 FROM custody_events WHERE asset_id = ?),
                ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id)
    .bind(id)
    .bind(event.actor.as_str())
    .bind(event.resulting_state.as_str())
    .bind(&event.location)
    .bind(event.timestamp.to_rfc3339())
    .bind(event.consumed_commitment.as_ref().map(|c| c.as_str().to_string()))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn append_audit_event(
    conn: &mut SqliteConnection,
    id: AssetId,
    event: &AuditEvent,
) -> Result<(), CustodyError> {
    sqlx::query(
        r#"
        INSERT INTO audit_events (asset_id, seq, verifier, location, remarks, timestamp)
        VALUES (?, (SELECT COALESCE(MAX(seq), 0) + 1 FROM audit_events WHERE asset_id = ?),
                ?, ?, ?, ?)
        "#,
    )
    .bind(id)
    .bind(id)
    .bind(event.verifier.as_str())
    .bind(&event.location)
    .bind(&event.remarks)
    .bind(event.timestamp.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Whether `commitment` was opened by an earlier handover of this asset
pub(crate) async fn was_consumed(
    conn: &mut SqliteConnection,
    id: AssetId,
    commitment: &Commitment,
) -> Result<bool, CustodyError> {
    let row = sqlx::query(
        "SELECT 1 FROM custody_events WHERE asset_id = ? AND consumed_commitment = ? LIMIT 1",
    )
    .bind(id)
    .bind(commitment.as_str())
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.is_some())
}

/// Compare-and-swap of custody: applies only while `expected` is still the
/// live handover commitment. Returns the number of rows changed (0 or 1).
pub(crate) async fn swap_custody(
    conn: &mut SqliteConnection,
    id: AssetId,
    expected: &Commitment,
    next: &Commitment,
    new_owner: &Principal,
    new_state: AssetState,
) -> Result<u64, CustodyError> {
    let result = sqlx::query(
        r#"
        UPDATE assets
        SET current_owner = ?, handover_commitment = ?, state = ?
        WHERE id = ? AND handover_commitment = ? AND is_claimed = 0
        "#,
    )
    .bind(new_owner.as_str())
    .bind(next.as_str())
    .bind(new_state.as_str())
    .bind(id)
    .bind(expected.as_str())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Replace the pending handover commitment without moving custody.
/// Guarded on the owner so a concurrent handover is never overwritten.
pub(crate) async fn replace_handover_commitment(
    conn: &mut SqliteConnection,
    id: AssetId,
    owner: &Principal,
    expected: &Commitment,
    next: &Commitment,
) -> Result<u64, CustodyError> {
    let result = sqlx::query(
        r#"
        UPDATE assets
        SET handover_commitment = ?
        WHERE id = ? AND current_owner = ? AND handover_commitment = ? AND is_claimed = 0
        "#,
    )
    .bind(next.as_str())
    .bind(id)
    .bind(owner.as_str())
    .bind(expected.as_str())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Write the consumer claim; applies at most once per asset
pub(crate) async fn write_claim(
    conn: &mut SqliteConnection,
    id: AssetId,
    claim: &Claim,
) -> Result<u64, CustodyError> {
    let result = sqlx::query(
        r#"
        UPDATE assets
        SET is_claimed = 1, state = ?, claim_customer_name = ?, claim_claimed_by = ?,
            claim_location = ?, claim_timestamp = ?
        WHERE id = ? AND is_claimed = 0
        "#,
    )
    .bind(AssetState::Claimed.as_str())
    .bind(&claim.customer_name)
    .bind(claim.claimed_by.as_str())
    .bind(&claim.location)
    .bind(claim.timestamp.to_rfc3339())
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}
