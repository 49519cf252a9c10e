// Ledger schema
// Applied statement by statement at startup; every statement is idempotent.
// The event tables and assets are append-only: triggers abort any attempt to
// rewrite or delete history.

pub const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS assets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        creator TEXT NOT NULL,
        current_owner TEXT NOT NULL,
        state TEXT NOT NULL,
        consumer_commitment TEXT NOT NULL,
        handover_commitment TEXT NOT NULL,
        is_claimed INTEGER NOT NULL DEFAULT 0,
        claim_customer_name TEXT,
        claim_claimed_by TEXT,
        claim_location TEXT,
        claim_timestamp TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS custody_events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        asset_id INTEGER NOT NULL REFERENCES assets(id),
        seq INTEGER NOT NULL,
        actor TEXT NOT NULL,
        resulting_state TEXT NOT NULL,
        location TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        consumed_commitment TEXT,
        UNIQUE (asset_id, seq)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS audit_events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        asset_id INTEGER NOT NULL REFERENCES assets(id),
        seq INTEGER NOT NULL,
        verifier TEXT NOT NULL,
        location TEXT NOT NULL,
        remarks TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        UNIQUE (asset_id, seq)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS role_assignments (
        principal TEXT NOT NULL,
        role TEXT NOT NULL,
        granted_by TEXT,
        granted_at TEXT NOT NULL,
        PRIMARY KEY (principal, role)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_custody_events_asset ON custody_events(asset_id, seq)",
    "CREATE INDEX IF NOT EXISTS idx_custody_events_commitment ON custody_events(asset_id, consumed_commitment)",
    "CREATE INDEX IF NOT EXISTS idx_audit_events_asset ON audit_events(asset_id, seq)",
    r#"
    CREATE TRIGGER IF NOT EXISTS custody_events_append_only_update
    BEFORE UPDATE ON custody_events
    BEGIN
        SELECT RAISE(ABORT, 'custody_events is append-only');
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS custody_events_append_only_delete
    BEFORE DELETE ON custody_events
    BEGIN
        SELECT RAISE(ABORT, 'custody_events is append-only');
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS audit_events_append_only_update
    BEFORE UPDATE ON audit_events
    BEGIN
        SELECT RAISE(ABORT, 'audit_events is append-only');
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS audit_events_append_only_delete
    BEFORE DELETE ON audit_events
    BEGIN
        SELECT RAISE(ABORT, 'audit_events is append-only');
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS assets_never_deleted
    BEFORE DELETE ON assets
    BEGIN
        SELECT RAISE(ABORT, 'assets are never deleted');
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS assets_claim_immutable
    BEFORE UPDATE ON assets
    WHEN OLD.is_claimed = 1
    BEGIN
        SELECT RAISE(ABORT, 'claimed assets are immutable');
    END
    "#,
];
