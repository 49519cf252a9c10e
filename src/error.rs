use thiserror::Error;

use crate::ledger::models::AssetId;

impl From<serde_json::Error> for CustodyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Transport(format!("JSON serialization error: {}", err))
    }
}

impl From<sqlx::Error> for CustodyError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(format!("Database error: {}", err))
    }
}

#[derive(Error, Debug)]
pub enum CustodyError {
    #[error("Unauthorized: {principal} lacks role {role}")]
    Unauthorized { principal: String, role: String },

    #[error("Not owner: {principal} does not hold custody of asset {asset_id}")]
    NotOwner { asset_id: AssetId, principal: String },

    #[error("Invalid secret presented for asset {0}")]
    InvalidSecret(AssetId),

    #[error("Stale commitment: handover for asset {0} was already consumed")]
    StaleCommitment(AssetId),

    #[error("Asset {0} has been claimed and accepts no further custody transfers")]
    TerminalAsset(AssetId),

    #[error("Asset {0} not found")]
    NotFound(AssetId),

    #[error("Integrity mismatch on asset {asset_id}: {reason}")]
    IntegrityMismatch { asset_id: AssetId, reason: String },

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl CustodyError {
    pub fn unauthorized(principal: impl ToString, role: impl ToString) -> Self {
        Self::Unauthorized {
            principal: principal.to_string(),
            role: role.to_string(),
        }
    }

    pub fn integrity(asset_id: AssetId, reason: impl Into<String>) -> Self {
        Self::IntegrityMismatch {
            asset_id,
            reason: reason.into(),
        }
    }

    /// Short machine-readable tag, used in API error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "unauthorized",
            Self::NotOwner { .. } => "not_owner",
            Self::InvalidSecret(_) => "invalid_secret",
            Self::StaleCommitment(_) => "stale_commitment",
            Self::TerminalAsset(_) => "terminal_asset",
            Self::NotFound(_) => "not_found",
            Self::IntegrityMismatch { .. } => "integrity_mismatch",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::InvalidInput(_) => "invalid_input",
            Self::Database(_) => "database",
            Self::Config(_) => "config",
            Self::Transport(_) => "transport",
        }
    }

    /// Whether a caller may resubmit after re-reading the ledger.
    ///
    /// A stale commitment means someone else won the race; the caller must
    /// fetch the new state before deciding what to do. Database errors cover
    /// busy/locked conditions on file-backed ledgers.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StaleCommitment(_) | Self::Database(_))
    }
}
