use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::Commitment;
use crate::error::CustodyError;

/// Ledger-assigned asset identifier, strictly increasing from 1
pub type AssetId = i64;

/// An identity able to authorize ledger actions (an account address).
///
/// Principals compare case-insensitively, so they are stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Principal(String);

impl Principal {
    pub fn new(value: &str) -> Result<Self, CustodyError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(CustodyError::InvalidInput(
                "Principal must not be empty".to_string(),
            ));
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Principal {
    type Error = CustodyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Principal> for String {
    fn from(value: Principal) -> Self {
        value.0
    }
}

/// Asset lifecycle. `Claimed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetState {
    Created,
    InTransit,
    AtOutlet,
    Claimed,
}

impl AssetState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetState::Created => "created",
            AssetState::InTransit => "in_transit",
            AssetState::AtOutlet => "at_outlet",
            AssetState::Claimed => "claimed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AssetState::Claimed)
    }
}

impl std::str::FromStr for AssetState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(AssetState::Created),
            "in_transit" => Ok(AssetState::InTransit),
            "at_outlet" => Ok(AssetState::AtOutlet),
            "claimed" => Ok(AssetState::Claimed),
            other => Err(format!("Unknown asset state: {}", other)),
        }
    }
}

impl fmt::Display for AssetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ledger record of a physical asset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub name: String,
    pub creator: Principal,
    pub current_owner: Principal,
    pub state: AssetState,
    pub consumer_commitment: Commitment,
    pub handover_commitment: Commitment,
    pub claim: Option<Claim>,
    pub created_at: DateTime<Utc>,
}

impl Asset {
    pub fn is_claimed(&self) -> bool {
        self.claim.as_ref().map(|c| c.is_claimed).unwrap_or(false)
    }
}

/// A completed custody handover (or the creation seed event)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodyEvent {
    pub actor: Principal,
    pub resulting_state: AssetState,
    pub timestamp: DateTime<Utc>,
    pub location: String,
    /// Handover commitment opened by this event; `None` for the creation event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumed_commitment: Option<Commitment>,
}

/// An inspection record, independent of custody
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub verifier: Principal,
    pub timestamp: DateTime<Utc>,
    pub location: String,
    pub remarks: String,
}

/// The terminal consumer binding. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub customer_name: String,
    pub claimed_by: Principal,
    pub location: String,
    pub timestamp: DateTime<Utc>,
    pub is_claimed: bool,
}

/// Reject blank free-text fields
pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<String, CustodyError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CustodyError::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}
