//! Lifecycle classification of an accepted handover
//!
//! Kept apart from authorization: a valid secret always moves custody, the
//! accepting principal's roles only decide which state label results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::ledger::models::AssetState;
use crate::roles::Role;

/// Role → resulting state, first match wins
pub const STATE_TABLE: &[(Role, AssetState)] = &[
    (Role::Outlet, AssetState::AtOutlet),
    (Role::Carrier, AssetState::InTransit),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Classified { role: Role, state: AssetState },
    RoleMismatch { retained: AssetState },
}

impl Classification {
    pub fn state(&self) -> AssetState {
        match self {
            Classification::Classified { state, .. } => *state,
            Classification::RoleMismatch { retained } => *retained,
        }
    }
}

/// Warning surfaced to the caller alongside a successful handover
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HandoverWarning {
    /// The new custodian holds neither CARRIER nor OUTLET; state was left as is
    RoleMismatch { retained_state: AssetState },
}

pub fn classify(roles: &BTreeSet<Role>, prior: AssetState) -> Classification {
    STATE_TABLE
        .iter()
        .find(|(role, _)| roles.contains(role))
        .map(|(role, state)| Classification::Classified {
            role: *role,
            state: *state,
        })
        .unwrap_or(Classification::RoleMismatch { retained: prior })
}
