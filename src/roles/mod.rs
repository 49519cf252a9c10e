//! Role Registry
//!
//! Principal → role-set mapping. Roles gate who may create assets and who may
//! administer roles; they do not gate who may accept a handover.

pub mod registry;

pub use registry::{has_role_in, roles_of_in, RoleRegistry};

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Creator,
    Carrier,
    Outlet,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Creator, Role::Carrier, Role::Outlet];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Creator => "creator",
            Role::Carrier => "carrier",
            Role::Outlet => "outlet",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "creator" | "manufacturer" => Ok(Role::Creator),
            "carrier" | "distributor" => Ok(Role::Carrier),
            "outlet" | "retailer" => Ok(Role::Outlet),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
