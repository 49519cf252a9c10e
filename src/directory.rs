//! Identity Directory
//!
//! Off-ledger, non-authoritative lookup of display metadata by principal.
//! Used to decorate custody history for people; never consulted for
//! authorization. Lookups are case-insensitive and may fail freely.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::CustodyError;
use crate::ledger::models::Principal;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayProfile {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub document_refs: Vec<String>,
}

#[derive(Clone)]
pub enum IdentityDirectory {
    /// Fixed in-process map, keyed by lowercased principal
    Static(HashMap<String, DisplayProfile>),
    /// Remote directory service answering `GET {base_url}/users/{principal}`
    Http {
        client: reqwest::Client,
        base_url: String,
    },
    /// No directory configured
    Disabled,
}

impl IdentityDirectory {
    pub fn from_profiles<I>(profiles: I) -> Self
    where
        I: IntoIterator<Item = (String, DisplayProfile)>,
    {
        Self::Static(
            profiles
                .into_iter()
                .map(|(principal, profile)| (principal.trim().to_ascii_lowercase(), profile))
                .collect(),
        )
    }

    pub fn http(base_url: &str, timeout: Duration) -> Result<Self, CustodyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CustodyError::Config(format!("Failed to build directory client: {}", e)))?;

        Ok(Self::Http {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Look up a principal. `Ok(None)` means the directory has no entry (or
    /// none is configured); `UpstreamUnavailable` means it could not answer.
    pub async fn lookup(&self, principal: &Principal) -> Result<Option<DisplayProfile>, CustodyError> {
        let key = principal.as_str().to_ascii_lowercase();
        match self {
            Self::Static(profiles) => Ok(profiles.get(&key).cloned()),
            Self::Disabled => Ok(None),
            Self::Http { client, base_url } => {
                let url = format!("{}/users/{}", base_url, key);
                debug!("Directory lookup {}", url);

                let response = client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| CustodyError::UpstreamUnavailable(format!("{}: {}", url, e)))?;

                if response.status() == StatusCode::NOT_FOUND {
                    return Ok(None);
                }
                if !response.status().is_success() {
                    return Err(CustodyError::UpstreamUnavailable(format!(
                        "{} returned {}",
                        url,
                        response.status()
                    )));
                }

                let profile = response
                    .json::<DisplayProfile>()
                    .await
                    .map_err(|e| CustodyError::UpstreamUnavailable(format!("{}: {}", url, e)))?;
                Ok(Some(profile))
            }
        }
    }

    /// Best-effort display lookup: any failure just suppresses the field
    pub async fn display_profile(&self, principal: &Principal) -> Option<DisplayProfile> {
        match self.lookup(principal).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!("Display lookup for {} skipped: {}", principal, e);
                None
            }
        }
    }
}
