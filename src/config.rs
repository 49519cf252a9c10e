use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;

use crate::error::CustodyError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    /// Genesis administrator, granted ADMIN when the ledger has none
    pub admin_principal: Option<String>,
    pub journal: JournalConfig,
    pub directory: DirectoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalConfig {
    pub enabled: bool,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Base URL of the identity directory; unset disables display lookups
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl AppConfig {
    /// Defaults, then `custody.toml` (or `$CUSTODY_CONFIG`), then `CUSTODY_*`
    /// environment variables, e.g. `CUSTODY_DATABASE_URL` or
    /// `CUSTODY_JOURNAL__PATH`.
    pub fn load() -> Result<Self, CustodyError> {
        let path = env::var("CUSTODY_CONFIG").unwrap_or_else(|_| "custody.toml".to_string());
        Self::load_from(&path)
    }

    pub fn load_from(path: &str) -> Result<Self, CustodyError> {
        let settings = Config::builder()
            .set_default("database_url", "sqlite://custody.db")
            .and_then(|b| b.set_default("server_host", "0.0.0.0"))
            .and_then(|b| b.set_default("server_port", 3000))
            .and_then(|b| b.set_default("journal.enabled", true))
            .and_then(|b| b.set_default("journal.path", "journal/custody.jsonl"))
            .and_then(|b| b.set_default("directory.timeout_secs", 5))
            .map_err(|e| CustodyError::Config(format!("Invalid defaults: {}", e)))?
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("CUSTODY")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(|e| CustodyError::Config(format!("Failed to load configuration: {}", e)))?;

        let config: AppConfig = settings
            .try_deserialize()
            .map_err(|e| CustodyError::Config(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CustodyError> {
        if self.database_url.trim().is_empty() {
            return Err(CustodyError::Config("database_url must be set".to_string()));
        }
        if self.journal.enabled && self.journal.path.trim().is_empty() {
            return Err(CustodyError::Config(
                "journal.path must be set when the journal is enabled".to_string(),
            ));
        }
        if let Some(url) = &self.directory.base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(CustodyError::Config(format!(
                    "directory.base_url must be an http(s) URL: {}",
                    url
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_defaults_without_file() {
        let config = AppConfig::load_from("/nonexistent/custody").unwrap();
        assert_eq!(config.server_port, 3000);
        assert!(config.journal.enabled);
        assert!(config.directory.base_url.is_none());
        assert_eq!(config.directory.timeout_secs, 5);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
database_url = "sqlite::memory:"
server_port = 8088
admin_principal = "0xAdmin"

[journal]
enabled = false

[directory]
base_url = "http://directory.local"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.server_port, 8088);
        assert_eq!(config.admin_principal.as_deref(), Some("0xAdmin"));
        assert!(!config.journal.enabled);
        assert_eq!(config.journal.path, "journal/custody.jsonl");
        assert_eq!(config.directory.base_url.as_deref(), Some("http://directory.local"));
    }

    #[test]
    fn test_rejects_bad_directory_url() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[directory]\nbase_url = \"ftp://nope\"").unwrap();
        assert!(matches!(
            AppConfig::load_from(file.path().to_str().unwrap()),
            Err(CustodyError::Config(_))
        ));
    }
}
