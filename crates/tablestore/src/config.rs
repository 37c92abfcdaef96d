use std::{env, fmt, time::Duration};

use base64::{engine::general_purpose::STANDARD, Engine};
use thiserror::Error;

/// Errors raised while assembling the startup configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    MissingSetting(&'static str),

    #[error("Storage access key is not valid base64")]
    InvalidStorageKey,
}

/// Connection settings for the hosted table store.
#[derive(Clone)]
pub struct AzureTableSettings {
    pub storage_account: String,
    storage_key: String,
    /// Table used when a request does not name one.
    pub table_name: String,
    /// Overrides the public endpoint, e.g. `http://127.0.0.1:10002/devstoreaccount1`.
    pub endpoint: Option<String>,
}

impl AzureTableSettings {
    pub fn new(
        storage_account: Option<String>,
        storage_key: Option<String>,
        table_name: impl Into<String>,
        endpoint: Option<String>,
    ) -> Result<Self, ConfigError> {
        let storage_account = storage_account
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::MissingSetting("AZURE_STORAGE_ACCOUNT"))?;
        let storage_key = storage_key
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::MissingSetting("AZURE_STORAGE_KEY"))?;

        if STANDARD.decode(storage_key.trim()).is_err() {
            return Err(ConfigError::InvalidStorageKey);
        }

        Ok(Self {
            storage_account,
            storage_key: storage_key.trim().to_string(),
            table_name: table_name.into(),
            endpoint: endpoint.filter(|s| !s.trim().is_empty()),
        })
    }

    /// The base64 encoded access key.
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Base URL of the table service, without a trailing slash.
    pub fn endpoint(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}.table.core.windows.net", self.storage_account),
        }
    }
}

impl fmt::Debug for AzureTableSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureTableSettings")
            .field("storage_account", &self.storage_account)
            .field("storage_key", &"<redacted>")
            .field("table_name", &self.table_name)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Tuning knobs loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Entities per page served by the in-memory backend (default: 1,000)
    pub memory_page_size: usize,
    /// Client-level timeout for requests to the table service (default: 30)
    pub http_timeout_seconds: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `MEMORY_PAGE_SIZE` - In-memory page size (default: 1,000)
    /// - `HTTP_TIMEOUT_SECONDS` - Table service request timeout (default: 30)
    pub fn from_env() -> Self {
        Self {
            memory_page_size: env::var("MEMORY_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(1_000),
            http_timeout_seconds: env::var("HTTP_TIMEOUT_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        }
    }

    /// Get the request timeout as a Duration.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
