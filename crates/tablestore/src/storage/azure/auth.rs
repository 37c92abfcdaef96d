//! Shared Key Lite request signing.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use tablestore_core::storage::{RepositoryError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Account name plus decoded access key.
#[derive(Clone)]
pub struct SharedKeyCredential {
    account: String,
    key: Vec<u8>,
}

impl SharedKeyCredential {
    /// Builds a credential from a base64 encoded access key.
    pub fn new(account: impl Into<String>, base64_key: &str) -> Result<Self> {
        let key = STANDARD.decode(base64_key.trim()).map_err(|_| {
            RepositoryError::ConnectionFailed("storage access key is not valid base64".to_string())
        })?;
        Ok(Self {
            account: account.into(),
            key,
        })
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Value of the `Authorization` header for a request dated `date` to `path`.
    ///
    /// `path` is the URL path exactly as sent, query string excluded.
    pub fn authorization(&self, date: &str, path: &str) -> Result<String> {
        let signature = self.sign(&string_to_sign(date, &self.account, path))?;
        Ok(format!("SharedKeyLite {}:{}", self.account, signature))
    }

    fn sign(&self, payload: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| RepositoryError::ConnectionFailed(format!("invalid signing key: {e}")))?;
        mac.update(payload.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

impl std::fmt::Debug for SharedKeyCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedKeyCredential")
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}

/// `{date}\n/{account}{path}`
pub(crate) fn string_to_sign(date: &str, account: &str, path: &str) -> String {
    format!("{date}\n/{account}{path}")
}

/// RFC 1123 date as required by the `x-ms-date` header.
pub(crate) fn rfc1123(date: DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
