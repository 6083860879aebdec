//! Bearer credential acquisition and storage.
//!
//! `TokenProvider` holds the most recently acquired credential for reuse by
//! the connection layer. Acquisition itself is a single request/response
//! exchange; the provider does not deduplicate concurrent calls — the
//! connection layer is the only caller and serialises reauthentication.

use crate::client::PricesApi;
use crate::error::ApiResult;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// An acquired bearer credential.
///
/// No expiry is computed locally; invalidity is detected only by the
/// upstream rejecting a connection.
#[derive(Clone)]
pub struct Credential {
    access_token: String,
    acquired_at: DateTime<Utc>,
}

impl Credential {
    /// Create a credential acquired now.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            acquired_at: Utc::now(),
        }
    }

    /// The raw token string.
    pub fn token(&self) -> &str {
        &self.access_token
    }

    /// When the credential was acquired.
    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    /// `Authorization` header value.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field("acquired_at", &self.acquired_at)
            .finish()
    }
}

/// Acquires and stores the current bearer credential.
pub struct TokenProvider {
    api: Arc<PricesApi>,
    current: RwLock<Option<Credential>>,
}

impl TokenProvider {
    /// Create a provider backed by the given API client.
    pub fn new(api: Arc<PricesApi>) -> Self {
        Self {
            api,
            current: RwLock::new(None),
        }
    }

    /// Acquire a fresh credential and store it as current.
    pub async fn acquire(&self) -> ApiResult<Credential> {
        let token = self.api.request_access_token().await?;
        let credential = Credential::new(token);
        *self.current.write() = Some(credential.clone());
        debug!(acquired_at = %credential.acquired_at, "Stored new credential");
        Ok(credential)
    }

    /// The most recently acquired credential, if any.
    pub fn current(&self) -> Option<Credential> {
        self.current.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_bearer() {
        let credential = Credential::new("abc123");
        assert_eq!(credential.bearer(), "Bearer abc123");
    }

    #[test]
    fn test_credential_debug_redacts_token() {
        let credential = Credential::new("super-secret-jwt");
        let debug = format!("{credential:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("super-secret-jwt"));
    }

    #[test]
    fn test_provider_starts_empty() {
        let api = Arc::new(PricesApi::new("https://api.example.com").unwrap());
        let provider = TokenProvider::new(api);
        assert!(provider.current().is_none());
    }
}
