//! Token provider backed by a fixed token.

use async_trait::async_trait;
use tracing::debug;

use crate::domain::ports::TokenProvider;

/// Environment variable read by [`StaticTokenProvider::from_env`].
pub const TOKEN_ENV_VAR: &str = "PATCHBAY_API_TOKEN";

/// Token provider handing out one configured token.
/// Refresh requests return the same token.
#[derive(Clone, Default)]
pub struct StaticTokenProvider {
    token: Option<String>,
}

impl std::fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenProvider")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl StaticTokenProvider {
    /// Creates a provider for `token`. Empty tokens count as none.
    #[must_use]
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    /// Creates a provider from `PATCHBAY_API_TOKEN`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(std::env::var(TOKEN_ENV_VAR).ok())
    }

    /// Returns true if a token is configured.
    #[must_use]
    pub const fn has_token(&self) -> bool {
        self.token.is_some()
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self, refresh: bool) -> Option<String> {
        if refresh {
            debug!("Static token cannot be refreshed, reusing it");
        }
        self.token.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_returns_configured_token() {
        let provider = StaticTokenProvider::new(Some("abc".to_string()));
        assert!(provider.has_token());
        assert_eq!(provider.token(false).await.as_deref(), Some("abc"));
        assert_eq!(provider.token(true).await.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_blank_token_is_none() {
        let provider = StaticTokenProvider::new(Some("  ".to_string()));
        assert!(!provider.has_token());
        assert_eq!(provider.token(false).await, None);
    }

    #[test]
    fn test_debug_redacts_token() {
        let provider = StaticTokenProvider::new(Some("secret".to_string()));
        let debug = format!("{provider:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("REDACTED"));
    }
}
