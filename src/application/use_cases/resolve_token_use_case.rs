//! Token resolution use case.

use tracing::{debug, info};

use crate::application::dto::TokenSource;
use crate::infrastructure::storage::StaticTokenProvider;

/// Resolved token with its source.
#[derive(Debug, Clone)]
pub struct ResolvedToken {
    /// Provider serving the token.
    pub provider: StaticTokenProvider,
    /// Source of the token.
    pub source: TokenSource,
}

/// Picks the API token from the available sources.
#[derive(Debug, Default)]
pub struct ResolveTokenUseCase;

impl ResolveTokenUseCase {
    /// Creates new use case.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Resolves the token.
    ///
    /// Priority:
    /// 1. Command line
    /// 2. Environment
    /// 3. Config file
    #[must_use]
    pub fn execute(
        &self,
        cli_token: Option<String>,
        env_token: Option<String>,
        config_token: Option<String>,
    ) -> Option<ResolvedToken> {
        let candidates = [
            (cli_token, TokenSource::CommandLine),
            (env_token, TokenSource::Environment),
            (config_token, TokenSource::ConfigFile),
        ];

        for (token, source) in candidates {
            let provider = StaticTokenProvider::new(token);
            if provider.has_token() {
                info!(source = %source, "Using API token");
                return Some(ResolvedToken { provider, source });
            }
            debug!(source = %source, "No API token");
        }

        debug!("No token found in any source");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::TokenProvider;

    #[tokio::test]
    async fn test_cli_priority() {
        let resolved = ResolveTokenUseCase::new()
            .execute(
                Some("cli".to_string()),
                Some("env".to_string()),
                Some("file".to_string()),
            )
            .unwrap();

        assert_eq!(resolved.source, TokenSource::CommandLine);
        assert_eq!(resolved.provider.token(false).await.as_deref(), Some("cli"));
    }

    #[test]
    fn test_blank_values_fall_through() {
        let resolved = ResolveTokenUseCase::new()
            .execute(Some(String::new()), Some("  ".to_string()), Some("file".to_string()))
            .unwrap();

        assert_eq!(resolved.source, TokenSource::ConfigFile);
    }

    #[test]
    fn test_no_token_found() {
        assert!(ResolveTokenUseCase::new().execute(None, None, None).is_none());
    }
}
