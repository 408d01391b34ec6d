//! Token provider port definition.

use async_trait::async_trait;

/// Supplies bearer tokens for authenticated image requests.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns the current token, or `None` when there is no session.
    ///
    /// `refresh` asks the provider to bypass any cached token, used after
    /// the server rejected the previous one.
    async fn token(&self, refresh: bool) -> Option<String>;
}
