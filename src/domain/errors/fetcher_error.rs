//! Image fetcher construction errors.

use thiserror::Error;

/// Errors raised while building an image fetcher.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum FetcherError {
    #[error("invalid API base URL {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("failed to create HTTP client: {message}")]
    ClientBuild { message: String },
}

impl FetcherError {
    /// Creates invalid base URL error.
    #[must_use]
    pub fn invalid_base_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidBaseUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates client build error.
    #[must_use]
    pub fn client_build(message: impl Into<String>) -> Self {
        Self::ClientBuild {
            message: message.into(),
        }
    }
}
