//! Port definition for fetching device images.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::domain::entities::{ImageStatus, ResourceHandle};

/// Per-fetch parameters handed to the fetcher.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Cancelled when the cache no longer wants the result.
    pub cancel: CancellationToken,
    /// Upper bound for the whole request.
    pub timeout: Duration,
}

/// Outcome of a single image fetch.
#[derive(Debug)]
pub enum FetchResult {
    /// The image was fetched; the cache takes ownership of the handle.
    Ok(ResourceHandle),
    /// The server has no such image.
    NotFound,
    /// The tenant may not view the image.
    Forbidden,
    /// The credentials were rejected.
    Unauthorized,
    /// The request timed out.
    Timeout,
    /// The request was cancelled.
    Aborted,
    /// Any other failure.
    Error {
        /// Human readable detail.
        message: String,
    },
}

impl FetchResult {
    /// Creates an error result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Cache status this result settles into.
    #[must_use]
    pub const fn status(&self) -> ImageStatus {
        match self {
            Self::Ok(_) => ImageStatus::Loaded,
            Self::NotFound => ImageStatus::NotFound,
            Self::Forbidden => ImageStatus::Forbidden,
            Self::Unauthorized => ImageStatus::Unauthorized,
            Self::Timeout => ImageStatus::Timeout,
            Self::Aborted => ImageStatus::Aborted,
            Self::Error { .. } => ImageStatus::Error,
        }
    }
}

/// Port for fetching authenticated image resources.
///
/// Implementations own authentication, retries and timeouts. They should
/// return `Aborted` promptly once `options.cancel` fires, though the cache
/// does not rely on it.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetches the image at `url`.
    async fn fetch_image(&self, url: &str, options: FetchOptions) -> FetchResult;
}
