mod image_fetch_port;
mod token_provider_port;

pub use image_fetch_port::{FetchOptions, FetchResult, ImageFetcher};
pub use token_provider_port::TokenProvider;

#[cfg(test)]
pub mod mocks {
    pub use super::image_fetch_port::MockImageFetcher;
    pub use super::token_provider_port::mock::MockTokenProvider;
}
