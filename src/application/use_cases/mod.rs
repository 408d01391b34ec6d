//! Use case implementations.

mod fetch_images_use_case;
mod resolve_token_use_case;

pub use fetch_images_use_case::FetchImagesUseCase;
pub use resolve_token_use_case::{ResolveTokenUseCase, ResolvedToken};
