//! Domain error types.

mod fetcher_error;

pub use fetcher_error::FetcherError;
