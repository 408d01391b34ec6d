//! Token provider adapters.

mod static_token;

pub use static_token::{StaticTokenProvider, TOKEN_ENV_VAR};
