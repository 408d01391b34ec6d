//! Data transfer objects for the application layer.

mod image_report;
mod token_source;

pub use image_report::{FetchReport, ImageReport};
pub use token_source::TokenSource;
