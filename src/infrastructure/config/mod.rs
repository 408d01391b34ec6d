//! Application configuration.

pub mod app_config;
pub mod args;
pub mod storage;

pub use app_config::{AppConfig, CacheConfig, HttpConfig, LogLevel};
pub use args::{CliArgs, parse_image_arg};
pub use storage::{ConfigError, ConfigStore};
