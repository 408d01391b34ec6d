use std::path::PathBuf;

use clap::Parser;

use super::app_config::LogLevel;
use crate::domain::entities::{DeviceId, DeviceImageRef};
use crate::infrastructure::image::Priority;

#[derive(Debug, Parser)]
#[command(
    name = "patchbay-images",
    version,
    about = "Fetch patchbay device images through the tenant-scoped image cache",
    long_about = None
)]
pub struct CliArgs {
    /// Configuration file path.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Organization the images belong to.
    #[arg(short, long, env = "PATCHBAY_ORG_ID")]
    pub tenant: Option<String>,

    /// API token. Falls back to `PATCHBAY_API_TOKEN`, then the config file.
    #[arg(long, value_name = "TOKEN")]
    pub token: Option<String>,

    /// API base URL for relative image paths.
    #[arg(long, env = "PATCHBAY_API_URL", value_name = "URL")]
    pub base_url: Option<String>,

    /// Maximum cached entries.
    #[arg(long)]
    pub max_entries: Option<usize>,

    /// Maximum concurrent fetches.
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Per-request timeout in seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Queue priority for the fetches.
    #[arg(long, value_enum, default_value_t = Priority::Low)]
    pub priority: Priority,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Images as `[device-id=]url[@version]`.
    #[arg(value_name = "IMAGE", value_parser = parse_image_arg)]
    pub images: Vec<DeviceImageRef>,
}

/// Parses `[device-id=]url[@version]`.
///
/// The version marker is the last `@` after the last `/`, so userinfo in
/// absolute URLs is left alone.
///
/// # Errors
/// Returns a message if the URL part is empty.
pub fn parse_image_arg(raw: &str) -> Result<DeviceImageRef, String> {
    let (id, rest) = match raw.split_once('=') {
        Some((id, rest)) => match id.parse::<u64>() {
            Ok(id) => (Some(DeviceId(id)), rest),
            Err(_) => (None, raw),
        },
        None => (None, raw),
    };

    let path_start = rest.rfind('/').map_or(0, |i| i + 1);
    let (url, version) = match rest[path_start..].rfind('@') {
        Some(at) => {
            let at = path_start + at;
            (&rest[..at], Some(&rest[at + 1..]))
        }
        None => (rest, None),
    };

    if url.is_empty() {
        return Err(format!("missing image URL in {raw:?}"));
    }

    let mut item = DeviceImageRef {
        id,
        image_url: Some(url.to_string()),
        image_version: None,
    };
    if let Some(version) = version.filter(|v| !v.is_empty()) {
        item = item.with_version(version);
    }
    Ok(item)
}
