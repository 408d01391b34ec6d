//! Report DTOs printed by the CLI.

use serde::Serialize;

use crate::domain::entities::{DeviceId, ImageState};
use crate::infrastructure::image::CacheStats;

/// Final state of one requested image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageReport {
    /// Owning device, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<DeviceId>,
    /// Requested image URL.
    pub url: String,
    /// Requested version stamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Cache snapshot after the fetch settled.
    pub state: ImageState,
}

/// Outcome of a batch fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchReport {
    /// Tenant label the batch ran under.
    pub tenant: String,
    /// One row per requested image with a URL.
    pub images: Vec<ImageReport>,
    /// Cache statistics after the batch.
    pub stats: CacheStats,
}

impl FetchReport {
    /// Number of images that ended `Loaded`.
    #[must_use]
    pub fn loaded(&self) -> usize {
        self.images
            .iter()
            .filter(|image| image.state.status.is_loaded())
            .count()
    }
}

impl std::fmt::Display for FetchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "tenant: {}", self.tenant)?;
        for image in &self.images {
            let device = image
                .device_id
                .map_or_else(|| "-".to_string(), |id| id.to_string());
            let detail = image
                .state
                .src
                .as_deref()
                .or(image.state.error.as_deref())
                .unwrap_or("");
            writeln!(
                f,
                "{device:>8}  {:<12}  {}{}  {detail}",
                image.state.status,
                image.url,
                image
                    .version
                    .as_deref()
                    .map_or_else(String::new, |v| format!("@{v}")),
            )?;
        }
        write!(f, "{}", self.stats)
    }
}
