//! Domain types for device image caching.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tenant label used when a request carries no organization.
pub const UNSCOPED_TENANT_LABEL: &str = "no-org";

/// Identifier of a patchbay device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(pub u64);

impl DeviceId {
    /// Returns the raw identifier.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for DeviceId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Isolation scope under which cache keys are partitioned.
///
/// `Unscoped` is a distinct variant rather than a reserved string, so no real
/// tenant id can ever collide with it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum TenantKey {
    /// No organization was supplied.
    #[default]
    Unscoped,
    /// A concrete organization id.
    Tenant(String),
}

impl TenantKey {
    /// Normalizes an optional tenant id. Absent and empty ids are unscoped.
    #[must_use]
    pub fn from_option(tenant: Option<&str>) -> Self {
        match tenant {
            Some(id) if !id.is_empty() => Self::Tenant(id.to_string()),
            _ => Self::Unscoped,
        }
    }

    /// Returns the tenant id, or `None` when unscoped.
    #[must_use]
    pub fn as_tenant(&self) -> Option<&str> {
        match self {
            Self::Unscoped => None,
            Self::Tenant(id) => Some(id),
        }
    }
}

impl std::fmt::Display for TenantKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unscoped => write!(f, "{UNSCOPED_TENANT_LABEL}"),
            Self::Tenant(id) => write!(f, "{id}"),
        }
    }
}

impl From<Option<&str>> for TenantKey {
    fn from(tenant: Option<&str>) -> Self {
        Self::from_option(tenant)
    }
}

impl From<&str> for TenantKey {
    fn from(tenant: &str) -> Self {
        Self::from_option(Some(tenant))
    }
}

/// Key of a cached image: tenant, source URL and optional version stamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    tenant: TenantKey,
    image_url: String,
    image_version: Option<String>,
}

impl CacheKey {
    /// Builds the key for an image under a tenant.
    #[must_use]
    pub fn new(
        tenant: TenantKey,
        image_url: impl Into<String>,
        image_version: Option<String>,
    ) -> Self {
        Self {
            tenant,
            image_url: image_url.into(),
            image_version: image_version.filter(|v| !v.is_empty()),
        }
    }

    /// Returns the tenant part of the key.
    #[must_use]
    pub const fn tenant(&self) -> &TenantKey {
        &self.tenant
    }

    /// Returns the image URL part of the key.
    #[must_use]
    pub fn image_url(&self) -> &str {
        &self.image_url
    }

    /// Returns the version stamp, if any.
    #[must_use]
    pub fn image_version(&self) -> Option<&str> {
        self.image_version.as_deref()
    }

    /// Short stable digest of the key, used in logs instead of raw URLs.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(self.to_string().as_bytes());
        let result = hasher.finalize();
        hex::encode(&result[..8])
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.image_version {
            Some(version) => write!(f, "{}|{}|{}", self.tenant, self.image_url, version),
            None => write!(f, "{}|{}", self.tenant, self.image_url),
        }
    }
}

/// Reference to a device image as handed over by the UI layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceImageRef {
    /// Owning device, if known.
    #[serde(default)]
    pub id: Option<DeviceId>,
    /// Image URL. Items without one are ignored by the cache.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Opaque version stamp, e.g. the image's last-modified marker.
    #[serde(default)]
    pub image_version: Option<String>,
}

impl DeviceImageRef {
    /// Creates a reference to an image owned by a device.
    #[must_use]
    pub fn new(id: impl Into<DeviceId>, image_url: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            image_url: Some(image_url.into()),
            image_version: None,
        }
    }

    /// Creates a reference to an image with no owning device.
    #[must_use]
    pub fn anonymous(image_url: impl Into<String>) -> Self {
        Self {
            id: None,
            image_url: Some(image_url.into()),
            image_version: None,
        }
    }

    /// Sets the version stamp.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.image_version = Some(version.into());
        self
    }

    /// Returns the URL when it is present and non-empty.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.image_url.as_deref().filter(|url| !url.is_empty())
    }

    /// Computes the cache key under `tenant`, or `None` when there is no URL.
    #[must_use]
    pub fn cache_key(&self, tenant: &TenantKey) -> Option<CacheKey> {
        self.url()
            .map(|url| CacheKey::new(tenant.clone(), url, self.image_version.clone()))
    }
}

/// Status of a device image in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStatus {
    /// Nothing is known about the image.
    #[default]
    Idle,
    /// A fetch has been queued or is running.
    Loading,
    /// The image is available through its `src`.
    Loaded,
    /// The server has no such image.
    NotFound,
    /// The tenant may not view the image.
    Forbidden,
    /// The fetch timed out.
    Timeout,
    /// The credentials were rejected.
    Unauthorized,
    /// Any other failure.
    Error,
    /// The fetch was cancelled.
    Aborted,
}

impl ImageStatus {
    /// Returns true for statuses a settled fetch can end in.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Idle | Self::Loading)
    }

    /// Returns true if the image is ready for display.
    #[must_use]
    pub const fn is_loaded(self) -> bool {
        matches!(self, Self::Loaded)
    }

    /// Returns true for terminal failure statuses.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        self.is_terminal() && !self.is_loaded()
    }
}

impl std::fmt::Display for ImageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::NotFound => "not_found",
            Self::Forbidden => "forbidden",
            Self::Timeout => "timeout",
            Self::Unauthorized => "unauthorized",
            Self::Error => "error",
            Self::Aborted => "aborted",
        };
        f.pad(label)
    }
}

/// Read-only snapshot of a cached image.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ImageState {
    /// Current status.
    pub status: ImageStatus,
    /// Object URL of the image data; only set when loaded.
    pub src: Option<String>,
    /// Error detail for failed fetches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the entry was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
}

impl ImageState {
    /// The state reported for unknown images.
    #[must_use]
    pub fn idle() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_deterministic() {
        let item = DeviceImageRef::new(1, "/images/1.png").with_version("2025-01-01T00:00:00Z");
        let tenant = TenantKey::from("org-1");

        assert_eq!(item.cache_key(&tenant), item.cache_key(&tenant));
        assert_eq!(
            item.cache_key(&tenant).map(|k| k.to_string()),
            Some("org-1|/images/1.png|2025-01-01T00:00:00Z".to_string())
        );
    }

    #[test]
    fn test_version_change_yields_new_key() {
        let tenant = TenantKey::Unscoped;
        let old = DeviceImageRef::new(1, "/images/1.png").with_version("v1");
        let new = DeviceImageRef::new(1, "/images/1.png").with_version("v2");

        assert_ne!(old.cache_key(&tenant), new.cache_key(&tenant));
    }

    #[test]
    fn test_unscoped_never_equals_real_tenant() {
        let item = DeviceImageRef::anonymous("/a.png");
        let unscoped = item.cache_key(&TenantKey::from_option(None));
        let named = item.cache_key(&TenantKey::from(UNSCOPED_TENANT_LABEL));

        assert_ne!(unscoped, named);
        assert_eq!(TenantKey::from_option(Some("")), TenantKey::Unscoped);
    }

    #[test]
    fn test_missing_url_has_no_key() {
        let item = DeviceImageRef {
            id: Some(DeviceId(3)),
            image_url: Some(String::new()),
            image_version: None,
        };
        assert!(item.cache_key(&TenantKey::Unscoped).is_none());
        assert!(DeviceImageRef::default().url().is_none());
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let key = CacheKey::new(TenantKey::from("org-1"), "/x.png", None);
        assert_eq!(key.fingerprint(), key.clone().fingerprint());
        assert_eq!(key.fingerprint().len(), 16);
    }

    #[test]
    fn test_status_classification() {
        assert!(!ImageStatus::Loading.is_terminal());
        assert!(ImageStatus::Loaded.is_terminal());
        assert!(ImageStatus::Forbidden.is_failure());
        assert!(!ImageStatus::Loaded.is_failure());
        assert_eq!(ImageStatus::NotFound.to_string(), "not_found");
    }
}
