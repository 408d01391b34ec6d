//! In-process object URL registry.
//!
//! Mints `blob:` URLs for fetched image bytes, much like a browser's
//! `URL.createObjectURL`. A URL resolves until its handle is released.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::trace;
use uuid::Uuid;

use crate::domain::entities::ResourceHandle;

/// Scheme prefix of every minted URL.
pub const OBJECT_URL_PREFIX: &str = "blob:patchbay/";

/// Data behind an object URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectData {
    /// Image bytes.
    pub bytes: Bytes,
    /// Content type reported by the server.
    pub content_type: Option<String>,
}

/// Registry of live object URLs. Cloning shares the registry.
#[derive(Debug, Clone, Default)]
pub struct ObjectUrlRegistry {
    objects: Arc<RwLock<HashMap<String, ObjectData>>>,
}

impl ObjectUrlRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `bytes` and returns the owning handle.
    /// Dropping the handle revokes the URL.
    #[must_use]
    pub fn create(&self, bytes: Bytes, content_type: Option<String>) -> ResourceHandle {
        let src = format!("{OBJECT_URL_PREFIX}{}", Uuid::new_v4());
        self.objects.write().insert(
            src.clone(),
            ObjectData {
                bytes: bytes.clone(),
                content_type: content_type.clone(),
            },
        );
        trace!(src = %src, len = bytes.len(), "Created object URL");

        let objects = Arc::downgrade(&self.objects);
        let handle = ResourceHandle::with_release(src, bytes, move |src| {
            if let Some(objects) = objects.upgrade() {
                if objects.write().remove(src).is_some() {
                    trace!(src = %src, "Revoked object URL");
                }
            }
        });

        match content_type {
            Some(ct) => handle.with_content_type(ct),
            None => handle,
        }
    }

    /// Looks up the data behind a live URL.
    #[must_use]
    pub fn resolve(&self, src: &str) -> Option<ObjectData> {
        self.objects.read().get(src).cloned()
    }

    /// Returns true if `src` is still live.
    #[must_use]
    pub fn contains(&self, src: &str) -> bool {
        self.objects.read().contains_key(src)
    }

    /// Number of live URLs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Returns true if no URL is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_resolve() {
        let registry = ObjectUrlRegistry::new();
        let handle = registry.create(Bytes::from_static(b"\x89PNG"), Some("image/png".into()));

        assert!(handle.src().starts_with(OBJECT_URL_PREFIX));
        let data = registry.resolve(handle.src()).expect("live url");
        assert_eq!(data.bytes.as_ref(), b"\x89PNG");
        assert_eq!(data.content_type.as_deref(), Some("image/png"));
        assert_eq!(handle.content_type(), Some("image/png"));
    }

    #[test]
    fn test_drop_revokes() {
        let registry = ObjectUrlRegistry::new();
        let handle = registry.create(Bytes::from_static(b"a"), None);
        let src = handle.src().to_string();

        assert!(registry.contains(&src));
        drop(handle);
        assert!(!registry.contains(&src));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_urls_are_unique() {
        let registry = ObjectUrlRegistry::new();
        let a = registry.create(Bytes::from_static(b"a"), None);
        let b = registry.create(Bytes::from_static(b"a"), None);

        assert_ne!(a.src(), b.src());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_handle_outliving_registry_is_harmless() {
        let registry = ObjectUrlRegistry::new();
        let handle = registry.create(Bytes::from_static(b"a"), None);
        drop(registry);
        drop(handle);
    }
}
