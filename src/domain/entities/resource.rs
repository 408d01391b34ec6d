//! Revocable handles to fetched image data.

use bytes::Bytes;

type ReleaseHook = Box<dyn FnOnce(&str) + Send>;

/// A locally owned, revocable reference to fetched binary data.
///
/// The release hook runs exactly once, when the handle is dropped. Whoever
/// owns the handle decides when the underlying object URL stops resolving;
/// the image cache never hands handles out, only their `src` strings.
pub struct ResourceHandle {
    src: String,
    data: Bytes,
    content_type: Option<String>,
    on_release: Option<ReleaseHook>,
}

impl ResourceHandle {
    /// Creates a handle with no release hook.
    #[must_use]
    pub fn new(src: impl Into<String>, data: Bytes) -> Self {
        Self {
            src: src.into(),
            data,
            content_type: None,
            on_release: None,
        }
    }

    /// Creates a handle whose release hook receives the `src` on drop.
    #[must_use]
    pub fn with_release(
        src: impl Into<String>,
        data: Bytes,
        on_release: impl FnOnce(&str) + Send + 'static,
    ) -> Self {
        Self {
            src: src.into(),
            data,
            content_type: None,
            on_release: Some(Box::new(on_release)),
        }
    }

    /// Sets the content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Returns the object URL.
    #[must_use]
    pub fn src(&self) -> &str {
        &self.src
    }

    /// Returns the image bytes.
    #[must_use]
    pub const fn data(&self) -> &Bytes {
        &self.data
    }

    /// Returns the content type, if known.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Releases the handle now.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for ResourceHandle {
    fn drop(&mut self) {
        if let Some(hook) = self.on_release.take() {
            hook(&self.src);
        }
    }
}

impl std::fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("src", &self.src)
            .field("len", &self.data.len())
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}
