//! Batch image fetch use case.

use futures_util::future::join_all;
use tracing::info;

use crate::application::dto::{FetchReport, ImageReport};
use crate::domain::entities::{DeviceImageRef, TenantKey};
use crate::infrastructure::image::{
    DeviceImageCache, PendingLoad, PrefetchOptions, Priority, RequestOptions,
};

/// Fetches a batch of device images through the cache and reports their states.
#[derive(Debug, Clone)]
pub struct FetchImagesUseCase {
    cache: DeviceImageCache,
}

impl FetchImagesUseCase {
    /// Creates new use case.
    #[must_use]
    pub const fn new(cache: DeviceImageCache) -> Self {
        Self { cache }
    }

    /// Fetches every item with a URL and waits for all of them to settle.
    ///
    /// Low priority runs as a prefetch, high priority as individual requests.
    pub async fn execute(
        &self,
        items: &[DeviceImageRef],
        tenant: Option<&str>,
        priority: Priority,
    ) -> FetchReport {
        match priority {
            Priority::Low => {
                self.cache
                    .prefetch(items, tenant, PrefetchOptions::default())
                    .await;
            }
            Priority::High => {
                let pending: Vec<PendingLoad> = items
                    .iter()
                    .map(|item| self.cache.request(item, tenant, RequestOptions { priority }))
                    .collect();
                join_all(pending.into_iter().map(PendingLoad::wait)).await;
            }
        }

        let images: Vec<ImageReport> = items
            .iter()
            .filter_map(|item| {
                item.url().map(|url| ImageReport {
                    device_id: item.id,
                    url: url.to_string(),
                    version: item.image_version.clone(),
                    state: self.cache.get_state(item, tenant),
                })
            })
            .collect();

        let report = FetchReport {
            tenant: TenantKey::from_option(tenant).to_string(),
            images,
            stats: self.cache.stats(),
        };
        info!(
            requested = report.images.len(),
            loaded = report.loaded(),
            "Image batch settled"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use bytes::Bytes;

    use crate::domain::entities::{ImageStatus, ResourceHandle};
    use crate::domain::ports::FetchResult;
    use crate::domain::ports::mocks::MockImageFetcher;

    fn use_case(mock: MockImageFetcher) -> FetchImagesUseCase {
        FetchImagesUseCase::new(DeviceImageCache::with_defaults(Arc::new(mock)))
    }

    #[tokio::test]
    async fn test_reports_every_item_with_url() {
        let mut mock = MockImageFetcher::new();
        mock.expect_fetch_image()
            .withf(|url, _| url == "/images/1.png")
            .times(1)
            .returning(|_, _| FetchResult::Ok(ResourceHandle::new("blob:mock-1", Bytes::new())));
        mock.expect_fetch_image()
            .withf(|url, _| url == "/images/2.png")
            .times(1)
            .returning(|_, _| FetchResult::NotFound);

        let items = vec![
            DeviceImageRef::new(1, "/images/1.png"),
            DeviceImageRef::new(2, "/images/2.png"),
            DeviceImageRef::default(),
        ];
        let report = use_case(mock)
            .execute(&items, Some("org-1"), Priority::Low)
            .await;

        assert_eq!(report.tenant, "org-1");
        assert_eq!(report.images.len(), 2);
        assert_eq!(report.images[0].state.status, ImageStatus::Loaded);
        assert_eq!(report.images[1].state.status, ImageStatus::NotFound);
        assert_eq!(report.loaded(), 1);
        assert_eq!(report.stats.loads, 2);
    }

    #[tokio::test]
    async fn test_high_priority_shares_duplicate_items() {
        let mut mock = MockImageFetcher::new();
        mock.expect_fetch_image()
            .times(1)
            .returning(|_, _| FetchResult::Ok(ResourceHandle::new("blob:mock-1", Bytes::new())));

        let item = DeviceImageRef::new(1, "/images/1.png");
        let report = use_case(mock)
            .execute(&[item.clone(), item], None, Priority::High)
            .await;

        assert_eq!(report.tenant, "no-org");
        assert_eq!(report.loaded(), 2);
        assert_eq!(report.stats.cache_misses, 1);
    }
}
