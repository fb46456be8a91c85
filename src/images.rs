//! Slideshow image source resolution
//!
//! Picks the image list in strict priority order:
//! 1. fresh remote-list cache
//! 2. remote listing (refreshes the cache)
//! 3. the built-in fallback list (also written to the local cache)
//!
//! Listing errors count as zero results and fall through to the next tier.
//! A local cache record from another version invalidates both caches
//! before anything is read.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::cache::{
    CacheInfo, TtlCache, VersionedCache, VersionedLookup, LOCAL_IMAGES_KEY, REMOTE_IMAGES_KEY,
};
use crate::config::SignageConfig;
use crate::error::AppError;

/// Built-in slideshow images, relative to the slideshow folder
const FALLBACK_IMAGES: &[&str] = &[
    "coat-drive.jpg",
    "imams-schedule.png",
    "membership drive.jpg",
    "Untitled design - Kehkeshan Shah-COLLAGE.jpg",
    "Untitled design-4 - Aalaa Alshareef-COLLAGE.jpg",
    "winter-fundraiser.jpg",
];

/// An image found by a remote listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteImage {
    pub id: String,
    pub name: String,
    pub url: String,
}

/// A remote source of slideshow images
#[async_trait]
pub trait ImageListing: Send + Sync {
    async fn list_images(&self) -> Result<Vec<RemoteImage>, AppError>;
}

/// Where the current image list came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ImageOrigin {
    Cache,
    Remote,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImages {
    pub urls: Vec<String>,
    pub origin: ImageOrigin,
}

/// Built-in fallback list with paths under the configured base path
pub fn fallback_images(config: &SignageConfig) -> Vec<String> {
    FALLBACK_IMAGES
        .iter()
        .map(|name| config.slideshow_image_path(name))
        .collect()
}

pub struct ImageResolver {
    listing: Arc<dyn ImageListing>,
    remote_cache: TtlCache,
    local_cache: VersionedCache,
    fallback: Vec<String>,
}

impl ImageResolver {
    pub fn new(
        listing: Arc<dyn ImageListing>,
        remote_cache: TtlCache,
        local_cache: VersionedCache,
        fallback: Vec<String>,
    ) -> Self {
        Self {
            listing,
            remote_cache,
            local_cache,
            fallback,
        }
    }

    /// List remote images, treating any error as zero results
    async fn list_remote(&self) -> Vec<String> {
        match self.listing.list_images().await {
            Ok(images) => images
                .into_iter()
                .map(|img| {
                    tracing::debug!("Remote image {} ({})", img.name, img.id);
                    img.url
                })
                .collect(),
            Err(e) => {
                tracing::warn!("Remote image listing failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn store_remote(&self, urls: &[String]) {
        if let Err(e) = self.remote_cache.write(REMOTE_IMAGES_KEY, urls).await {
            tracing::warn!("Failed to cache remote images: {}", e);
        }
        if let Err(e) = self.local_cache.write(LOCAL_IMAGES_KEY, urls).await {
            tracing::warn!("Failed to cache local images: {}", e);
        }
    }

    /// Drop both caches when the local record was written by another version
    async fn check_local_version(&self) {
        match self.local_cache.lookup(LOCAL_IMAGES_KEY).await {
            VersionedLookup::Outdated(found) => {
                tracing::info!(
                    "Local image cache version {} does not match {}, clearing",
                    found,
                    self.local_cache.version()
                );
                if let Err(e) = self.clear().await {
                    tracing::warn!("Failed to clear outdated image cache: {}", e);
                }
            }
            VersionedLookup::Current(urls) => {
                tracing::debug!("Local image cache holds {} images", urls.len());
            }
            VersionedLookup::Absent => {}
        }
    }

    pub async fn resolve(&self) -> ResolvedImages {
        self.check_local_version().await;

        if let Some(urls) = self.remote_cache.read(REMOTE_IMAGES_KEY).await {
            if !urls.is_empty() {
                tracing::info!("Using {} cached remote images", urls.len());
                return ResolvedImages {
                    urls,
                    origin: ImageOrigin::Cache,
                };
            }
        }

        let urls = self.list_remote().await;
        if !urls.is_empty() {
            tracing::info!("Using {} images from remote listing", urls.len());
            self.store_remote(&urls).await;
            return ResolvedImages {
                urls,
                origin: ImageOrigin::Remote,
            };
        }

        tracing::info!("Using {} fallback images", self.fallback.len());
        if let Err(e) = self.local_cache.write(LOCAL_IMAGES_KEY, &self.fallback).await {
            tracing::warn!("Failed to cache fallback images: {}", e);
        }
        ResolvedImages {
            urls: self.fallback.clone(),
            origin: ImageOrigin::Fallback,
        }
    }

    /// Re-list remote images, bypassing the cache
    ///
    /// Returns the new list only when the listing found images; the caches
    /// are left untouched otherwise.
    pub async fn refresh(&self) -> Option<Vec<String>> {
        let urls = self.list_remote().await;
        if urls.is_empty() {
            tracing::info!("No fresh images found, keeping current set");
            return None;
        }
        self.store_remote(&urls).await;
        Some(urls)
    }

    /// Drop both cached lists
    pub async fn clear(&self) -> Result<(), AppError> {
        self.remote_cache.clear(REMOTE_IMAGES_KEY).await?;
        self.local_cache.clear(LOCAL_IMAGES_KEY).await?;
        tracing::info!("Image cache cleared");
        Ok(())
    }

    pub async fn cache_info(&self) -> Option<CacheInfo> {
        self.remote_cache.info(REMOTE_IMAGES_KEY).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::LOCAL_IMAGES_VERSION;
    use crate::clock::ManualClock;
    use crate::store::{KeyValueStore, MemoryStore};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Listing that replays a queue of canned responses
    pub struct FakeListing {
        responses: Mutex<Vec<Result<Vec<RemoteImage>, AppError>>>,
        pub calls: AtomicUsize,
    }

    impl FakeListing {
        pub fn new(responses: Vec<Result<Vec<RemoteImage>, AppError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ImageListing for FakeListing {
        async fn list_images(&self) -> Result<Vec<RemoteImage>, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(Vec::new())
            } else {
                responses.remove(0)
            }
        }
    }

    pub fn remote(names: &[&str]) -> Vec<RemoteImage> {
        names
            .iter()
            .map(|name| RemoteImage {
                id: format!("sha-{}", name),
                name: name.to_string(),
                url: format!("https://raw.example.com/{}", name),
            })
            .collect()
    }

    pub fn resolver_with(
        listing: Arc<FakeListing>,
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
    ) -> ImageResolver {
        ImageResolver::new(
            listing,
            TtlCache::new(store.clone(), clock.clone(), Duration::from_secs(86400)),
            VersionedCache::new(store, clock, LOCAL_IMAGES_VERSION),
            vec!["/assets/images/slideshow/fallback.jpg".to_string()],
        )
    }

    #[tokio::test]
    async fn test_remote_then_cache() {
        let listing = Arc::new(FakeListing::new(vec![Ok(remote(&["a.jpg", "b.jpg"]))]));
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(0));
        let resolver = resolver_with(listing.clone(), store, clock);

        let first = resolver.resolve().await;
        assert_eq!(first.origin, ImageOrigin::Remote);
        assert_eq!(first.urls.len(), 2);

        let second = resolver.resolve().await;
        assert_eq!(second.origin, ImageOrigin::Cache);
        assert_eq!(second.urls, first.urls);
        assert_eq!(listing.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_cache_refetches() {
        let listing = Arc::new(FakeListing::new(vec![
            Ok(remote(&["a.jpg"])),
            Ok(remote(&["b.jpg"])),
        ]));
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(0));
        let resolver = resolver_with(listing.clone(), store, clock.clone());

        resolver.resolve().await;
        clock.advance(86_400_000);

        let resolved = resolver.resolve().await;
        assert_eq!(resolved.origin, ImageOrigin::Remote);
        assert_eq!(resolved.urls, vec!["https://raw.example.com/b.jpg"]);
    }

    #[tokio::test]
    async fn test_listing_error_falls_back_and_caches() {
        let listing = Arc::new(FakeListing::new(vec![Err(AppError::ExternalApi(
            "500".to_string(),
        ))]));
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(0));
        let resolver = resolver_with(listing, store.clone(), clock);

        let resolved = resolver.resolve().await;
        assert_eq!(resolved.origin, ImageOrigin::Fallback);
        assert_eq!(resolved.urls, vec!["/assets/images/slideshow/fallback.jpg"]);

        let raw = store.get(LOCAL_IMAGES_KEY).await.unwrap().unwrap();
        assert!(raw.contains("fallback.jpg"));
        assert!(raw.contains("\"version\":\"1.0\""));
    }

    #[tokio::test]
    async fn test_expired_cache_and_failed_listing_use_fallback() {
        let listing = Arc::new(FakeListing::new(vec![
            Ok(remote(&["a.jpg"])),
            Err(AppError::ExternalApi("503".to_string())),
        ]));
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(0));
        let resolver = resolver_with(listing, store.clone(), clock.clone());

        resolver.resolve().await;
        clock.advance(2 * 86_400_000);

        let resolved = resolver.resolve().await;
        assert_eq!(resolved.origin, ImageOrigin::Fallback);
        assert_eq!(resolved.urls, vec!["/assets/images/slideshow/fallback.jpg"]);

        let raw = store.get(LOCAL_IMAGES_KEY).await.unwrap().unwrap();
        assert!(raw.contains("fallback.jpg"));
    }

    #[tokio::test]
    async fn test_outdated_local_version_clears_both_caches() {
        let listing = Arc::new(FakeListing::new(vec![Ok(remote(&["new.jpg"]))]));
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(0));

        // A fresh remote list next to a local record from an older version
        TtlCache::new(store.clone(), clock.clone(), Duration::from_secs(86400))
            .write(REMOTE_IMAGES_KEY, &["https://raw.example.com/old.jpg".to_string()])
            .await
            .unwrap();
        VersionedCache::new(store.clone(), clock.clone(), "0.9")
            .write(LOCAL_IMAGES_KEY, &["old.jpg".to_string()])
            .await
            .unwrap();

        let resolver = resolver_with(listing.clone(), store.clone(), clock);
        let resolved = resolver.resolve().await;

        assert_eq!(resolved.origin, ImageOrigin::Remote);
        assert_eq!(resolved.urls, vec!["https://raw.example.com/new.jpg"]);
        assert_eq!(listing.calls.load(Ordering::SeqCst), 1);

        let raw = store.get(LOCAL_IMAGES_KEY).await.unwrap().unwrap();
        assert!(raw.contains("\"version\":\"1.0\""));
        assert!(raw.contains("new.jpg"));
    }

    #[tokio::test]
    async fn test_empty_cached_list_is_skipped() {
        let listing = Arc::new(FakeListing::new(vec![Ok(remote(&["a.jpg"]))]));
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(0));
        store
            .set(REMOTE_IMAGES_KEY, "{\"images\":[],\"timestamp\":0}".to_string())
            .await
            .unwrap();
        let resolver = resolver_with(listing, store, clock);

        assert_eq!(resolver.resolve().await.origin, ImageOrigin::Remote);
    }

    #[tokio::test]
    async fn test_refresh_keeps_cache_when_empty() {
        let listing = Arc::new(FakeListing::new(vec![
            Ok(remote(&["a.jpg"])),
            Err(AppError::ExternalApi("down".to_string())),
            Ok(remote(&["a.jpg", "new.jpg"])),
        ]));
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(0));
        let resolver = resolver_with(listing, store, clock);

        resolver.resolve().await;
        assert_eq!(resolver.refresh().await, None);
        assert_eq!(resolver.cache_info().await.unwrap().image_count, 1);

        let refreshed = resolver.refresh().await.unwrap();
        assert_eq!(refreshed.len(), 2);
        assert_eq!(resolver.cache_info().await.unwrap().image_count, 2);
    }

    #[tokio::test]
    async fn test_clear_removes_both_keys() {
        let listing = Arc::new(FakeListing::new(vec![Ok(remote(&["a.jpg"]))]));
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(0));
        let resolver = resolver_with(listing, store.clone(), clock);

        resolver.resolve().await;
        resolver.clear().await.unwrap();
        assert_eq!(store.get(REMOTE_IMAGES_KEY).await.unwrap(), None);
        assert_eq!(store.get(LOCAL_IMAGES_KEY).await.unwrap(), None);
        assert!(resolver.cache_info().await.is_none());
    }

    #[test]
    fn test_fallback_images_use_base_path() {
        let config = SignageConfig {
            base_path: "/chromecast_stream/".to_string(),
            ..SignageConfig::default()
        };
        let images = fallback_images(&config);
        assert_eq!(images.len(), 6);
        assert_eq!(images[0], "/chromecast_stream/images/slideshow/coat-drive.jpg");
    }
}
