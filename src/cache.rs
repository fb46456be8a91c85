//! Image list caches with TTL expiration
//!
//! Two records live in the key/value store:
//! - `github_images_cache`: `{images, timestamp}`, fresh for 24 hours
//! - `local_images_cache`: `{version, timestamp, images}`, valid while the
//!   version matches exactly; an outdated version invalidates both records
//!
//! Unreadable or malformed records are treated as a miss.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

use crate::clock::Clock;
use crate::error::AppError;
use crate::store::KeyValueStore;

/// Store key for the remote image list
pub const REMOTE_IMAGES_KEY: &str = "github_images_cache";

/// Store key for the last local image list
pub const LOCAL_IMAGES_KEY: &str = "local_images_cache";

/// Bump when local image paths change
pub const LOCAL_IMAGES_VERSION: &str = "1.0";

/// A cached image list with the time it was written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedImageSet {
    pub images: Vec<String>,
    /// Epoch milliseconds
    pub timestamp: i64,
}

/// Versioned image list record
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VersionedImageSet {
    version: String,
    timestamp: i64,
    images: Vec<String>,
}

/// Result of looking up a versioned entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionedLookup {
    Current(Vec<String>),
    /// Written by another version; holds that version
    Outdated(String),
    Absent,
}

/// Age report for a cache entry
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CacheInfo {
    pub age_minutes: i64,
    pub expires_in_minutes: i64,
    pub image_count: usize,
    /// Present but past the TTL
    pub expired: bool,
}

/// Image list cache with a fixed expiry window
pub struct TtlCache {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl TtlCache {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { store, clock, ttl }
    }

    fn ttl_millis(&self) -> i64 {
        i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX)
    }

    async fn load(&self, key: &str) -> Option<CachedImageSet> {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Failed to read cache key {}: {}", key, e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::debug!("Ignoring malformed cache entry {}: {}", key, e);
                None
            }
        }
    }

    /// Get the cached list if present and not expired
    pub async fn read(&self, key: &str) -> Option<Vec<String>> {
        let record = self.load(key).await?;
        let age = self.clock.now_millis() - record.timestamp;
        if age >= self.ttl_millis() {
            tracing::debug!("Cache entry {} expired", key);
            return None;
        }
        Some(record.images)
    }

    /// Store a list stamped with the current time
    pub async fn write(&self, key: &str, images: &[String]) -> Result<(), AppError> {
        let record = CachedImageSet {
            images: images.to_vec(),
            timestamp: self.clock.now_millis(),
        };
        let json = serde_json::to_string(&record).map_err(|e| AppError::Store(e.to_string()))?;
        self.store.set(key, json).await
    }

    pub async fn info(&self, key: &str) -> Option<CacheInfo> {
        let record = self.load(key).await?;
        let age = self.clock.now_millis() - record.timestamp;
        Some(CacheInfo {
            age_minutes: millis_to_minutes(age),
            expires_in_minutes: millis_to_minutes(self.ttl_millis() - age),
            image_count: record.images.len(),
            expired: age >= self.ttl_millis(),
        })
    }

    pub async fn clear(&self, key: &str) -> Result<(), AppError> {
        self.store.remove(key).await
    }
}

/// Image list cache that is valid only for one exact version
pub struct VersionedCache {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    version: String,
}

impl VersionedCache {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, version: &str) -> Self {
        Self {
            store,
            clock,
            version: version.to_string(),
        }
    }

    /// Look up the record, checking its version
    pub async fn lookup(&self, key: &str) -> VersionedLookup {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return VersionedLookup::Absent,
            Err(e) => {
                tracing::warn!("Failed to read cache key {}: {}", key, e);
                return VersionedLookup::Absent;
            }
        };

        let record: VersionedImageSet = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!("Ignoring malformed cache entry {}: {}", key, e);
                return VersionedLookup::Absent;
            }
        };

        if record.version != self.version {
            return VersionedLookup::Outdated(record.version);
        }
        VersionedLookup::Current(record.images)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub async fn write(&self, key: &str, images: &[String]) -> Result<(), AppError> {
        let record = VersionedImageSet {
            version: self.version.clone(),
            timestamp: self.clock.now_millis(),
            images: images.to_vec(),
        };
        let json = serde_json::to_string(&record).map_err(|e| AppError::Store(e.to_string()))?;
        self.store.set(key, json).await
    }

    pub async fn clear(&self, key: &str) -> Result<(), AppError> {
        self.store.remove(key).await
    }
}

fn millis_to_minutes(millis: i64) -> i64 {
    (millis as f64 / 60_000.0).round() as i64
}
