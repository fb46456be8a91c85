//! Signage session state and its background runtime
//!
//! All mutable display state lives here and is passed explicitly to the
//! slideshow driver and the other components. `initialize` builds the
//! state from scratch; it runs at startup and again at every local
//! midnight.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use utoipa::ToSchema;

use crate::ayat::{AyatView, RotatingText};
use crate::cache::CacheInfo;
use crate::clock::Clock;
use crate::config::SignageConfig;
use crate::error::AppError;
use crate::images::ImageResolver;
use crate::prayer::{fallback_board, PrayerBoard, PrayerTimesFetcher};
use crate::probe::ImageProbe;
use crate::qr::{self, QrTile, QR_ENTRIES};
use crate::scheduler::{self, TaskHandle};
use crate::slideshow::{SlideshowDriver, SlideshowState};

/// Everything the display renders
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SignageSnapshot {
    pub slideshow: SlideshowState,
    pub ayat: Option<AyatView>,
    pub prayer_times: PrayerBoard,
    pub qr_codes: Vec<QrTile>,
    /// Epoch milliseconds of the last full initialization
    pub initialized_at: Option<i64>,
}

pub struct SignageSession {
    base_path: String,
    slideshow_driver: SlideshowDriver,
    resolver: Arc<ImageResolver>,
    prayer_fetcher: PrayerTimesFetcher,
    probe: Arc<dyn ImageProbe>,
    clock: Arc<dyn Clock>,
    slideshow: RwLock<SlideshowState>,
    ayat: RwLock<RotatingText>,
    prayer_times: RwLock<PrayerBoard>,
    qr_tiles: RwLock<Vec<QrTile>>,
    initialized_at: RwLock<Option<i64>>,
}

impl SignageSession {
    pub fn new(
        config: &SignageConfig,
        resolver: Arc<ImageResolver>,
        probe: Arc<dyn ImageProbe>,
        prayer_fetcher: PrayerTimesFetcher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let slideshow_driver = SlideshowDriver::new(
            resolver.clone(),
            probe.clone(),
            config.fade_delay,
            config.refresh_after_rotation,
        );

        Self {
            base_path: config.base_path.clone(),
            slideshow_driver,
            resolver,
            prayer_fetcher,
            probe,
            clock,
            slideshow: RwLock::new(SlideshowState::new()),
            ayat: RwLock::new(RotatingText::default()),
            prayer_times: RwLock::new(fallback_board(&config.prayer)),
            qr_tiles: RwLock::new(Vec::new()),
            initialized_at: RwLock::new(None),
        }
    }

    /// Build all display state from scratch
    pub async fn initialize(&self) {
        tracing::info!("Initializing signage session");

        self.ayat.write().await.reset();
        tokio::join!(
            self.slideshow_driver.initialize(&self.slideshow),
            self.load_prayer_times(),
            self.render_qr_codes(),
        );

        *self.initialized_at.write().await = Some(self.clock.now_millis());
        tracing::info!("Signage session initialized");
    }

    async fn load_prayer_times(&self) {
        let board = self.prayer_fetcher.fetch().await;
        *self.prayer_times.write().await = board;
    }

    async fn render_qr_codes(&self) {
        let tiles = qr::render_all(self.probe.clone(), QR_ENTRIES, &self.base_path).await;
        *self.qr_tiles.write().await = tiles;
    }

    pub async fn next_slide(&self) {
        self.slideshow_driver.tick(&self.slideshow).await;
    }

    pub async fn next_ayat(&self) {
        if let Some(view) = self.ayat.write().await.advance() {
            tracing::debug!("Showing ayat {}", view.index + 1);
        }
    }

    /// Re-list remote images now; returns the new image count
    pub async fn force_refresh_images(&self) -> Option<usize> {
        self.slideshow_driver.force_refresh(&self.slideshow).await
    }

    pub async fn clear_image_cache(&self) -> Result<(), AppError> {
        self.resolver.clear().await
    }

    pub async fn image_cache_info(&self) -> Option<CacheInfo> {
        self.resolver.cache_info().await
    }

    pub async fn slideshow(&self) -> SlideshowState {
        self.slideshow.read().await.clone()
    }

    pub async fn ayat(&self) -> Option<AyatView> {
        self.ayat.read().await.current()
    }

    pub async fn prayer_times(&self) -> PrayerBoard {
        self.prayer_times.read().await.clone()
    }

    pub async fn qr_tiles(&self) -> Vec<QrTile> {
        self.qr_tiles.read().await.clone()
    }

    pub async fn snapshot(&self) -> SignageSnapshot {
        SignageSnapshot {
            slideshow: self.slideshow().await,
            ayat: self.ayat().await,
            prayer_times: self.prayer_times().await,
            qr_codes: self.qr_tiles().await,
            initialized_at: *self.initialized_at.read().await,
        }
    }

    /// Spawn the slide, ayat and midnight reload tasks
    pub fn start(self: &Arc<Self>, config: &SignageConfig) -> Runtime {
        let session = self.clone();
        let slides = scheduler::spawn_periodic("slideshow", config.slide_interval, move || {
            let session = session.clone();
            async move { session.next_slide().await }
        });

        let session = self.clone();
        let ayat = scheduler::spawn_periodic("ayat", config.ayat_interval, move || {
            let session = session.clone();
            async move { session.next_ayat().await }
        });

        let session = self.clone();
        let reload = scheduler::spawn_at_midnight("daily-reload", move || {
            let session = session.clone();
            async move {
                tracing::info!("Executing scheduled daily reload");
                session.initialize().await;
            }
        });

        Runtime {
            tasks: vec![slides, ayat, reload],
        }
    }
}

/// Running background tasks of a session
pub struct Runtime {
    tasks: Vec<TaskHandle>,
}

impl Runtime {
    pub fn running(&self) -> Vec<&'static str> {
        self.tasks
            .iter()
            .filter(|t| t.is_running())
            .map(|t| t.name())
            .collect()
    }

    pub async fn shutdown(self) {
        for task in self.tasks {
            task.stop().await;
        }
        tracing::info!("Signage runtime stopped");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::{TtlCache, VersionedCache, LOCAL_IMAGES_VERSION};
    use crate::clock::ManualClock;
    use crate::config::PrayerConfig;
    use crate::images::tests::{remote, FakeListing};
    use crate::images::ImageOrigin;
    use crate::prayer::PrayerSource;
    use crate::slideshow::tests::FakeProbe;
    use crate::slideshow::SlideStatus;
    use crate::store::MemoryStore;
    use crate::probe::ImageMeta;
    use async_trait::async_trait;
    use reqwest::Client;
    use std::time::Duration;
    use tokio::time::Instant;

    const STARTED_AT: i64 = 1_700_000_000_000;

    /// Probe whose every load takes longer than several slide intervals
    struct SlowProbe;

    #[async_trait]
    impl ImageProbe for SlowProbe {
        async fn load(&self, _url: &str) -> Result<ImageMeta, AppError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(ImageMeta {
                width: 800,
                height: 600,
            })
        }
    }

    pub fn test_session(
        listing: FakeListing,
        probe: impl ImageProbe + 'static,
    ) -> (SignageConfig, Arc<SignageSession>) {
        let mut config = SignageConfig {
            fade_delay: Duration::ZERO,
            slide_interval: Duration::from_secs(8),
            ayat_interval: Duration::from_secs(20),
            ..SignageConfig::default()
        };
        config.prayer = PrayerConfig {
            api_url: "http://127.0.0.1:9".to_string(),
            ..PrayerConfig::default()
        };

        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(STARTED_AT));
        let resolver = Arc::new(ImageResolver::new(
            Arc::new(listing),
            TtlCache::new(store.clone(), clock.clone(), config.cache_ttl),
            VersionedCache::new(store, clock.clone(), LOCAL_IMAGES_VERSION),
            crate::images::fallback_images(&config),
        ));
        let session = SignageSession::new(
            &config,
            resolver,
            Arc::new(probe),
            PrayerTimesFetcher::new(Client::new(), config.prayer.clone()),
            clock,
        );
        (config, Arc::new(session))
    }

    #[tokio::test]
    async fn test_initialize_builds_snapshot() {
        let (_, session) = test_session(
            FakeListing::new(vec![Ok(remote(&["a.jpg", "b.jpg"]))]),
            FakeProbe::failing(&[]),
        );
        assert!(session.snapshot().await.initialized_at.is_none());

        session.initialize().await;
        let snapshot = session.snapshot().await;

        assert_eq!(snapshot.initialized_at, Some(STARTED_AT));
        assert_eq!(snapshot.slideshow.origin, Some(ImageOrigin::Remote));
        assert_eq!(snapshot.slideshow.slide.status, SlideStatus::Shown);
        assert_eq!(snapshot.ayat.unwrap().index, 0);
        assert_eq!(snapshot.prayer_times.source, PrayerSource::Fallback);
        assert_eq!(snapshot.prayer_times.times.len(), 6);
        assert_eq!(snapshot.qr_codes.len(), 2);
        assert!(snapshot.qr_codes.iter().all(|t| t.attempts == 1));
    }

    #[tokio::test]
    async fn test_listing_failure_shows_fallback_images() {
        let (config, session) = test_session(
            FakeListing::new(vec![Err(AppError::ExternalApi("503".to_string()))]),
            FakeProbe::failing(&[]),
        );
        session.initialize().await;

        let slideshow = session.slideshow().await;
        assert_eq!(slideshow.origin, Some(ImageOrigin::Fallback));
        assert_eq!(slideshow.images, crate::images::fallback_images(&config));
    }

    #[tokio::test]
    async fn test_reinitialize_resets_rotation() {
        let (_, session) = test_session(
            FakeListing::new(vec![Ok(remote(&["a.jpg", "b.jpg", "c.jpg"]))]),
            FakeProbe::failing(&[]),
        );
        session.initialize().await;
        session.next_slide().await;
        session.next_ayat().await;
        assert_eq!(session.slideshow().await.index, 1);
        assert_eq!(session.ayat().await.unwrap().index, 1);

        // Second run is served from the TTL cache
        session.initialize().await;
        let slideshow = session.slideshow().await;
        assert_eq!(slideshow.index, 0);
        assert_eq!(slideshow.origin, Some(ImageOrigin::Cache));
        assert_eq!(session.ayat().await.unwrap().index, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runtime_drives_timers() {
        let (config, session) = test_session(
            FakeListing::new(vec![Ok(remote(&["a.jpg", "b.jpg", "c.jpg", "d.jpg"]))]),
            FakeProbe::failing(&[]),
        );
        // Slides only; the prayer lookup would hit the network under paused time
        session
            .slideshow_driver
            .initialize(&session.slideshow)
            .await;

        let runtime = session.start(&config);
        assert_eq!(runtime.running(), vec!["slideshow", "ayat", "daily-reload"]);

        // Slides at 8, 16, 24 s; ayat at 20 s
        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(session.slideshow().await.index, 3);
        assert_eq!(session.ayat().await.unwrap().index, 1);

        runtime.shutdown().await;
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(session.slideshow().await.index, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_image_loads_keep_slides_on_schedule() {
        let (config, session) = test_session(FakeListing::new(vec![]), SlowProbe);
        let names: Vec<String> = (0..10).map(|i| format!("{}.jpg", i)).collect();
        session
            .slideshow
            .write()
            .await
            .replace_images(names, ImageOrigin::Fallback);

        let runtime = session.start(&config);

        // Ten advances at 8 s each wrap back to the first slide
        tokio::time::sleep(Duration::from_secs(81)).await;
        let slideshow = session.slideshow().await;
        assert_eq!(slideshow.index, 0);
        assert_eq!(slideshow.rotation_count, 1);
        assert_eq!(slideshow.slide.status, SlideStatus::Loading);

        let before = Instant::now();
        runtime.shutdown().await;
        assert!(before.elapsed() < Duration::from_secs(1));
    }
}
