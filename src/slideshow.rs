//! Slideshow driver
//!
//! `SlideshowState` is plain data: the image list, the current index and
//! what the display should show for the current slide. `SlideshowDriver`
//! runs one tick against that state: advance, fade out, load, fade in (or
//! dim and show an error), and refresh the list after a full rotation.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use utoipa::ToSchema;

use crate::images::{ImageOrigin, ImageResolver};
use crate::probe::{ImageMeta, ImageProbe};

/// Message shown under a slide that failed to load
pub const LOAD_ERROR_MESSAGE: &str = "Image failed to load. Check the image URL or try another image.";

/// Opacity of a slide that failed to load
const FAILED_OPACITY: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SlideStatus {
    /// No images to show
    Idle,
    /// Faded out, waiting for the image to load
    Loading,
    Shown,
    Failed,
}

/// What the display renders for the current slide
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SlideView {
    pub url: Option<String>,
    pub opacity: f32,
    pub status: SlideStatus,
    pub error: Option<String>,
    pub dimensions: Option<ImageMeta>,
}

impl Default for SlideView {
    fn default() -> Self {
        Self {
            url: None,
            opacity: 0.0,
            status: SlideStatus::Idle,
            error: None,
            dimensions: None,
        }
    }
}

/// Outcome of advancing the slideshow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advance {
    pub index: usize,
    /// The previous slide was the last one in the list
    pub completed_rotation: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SlideshowState {
    pub images: Vec<String>,
    pub origin: Option<ImageOrigin>,
    pub index: usize,
    pub rotation_count: u64,
    pub slide: SlideView,
}

impl SlideshowState {
    pub fn new() -> Self {
        Self {
            images: Vec::new(),
            origin: None,
            index: 0,
            rotation_count: 0,
            slide: SlideView::default(),
        }
    }

    pub fn current_url(&self) -> Option<&str> {
        self.images.get(self.index).map(String::as_str)
    }

    /// Move to the next slide, wrapping at the end of the list
    pub fn advance(&mut self) -> Option<Advance> {
        if self.images.is_empty() {
            return None;
        }

        let completed_rotation = self.index + 1 >= self.images.len();
        if completed_rotation {
            self.rotation_count += 1;
            tracing::info!(
                "Completed rotation {} through {} images",
                self.rotation_count,
                self.images.len()
            );
        }

        self.index = (self.index + 1) % self.images.len();
        Some(Advance {
            index: self.index,
            completed_rotation,
        })
    }

    /// Swap in a new list and restart from the first slide
    pub fn replace_images(&mut self, images: Vec<String>, origin: ImageOrigin) {
        tracing::info!(
            "Slideshow list replaced: {} -> {} images ({:?})",
            self.images.len(),
            images.len(),
            origin
        );
        self.images = images;
        self.origin = Some(origin);
        self.index = 0;
        if self.images.is_empty() {
            self.slide = SlideView::default();
        }
    }

    /// Fade out and point the slide at the current image
    pub fn begin_fade(&mut self) -> Option<String> {
        let url = self.current_url()?.to_string();
        self.slide = SlideView {
            url: Some(url.clone()),
            opacity: 0.0,
            status: SlideStatus::Loading,
            error: None,
            dimensions: None,
        };
        Some(url)
    }

    pub fn mark_loaded(&mut self, meta: ImageMeta) {
        self.slide.opacity = 1.0;
        self.slide.status = SlideStatus::Shown;
        self.slide.error = None;
        self.slide.dimensions = Some(meta);
    }

    pub fn mark_failed(&mut self) {
        self.slide.opacity = FAILED_OPACITY;
        self.slide.status = SlideStatus::Failed;
        self.slide.error = Some(LOAD_ERROR_MESSAGE.to_string());
    }
}

impl Default for SlideshowState {
    fn default() -> Self {
        Self::new()
    }
}

pub struct SlideshowDriver {
    resolver: Arc<ImageResolver>,
    probe: Arc<dyn ImageProbe>,
    fade_delay: Duration,
    refresh_after_rotation: bool,
}

impl SlideshowDriver {
    pub fn new(
        resolver: Arc<ImageResolver>,
        probe: Arc<dyn ImageProbe>,
        fade_delay: Duration,
        refresh_after_rotation: bool,
    ) -> Self {
        Self {
            resolver,
            probe,
            fade_delay,
            refresh_after_rotation,
        }
    }

    /// Resolve the image list and show the first slide
    pub async fn initialize(&self, state: &RwLock<SlideshowState>) {
        let resolved = self.resolver.resolve().await;
        state.write().await.replace_images(resolved.urls, resolved.origin);
        self.show_current(state).await;
    }

    /// Fade out, load the current image, then fade in or mark it failed
    pub async fn show_current(&self, state: &RwLock<SlideshowState>) {
        let Some(url) = state.write().await.begin_fade() else {
            tracing::debug!("No images available to show");
            return;
        };

        tokio::time::sleep(self.fade_delay).await;
        let result = self.probe.load(&url).await;

        let mut state = state.write().await;
        // A later tick moved on while this one was loading
        if state.slide.url.as_deref() != Some(url.as_str()) {
            return;
        }
        match result {
            Ok(meta) => {
                tracing::debug!("Showing slide {}: {}", state.index + 1, url);
                state.mark_loaded(meta);
            }
            Err(e) => {
                tracing::warn!("Slide failed to load: {}: {}", url, e);
                state.mark_failed();
            }
        }
    }

    /// Advance one slide, refreshing the list after a full rotation
    pub async fn tick(&self, state: &RwLock<SlideshowState>) {
        let Some(advance) = state.write().await.advance() else {
            return;
        };

        if advance.completed_rotation && self.refresh_after_rotation {
            if let Some(urls) = self.resolver.refresh().await {
                state.write().await.replace_images(urls, ImageOrigin::Remote);
            }
        }

        self.show_current(state).await;
    }

    /// Clear the caches and re-list remote images; resets to slide 0 on success
    pub async fn force_refresh(&self, state: &RwLock<SlideshowState>) -> Option<usize> {
        if let Err(e) = self.resolver.clear().await {
            tracing::warn!("Failed to clear image cache: {}", e);
        }
        let urls = self.resolver.refresh().await?;
        let count = urls.len();
        state.write().await.replace_images(urls, ImageOrigin::Remote);
        self.show_current(state).await;
        Some(count)
    }
}
