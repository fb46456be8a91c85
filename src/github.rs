//! GitHub contents API integration
//!
//! Lists the slideshow folder of a repository and keeps the image files.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::config::GithubConfig;
use crate::error::AppError;
use crate::images::{ImageListing, RemoteImage};

/// Extensions accepted as slideshow images
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// The page background lives in the same folder but is not a slide
const BACKGROUND_IMAGE_STEM: &str = "CCA_5344-HDR";

/// A file entry from the contents API
#[derive(Debug, Clone, Deserialize)]
pub struct GithubFile {
    pub name: String,
    /// Null for directories and submodules
    pub download_url: Option<String>,
    pub sha: String,
}

/// Keep slideshow images, in listing order
pub fn filter_slideshow_files(files: Vec<GithubFile>) -> Vec<RemoteImage> {
    files
        .into_iter()
        .filter(|file| {
            let lower = file.name.to_lowercase();
            let extension = lower.rsplit('.').next().unwrap_or_default();
            let is_image = IMAGE_EXTENSIONS.contains(&extension);
            let is_background = file.name.contains(BACKGROUND_IMAGE_STEM);
            tracing::debug!(
                "File: {}, is_image: {}, is_background: {}",
                file.name,
                is_image,
                is_background
            );
            is_image && !is_background
        })
        .filter_map(|file| {
            let url = file.download_url?;
            Some(RemoteImage {
                id: file.sha,
                name: file.name,
                url,
            })
        })
        .collect()
}

/// Image listing backed by the GitHub contents API
pub struct GithubListing {
    client: Client,
    config: GithubConfig,
}

impl GithubListing {
    pub fn new(client: Client, config: GithubConfig) -> Self {
        Self { client, config }
    }

    pub fn contents_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.config.api_url, self.config.owner, self.config.repo, self.config.folder
        )
    }
}

#[async_trait]
impl ImageListing for GithubListing {
    async fn list_images(&self) -> Result<Vec<RemoteImage>, AppError> {
        if !self.config.enabled {
            tracing::info!("GitHub image listing is disabled");
            return Ok(Vec::new());
        }

        let url = self.contents_url();
        tracing::info!("Fetching images from GitHub: {}", url);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "signage-server")
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::warn!("GitHub folder not found: {}", url);
            return Ok(Vec::new());
        }

        if !response.status().is_success() {
            return Err(AppError::ExternalApi(format!(
                "GitHub API returned status: {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        let files: Vec<GithubFile> = serde_json::from_str(&body)
            .map_err(|e| AppError::MalformedResponse(format!("GitHub listing: {}", e)))?;

        let images = filter_slideshow_files(files);
        tracing::info!("Found {} slideshow images on GitHub", images.len());

        Ok(images)
    }
}
