//! Image load checks
//!
//! The display page swaps image sources blindly; the server checks that an
//! image actually loads before reporting it as shown. Absolute URLs are
//! fetched, local paths are read from the asset directory, and the bytes
//! are decoded.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use utoipa::ToSchema;

use crate::error::AppError;

/// Decoded image dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct ImageMeta {
    pub width: u32,
    pub height: u32,
}

#[async_trait]
pub trait ImageProbe: Send + Sync {
    async fn load(&self, url: &str) -> Result<ImageMeta, AppError>;
}

pub struct HttpImageProbe {
    client: Client,
    base_path: String,
    asset_dir: PathBuf,
}

impl HttpImageProbe {
    pub fn new(client: Client, base_path: &str, asset_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            base_path: base_path.to_string(),
            asset_dir: asset_dir.into(),
        }
    }

    async fn fetch_remote(&self, url: &str) -> Result<Vec<u8>, AppError> {
        let response = self
            .client
            .get(url)
            .header("Accept", "image/*")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::ImageLoad(format!(
                "{} returned status: {}",
                url,
                response.status()
            )));
        }

        Ok(response.bytes().await?.to_vec())
    }

    async fn read_local(&self, url: &str) -> Result<Vec<u8>, AppError> {
        let path = local_path(&self.asset_dir, &self.base_path, url)
            .ok_or_else(|| AppError::ImageLoad(format!("invalid local path: {}", url)))?;

        tokio::fs::read(&path)
            .await
            .map_err(|e| AppError::ImageLoad(format!("{}: {}", path.display(), e)))
    }
}

#[async_trait]
impl ImageProbe for HttpImageProbe {
    async fn load(&self, url: &str) -> Result<ImageMeta, AppError> {
        let bytes = if is_remote(url) {
            self.fetch_remote(url).await?
        } else {
            self.read_local(url).await?
        };

        let meta = decode_dimensions(bytes).await?;
        tracing::debug!("Image loaded: {} ({}x{})", url, meta.width, meta.height);
        Ok(meta)
    }
}

fn is_remote(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Map a page-relative image path to a file under the asset directory
///
/// The base path prefix, `./` and a leading `/` are stripped; paths that
/// would escape the asset directory are rejected.
pub fn local_path(asset_dir: &Path, base_path: &str, url: &str) -> Option<PathBuf> {
    let relative = if base_path != "/" && base_path != "./" && url.starts_with(base_path) {
        &url[base_path.len()..]
    } else {
        url.trim_start_matches("./").trim_start_matches('/')
    };

    let relative = urlencoding::decode(relative).ok()?;
    let relative = Path::new(relative.as_ref());

    if relative.as_os_str().is_empty()
        || relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }

    Some(asset_dir.join(relative))
}

/// Decode off the async runtime and report dimensions
async fn decode_dimensions(bytes: Vec<u8>) -> Result<ImageMeta, AppError> {
    let decoded = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
        .await
        .map_err(|e| AppError::ImageLoad(format!("decode task failed: {}", e)))?
        .map_err(|e| AppError::ImageLoad(format!("failed to decode image: {}", e)))?;

    Ok(ImageMeta {
        width: decoded.width(),
        height: decoded.height(),
    })
}
