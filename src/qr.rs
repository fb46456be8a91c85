//! QR code tiles
//!
//! Each tile tries its candidate image paths in order and keeps the first
//! one that loads. When every path fails the tile carries a text
//! placeholder instead. Tiles are probed concurrently.

use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinSet;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::probe::ImageProbe;

/// A QR code shown on the signage
#[derive(Debug, Clone, Copy)]
pub struct QrEntry {
    pub key: &'static str,
    /// Empty to derive the label from the key
    pub label: &'static str,
    pub file: &'static str,
}

pub const QR_ENTRIES: &[QrEntry] = &[
    QrEntry {
        key: "mapWebsite",
        label: "MAP Website",
        file: "mapitt.png",
    },
    QrEntry {
        key: "communityWhatsApp",
        label: "WhatsApp",
        file: "whatsapp_group.png",
    },
];

impl QrEntry {
    /// Configured image URL under the base path
    pub fn url(&self, base_path: &str) -> String {
        format!("{}images/qr-codes/{}", base_path, self.file)
    }

    pub fn display_label(&self) -> String {
        if self.label.is_empty() {
            label_from_key(self.key)
        } else {
            self.label.to_string()
        }
    }

    /// Paths to try, in order, without duplicates
    pub fn candidate_paths(&self, base_path: &str) -> Vec<String> {
        let mut paths: Vec<String> = Vec::new();
        for path in [
            self.url(base_path),
            format!("./images/qr-codes/{}", self.file),
            format!("images/qr-codes/{}", self.file),
        ] {
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        paths
    }
}

/// "communityWhatsApp" -> "Community Whats App"
fn label_from_key(key: &str) -> String {
    let mut label = String::with_capacity(key.len() + 4);
    for (i, c) in key.chars().enumerate() {
        if i == 0 {
            label.extend(c.to_uppercase());
        } else {
            if c.is_uppercase() {
                label.push(' ');
            }
            label.push(c);
        }
    }
    label
}

/// A rendered tile: either an image path or a placeholder text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct QrTile {
    pub key: String,
    pub label: String,
    pub image: Option<String>,
    pub fallback_text: Option<String>,
    /// Paths tried, including the one that loaded
    pub attempts: usize,
}

/// Try each candidate path in order; stop at the first that loads
pub async fn render_entry(probe: &dyn ImageProbe, entry: &QrEntry, base_path: &str) -> QrTile {
    let label = entry.display_label();
    let candidates = entry.candidate_paths(base_path);

    for (attempt, path) in candidates.iter().enumerate() {
        tracing::debug!(
            "Trying QR image path {}/{} for {}: {}",
            attempt + 1,
            candidates.len(),
            entry.key,
            path
        );
        match probe.load(path).await {
            Ok(_) => {
                tracing::info!("QR image loaded for {}: {}", entry.key, path);
                return QrTile {
                    key: entry.key.to_string(),
                    label,
                    image: Some(path.clone()),
                    fallback_text: None,
                    attempts: attempt + 1,
                };
            }
            Err(e) => tracing::debug!("QR image path failed: {}: {}", path, e),
        }
    }

    tracing::error!("{}", AppError::AllPathsExhausted(entry.key.to_string()));
    QrTile {
        key: entry.key.to_string(),
        fallback_text: Some(format!("QR Code: {}", label)),
        label,
        image: None,
        attempts: candidates.len(),
    }
}

/// Render every entry concurrently; tiles come back in declared order
pub async fn render_all(
    probe: Arc<dyn ImageProbe>,
    entries: &[QrEntry],
    base_path: &str,
) -> Vec<QrTile> {
    let mut set = JoinSet::new();
    for (i, entry) in entries.iter().copied().enumerate() {
        let probe = probe.clone();
        let base_path = base_path.to_string();
        set.spawn(async move { (i, render_entry(probe.as_ref(), &entry, &base_path).await) });
    }

    let mut tiles: Vec<Option<QrTile>> = vec![None; entries.len()];
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((i, tile)) => tiles[i] = Some(tile),
            Err(e) => tracing::error!("QR render task failed: {}", e),
        }
    }

    // A panicked task still gets its placeholder
    tiles
        .into_iter()
        .zip(entries)
        .map(|(tile, entry)| {
            tile.unwrap_or_else(|| QrTile {
                key: entry.key.to_string(),
                label: entry.display_label(),
                image: None,
                fallback_text: Some(format!("QR Code: {}", entry.display_label())),
                attempts: 0,
            })
        })
        .collect()
}
