//! Prayer times from the Aladhan API
//!
//! One lookup per session initialization. Any failure substitutes a static
//! table, so the board always has the five daily prayers plus Jummah.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

use crate::config::PrayerConfig;
use crate::error::AppError;

/// Daily prayers in display order
pub const PRAYER_ORDER: [&str; 5] = ["Fajr", "Dhuhr", "Asr", "Maghrib", "Isha"];

/// Used when the API is unreachable or returns garbage
const FALLBACK_TIMES: &[(&str, &str)] = &[
    ("Fajr", "05:12 AM"),
    ("Dhuhr", "01:23 PM"),
    ("Asr", "05:07 PM"),
    ("Maghrib", "08:34 PM"),
    ("Isha", "10:02 PM"),
];

/// Aladhan timings response
#[derive(Debug, Deserialize)]
struct TimingsResponse {
    data: TimingsData,
}

#[derive(Debug, Deserialize)]
struct TimingsData {
    timings: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PrayerTime {
    pub name: String,
    /// "H:MM AM/PM"
    pub time: String,
}

impl PrayerTime {
    fn new(name: &str, time: String) -> Self {
        Self {
            name: name.to_string(),
            time,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PrayerSource {
    Live,
    Fallback,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PrayerBoard {
    pub times: Vec<PrayerTime>,
    pub source: PrayerSource,
}

/// Convert "HH:MM" (24-hour) to "H:MM AM/PM"
///
/// Anything after the two minute digits (e.g. a timezone suffix) is ignored.
pub fn to_12_hour(time: &str) -> Option<String> {
    let (h, m) = time.trim().split_once(':')?;
    let hour: u32 = h.trim().parse().ok()?;
    let minute = m.trim().get(..2)?;
    if hour > 23 || !minute.bytes().all(|b| b.is_ascii_digit()) || minute > "59" {
        return None;
    }

    let (hour, ampm) = match hour {
        0 => (12, "AM"),
        12 => (12, "PM"),
        h if h > 12 => (h - 12, "PM"),
        h => (h, "AM"),
    };
    Some(format!("{}:{} {}", hour, minute, ampm))
}

/// Normalize "05:12 am" style times to "5:12 AM"; other input is returned as-is
pub fn normalize_12_hour(time: &str) -> String {
    let parse = || {
        let (h, rest) = time.trim().split_once(':')?;
        let hour: u32 = h.trim().parse().ok()?;
        let minute = rest.get(..2)?;
        let ampm = rest[2..].trim().to_uppercase();
        if !minute.bytes().all(|b| b.is_ascii_digit()) || (ampm != "AM" && ampm != "PM") {
            return None;
        }
        Some(format!("{}:{} {}", hour, minute, ampm))
    };
    parse().unwrap_or_else(|| time.to_string())
}

/// Build the board rows from API timings; every prayer must be present
fn timings_to_times(
    timings: &HashMap<String, String>,
    config: &PrayerConfig,
) -> Result<Vec<PrayerTime>, AppError> {
    let mut times = PRAYER_ORDER
        .iter()
        .map(|name| -> Result<PrayerTime, AppError> {
            let raw = timings
                .get(*name)
                .ok_or_else(|| AppError::MalformedResponse(format!("missing {} timing", name)))?;
            let time = to_12_hour(raw).ok_or_else(|| {
                AppError::MalformedResponse(format!("invalid {} timing: {}", name, raw))
            })?;
            Ok(PrayerTime::new(name, time))
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    times.push(jummah(config));
    Ok(times)
}

fn jummah(config: &PrayerConfig) -> PrayerTime {
    PrayerTime::new(&config.jummah_label, config.jummah_time.clone())
}

/// Static table with Jummah appended
pub fn fallback_board(config: &PrayerConfig) -> PrayerBoard {
    let mut times: Vec<_> = FALLBACK_TIMES
        .iter()
        .map(|(name, time)| PrayerTime::new(name, normalize_12_hour(time)))
        .collect();
    times.push(jummah(config));

    PrayerBoard {
        times,
        source: PrayerSource::Fallback,
    }
}

pub struct PrayerTimesFetcher {
    client: Client,
    config: PrayerConfig,
}

impl PrayerTimesFetcher {
    pub fn new(client: Client, config: PrayerConfig) -> Self {
        Self { client, config }
    }

    pub fn url(&self) -> String {
        let address = format!("{},{}", self.config.zipcode, self.config.country);
        format!(
            "{}/timingsByAddress?address={}",
            self.config.api_url,
            urlencoding::encode(&address)
        )
    }

    async fn fetch_times(&self) -> Result<Vec<PrayerTime>, AppError> {
        let url = self.url();
        tracing::info!("Fetching prayer times from: {}", url);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::ExternalApi(format!(
                "Aladhan API returned status: {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        let parsed: TimingsResponse = serde_json::from_str(&body)
            .map_err(|e| AppError::MalformedResponse(format!("prayer timings: {}", e)))?;

        timings_to_times(&parsed.data.timings, &self.config)
    }

    /// Fetch today's times, falling back to the static table on any error
    pub async fn fetch(&self) -> PrayerBoard {
        match self.fetch_times().await {
            Ok(times) => PrayerBoard {
                times,
                source: PrayerSource::Live,
            },
            Err(e) => {
                tracing::warn!("Prayer times unavailable ({}), using fallback table", e);
                fallback_board(&self.config)
            }
        }
    }
}
