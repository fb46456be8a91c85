//! Runtime configuration
//!
//! Built once at startup from defaults, overridden by `SIGNAGE_*`
//! environment variables. The base path replaces any hostname sniffing:
//! every local image path is built from it.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::AppError;

/// GitHub repository the slideshow images are listed from
#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub api_url: String,
    pub owner: String,
    pub repo: String,
    pub folder: String,
    pub enabled: bool,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            owner: "itsecretary-map".to_string(),
            repo: "chromecast_stream".to_string(),
            folder: "images/slideshow".to_string(),
            enabled: true,
        }
    }
}

/// Prayer times lookup
#[derive(Debug, Clone)]
pub struct PrayerConfig {
    pub api_url: String,
    pub zipcode: String,
    pub country: String,
    pub jummah_label: String,
    pub jummah_time: String,
}

impl Default for PrayerConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.aladhan.com/v1".to_string(),
            zipcode: "15044".to_string(),
            country: "US".to_string(),
            jummah_label: "Jummah".to_string(),
            jummah_time: "1:15 PM".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignageConfig {
    pub port: u16,
    /// URL prefix the display page uses for local images
    pub base_path: String,
    /// Directory served under the base path
    pub asset_dir: PathBuf,
    /// Persisted key/value store file
    pub store_path: PathBuf,
    /// URL the host shell loads
    pub public_url: Option<String>,
    pub cache_ttl: Duration,
    pub slide_interval: Duration,
    pub fade_delay: Duration,
    pub ayat_interval: Duration,
    pub refresh_after_rotation: bool,
    pub github: GithubConfig,
    pub prayer: PrayerConfig,
}

impl Default for SignageConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            base_path: "/assets/".to_string(),
            asset_dir: PathBuf::from("./public"),
            store_path: PathBuf::from("./signage-store.json"),
            public_url: None,
            cache_ttl: Duration::from_secs(24 * 60 * 60),
            slide_interval: Duration::from_secs(8),
            fade_delay: Duration::from_millis(300),
            ayat_interval: Duration::from_secs(20),
            refresh_after_rotation: true,
            github: GithubConfig::default(),
            prayer: PrayerConfig::default(),
        }
    }
}

impl SignageConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_vars();
        config
    }

    pub fn apply_env_vars(&mut self) {
        if let Some(port) = parse_var::<u16>("PORT") {
            self.port = port;
        }

        if let Ok(base) = env::var("SIGNAGE_BASE_PATH") {
            self.base_path = normalize_base_path(&base);
        }
        if let Ok(dir) = env::var("SIGNAGE_ASSET_DIR") {
            self.asset_dir = PathBuf::from(dir);
        }
        if let Ok(path) = env::var("SIGNAGE_STORE_PATH") {
            self.store_path = PathBuf::from(path);
        }
        if let Ok(url) = env::var("SIGNAGE_PUBLIC_URL") {
            self.public_url = Some(url);
        }

        // Durations
        if let Some(secs) = parse_var::<u64>("SIGNAGE_CACHE_TTL_SECS") {
            self.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>("SIGNAGE_SLIDE_INTERVAL_SECS") {
            self.slide_interval = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_var::<u64>("SIGNAGE_FADE_DELAY_MS") {
            self.fade_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var::<u64>("SIGNAGE_AYAT_INTERVAL_SECS") {
            self.ayat_interval = Duration::from_secs(secs);
        }
        if let Ok(flag) = env::var("SIGNAGE_REFRESH_AFTER_ROTATION") {
            self.refresh_after_rotation = parse_flag(&flag);
        }

        // GitHub listing
        if let Ok(url) = env::var("SIGNAGE_GITHUB_API_URL") {
            self.github.api_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(owner) = env::var("SIGNAGE_GITHUB_OWNER") {
            self.github.owner = owner;
        }
        if let Ok(repo) = env::var("SIGNAGE_GITHUB_REPO") {
            self.github.repo = repo;
        }
        if let Ok(folder) = env::var("SIGNAGE_GITHUB_FOLDER") {
            self.github.folder = folder.trim_matches('/').to_string();
        }
        if let Ok(flag) = env::var("SIGNAGE_GITHUB_ENABLED") {
            self.github.enabled = parse_flag(&flag);
        }

        // Prayer times
        if let Ok(url) = env::var("SIGNAGE_PRAYER_API_URL") {
            self.prayer.api_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(zip) = env::var("SIGNAGE_ZIPCODE") {
            self.prayer.zipcode = zip;
        }
        if let Ok(country) = env::var("SIGNAGE_COUNTRY") {
            self.prayer.country = country;
        }
        if let Ok(time) = env::var("SIGNAGE_JUMMAH_TIME") {
            self.prayer.jummah_time = time;
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.slide_interval.is_zero() {
            return Err(AppError::Config("slide interval must be positive".into()));
        }
        if self.ayat_interval.is_zero() {
            return Err(AppError::Config("ayat interval must be positive".into()));
        }
        if self.cache_ttl.is_zero() {
            return Err(AppError::Config("cache TTL must be positive".into()));
        }
        if self.github.enabled && (self.github.owner.is_empty() || self.github.repo.is_empty()) {
            return Err(AppError::Config(
                "GitHub owner and repo are required when the listing is enabled".into(),
            ));
        }
        Ok(())
    }

    /// Path of a slideshow image under the base path
    pub fn slideshow_image_path(&self, name: &str) -> String {
        format!("{}images/slideshow/{}", self.base_path, name)
    }

    /// URL handed to the host shell
    pub fn shell_url(&self) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}{}", self.port, self.base_path))
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn parse_flag(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}

/// Ensure the base path ends with exactly one slash
fn normalize_base_path(base: &str) -> String {
    let trimmed = base.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("{}/", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = SignageConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache_ttl, Duration::from_secs(86400));
        assert_eq!(config.slide_interval, Duration::from_secs(8));
        assert_eq!(config.ayat_interval, Duration::from_secs(20));
        // Local images are served by this process under /assets
        assert_eq!(config.base_path, "/assets/");
        assert_eq!(config.asset_dir, PathBuf::from("./public"));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = SignageConfig {
            slide_interval: Duration::ZERO,
            ..SignageConfig::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_missing_repo_rejected_only_when_enabled() {
        let mut config = SignageConfig::default();
        config.github.repo.clear();
        assert!(config.validate().is_err());

        config.github.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_normalize_base_path() {
        assert_eq!(normalize_base_path("/chromecast_stream"), "/chromecast_stream/");
        assert_eq!(normalize_base_path("/chromecast_stream//"), "/chromecast_stream/");
        assert_eq!(normalize_base_path("./"), "./");
        assert_eq!(normalize_base_path(""), "/");
    }

    #[test]
    fn test_image_paths_use_base_path() {
        let config = SignageConfig {
            base_path: "/chromecast_stream/".to_string(),
            ..SignageConfig::default()
        };
        assert_eq!(
            config.slideshow_image_path("coat-drive.jpg"),
            "/chromecast_stream/images/slideshow/coat-drive.jpg"
        );
    }

    #[test]
    fn test_shell_url_defaults_to_local_assets() {
        let config = SignageConfig::default();
        assert_eq!(config.shell_url(), "http://localhost:3000/assets/");
    }
}
