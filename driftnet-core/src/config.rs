//! Centralized configuration for Driftnet.
//!
//! All tunable timeouts, storage locations and platform parameters live here
//! instead of being scattered through the extractors and background tasks.

use std::path::PathBuf;
use std::time::Duration;

/// Central configuration for all Driftnet components.
///
/// Groups related settings into sections and supports environment variable
/// overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct DriftnetConfig {
    pub extraction: ExtractionConfig,
    pub cache: CacheConfig,
    pub storage: StorageConfig,
    pub reaper: ReaperConfig,
}

/// Platform access and extraction deadlines.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Browser user agent sent to platforms
    pub user_agent: String,
    /// TCP connect timeout for outgoing requests
    pub connect_timeout: Duration,
    /// Budget for a single structured API call
    pub api_timeout: Duration,
    /// Hard ceiling for fetching an embeddable page
    pub embed_timeout: Duration,
    /// Budget for one whole extraction, all strategies included
    pub extract_timeout: Duration,
    /// Persisted query identifier for the Instagram GraphQL endpoint
    pub instagram_doc_id: String,
    /// Web application identifier sent with Instagram API calls
    pub instagram_app_id: String,
    /// Explicit yt-dlp binary, discovered on the system when unset
    pub ytdlp_path: Option<PathBuf>,
    /// Socket timeout handed to yt-dlp
    pub ytdlp_socket_timeout: Duration,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36"
                .to_string(),
            connect_timeout: Duration::from_secs(10),
            api_timeout: Duration::from_secs(10),
            embed_timeout: Duration::from_secs(10),
            extract_timeout: Duration::from_secs(60),
            instagram_doc_id: "10015901848480474".to_string(),
            instagram_app_id: "936619743392459".to_string(),
            ytdlp_path: None,
            ytdlp_socket_timeout: Duration::from_secs(30),
        }
    }
}

/// Media cache pipeline settings.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Base URL under which stored objects are publicly reachable
    pub public_base_url: String,
    /// Budget for downloading and uploading one item
    pub upload_timeout: Duration,
    /// Budget for one existence check against the store
    pub lookup_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:9050".to_string(),
            upload_timeout: Duration::from_secs(30),
            lookup_timeout: Duration::from_secs(5),
        }
    }
}

/// Object store location.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory of the filesystem store
    pub root: PathBuf,
    /// Bucket holding cached media
    pub bucket: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./objects"),
            bucket: "driftnet".to_string(),
        }
    }
}

/// Temp object reaper schedule.
#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// Time between ticks
    pub interval: Duration,
    /// Objects older than this are deleted
    pub retention: Duration,
    /// Maximum objects listed per tick
    pub list_page_size: usize,
    /// Budget for one list or delete call
    pub tick_timeout: Duration,
    /// How long shutdown waits for an in-flight tick
    pub drain_timeout: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            retention: Duration::from_secs(600), // 10 minutes
            list_page_size: 2000,
            tick_timeout: Duration::from_secs(30),
            drain_timeout: Duration::from_secs(10),
        }
    }
}

impl DriftnetConfig {
    /// Creates configuration from defaults with `DRIFTNET_*` environment overrides.
    ///
    /// Unparsable values are ignored and the default is kept.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // Extraction overrides
        if let Some(seconds) = env_u64("DRIFTNET_EXTRACT_TIMEOUT") {
            config.extraction.extract_timeout = Duration::from_secs(seconds);
        }
        if let Some(seconds) = env_u64("DRIFTNET_API_TIMEOUT") {
            config.extraction.api_timeout = Duration::from_secs(seconds);
        }
        if let Ok(doc_id) = std::env::var("DRIFTNET_INSTAGRAM_DOC_ID") {
            config.extraction.instagram_doc_id = doc_id;
        }
        if let Ok(path) = std::env::var("DRIFTNET_YTDLP_PATH") {
            config.extraction.ytdlp_path = Some(PathBuf::from(path));
        }

        // Cache and storage overrides
        if let Ok(base_url) = std::env::var("DRIFTNET_PUBLIC_BASE_URL") {
            config.cache.public_base_url = base_url;
        }
        if let Some(seconds) = env_u64("DRIFTNET_UPLOAD_TIMEOUT") {
            config.cache.upload_timeout = Duration::from_secs(seconds);
        }
        if let Ok(root) = std::env::var("DRIFTNET_STORAGE_ROOT") {
            config.storage.root = PathBuf::from(root);
        }
        if let Ok(bucket) = std::env::var("DRIFTNET_BUCKET") {
            config.storage.bucket = bucket;
        }

        // Reaper overrides
        if let Some(seconds) = env_u64("DRIFTNET_REAPER_INTERVAL") {
            config.reaper.interval = Duration::from_secs(seconds);
        }
        if let Some(seconds) = env_u64("DRIFTNET_REAPER_RETENTION") {
            config.reaper.retention = Duration::from_secs(seconds);
        }

        config
    }

    /// Creates a configuration with short deadlines for tests.
    pub fn for_testing() -> Self {
        Self {
            extraction: ExtractionConfig {
                api_timeout: Duration::from_millis(500),
                embed_timeout: Duration::from_millis(500),
                extract_timeout: Duration::from_secs(2),
                ..Default::default()
            },
            cache: CacheConfig {
                upload_timeout: Duration::from_secs(1),
                lookup_timeout: Duration::from_millis(500),
                ..Default::default()
            },
            storage: StorageConfig {
                bucket: "driftnet-test".to_string(),
                ..Default::default()
            },
            reaper: ReaperConfig {
                interval: Duration::from_millis(50),
                tick_timeout: Duration::from_millis(500),
                drain_timeout: Duration::from_millis(500),
                ..Default::default()
            },
        }
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DriftnetConfig::default();

        assert_eq!(config.extraction.embed_timeout, Duration::from_secs(10));
        assert_eq!(config.extraction.instagram_doc_id, "10015901848480474");
        assert_eq!(config.cache.upload_timeout, Duration::from_secs(30));
        assert_eq!(config.reaper.interval, Duration::from_secs(60));
        assert_eq!(config.reaper.retention, Duration::from_secs(600));
        assert_eq!(config.reaper.list_page_size, 2000);
    }

    #[test]
    fn test_testing_config_uses_short_deadlines() {
        let config = DriftnetConfig::for_testing();

        assert!(config.extraction.extract_timeout < Duration::from_secs(60));
        assert!(config.reaper.interval < Duration::from_secs(1));
        assert_eq!(config.reaper.retention, Duration::from_secs(600));
    }

    #[test]
    fn test_env_override() {
        unsafe {
            std::env::set_var("DRIFTNET_UPLOAD_TIMEOUT", "45");
            std::env::set_var("DRIFTNET_BUCKET", "media-tmp");
            std::env::set_var("DRIFTNET_REAPER_RETENTION", "120");
            std::env::set_var("DRIFTNET_EXTRACT_TIMEOUT", "not-a-number");
        }

        let config = DriftnetConfig::from_env();

        assert_eq!(config.cache.upload_timeout, Duration::from_secs(45));
        assert_eq!(config.storage.bucket, "media-tmp");
        assert_eq!(config.reaper.retention, Duration::from_secs(120));
        assert_eq!(config.extraction.extract_timeout, Duration::from_secs(60));

        // Cleanup
        unsafe {
            std::env::remove_var("DRIFTNET_UPLOAD_TIMEOUT");
            std::env::remove_var("DRIFTNET_BUCKET");
            std::env::remove_var("DRIFTNET_REAPER_RETENTION");
            std::env::remove_var("DRIFTNET_EXTRACT_TIMEOUT");
        }
    }
}
