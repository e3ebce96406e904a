use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Floor for the reconnect backoff; a failing link is never hammered faster.
pub const MIN_RECONNECT_DELAY_SECS: u64 = 8;

/// Reconnect backoff parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// First delay after a failed attempt, in seconds (clamped to at least 8).
    pub min_delay_secs: u64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            min_delay_secs: MIN_RECONNECT_DELAY_SECS,
            max_delay_secs: 120,
        }
    }
}

/// Global configuration loaded from `~/.config/tgdl/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TgdlConfig {
    /// Root for downloaded media (`<root>/<label>/<file>`). None = `./downloads`.
    pub download_dir: Option<PathBuf>,
    /// Root of the directory-backed source (one subdirectory per channel).
    pub source_dir: Option<PathBuf>,
    /// Where thumbnails are kept. None = XDG cache dir.
    pub cache_dir: Option<PathBuf>,
    /// Maximum number of batches executing at once.
    pub max_concurrent: usize,
    /// Pause between two dispatches out of the queue.
    pub dispatch_delay_ms: u64,
    /// Interval of the background queue pump.
    pub queue_poll_ms: u64,
    /// Cadence of the progress stream.
    pub progress_interval_ms: u64,
    /// Minimum wall time between two transfer rate recomputations.
    pub rate_window_ms: u64,
    /// Budget for a single transfer.
    pub data_timeout_secs: u64,
    /// Budget for lookups and listings.
    pub metadata_timeout_secs: u64,
    /// How often an idle connected link is checked for liveness.
    pub link_check_secs: u64,
    pub item_cache_capacity: usize,
    pub listing_cache_capacity: usize,
    /// Maximum related items (comment threads) scanned per message.
    pub related_scan_limit: usize,
    /// Optional reconnect policy; if missing, built-in defaults are used.
    pub reconnect: Option<ReconnectConfig>,
}

impl Default for TgdlConfig {
    fn default() -> Self {
        Self {
            download_dir: None,
            source_dir: None,
            cache_dir: None,
            max_concurrent: 3,
            dispatch_delay_ms: 300,
            queue_poll_ms: 1000,
            progress_interval_ms: 800,
            rate_window_ms: 500,
            data_timeout_secs: 600,
            metadata_timeout_secs: 30,
            link_check_secs: 30,
            item_cache_capacity: 2000,
            listing_cache_capacity: 16,
            related_scan_limit: 200,
            reconnect: None,
        }
    }
}

impl TgdlConfig {
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent.max(1)
    }

    pub fn dispatch_delay(&self) -> Duration {
        Duration::from_millis(self.dispatch_delay_ms)
    }

    pub fn queue_poll_interval(&self) -> Duration {
        Duration::from_millis(self.queue_poll_ms.max(10))
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(10))
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_millis(self.rate_window_ms)
    }

    pub fn data_timeout(&self) -> Duration {
        Duration::from_secs(self.data_timeout_secs)
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }

    pub fn link_check_interval(&self) -> Duration {
        Duration::from_secs(self.link_check_secs.max(1))
    }

    pub fn reconnect(&self) -> ReconnectConfig {
        self.reconnect.clone().unwrap_or_default()
    }

    pub fn download_root(&self) -> PathBuf {
        self.download_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("downloads"))
    }

    /// Thumbnail directory; falls back to `~/.cache/tgdl/thumbs`.
    pub fn thumbnail_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.cache_dir {
            return Ok(dir.join("thumbs"));
        }
        let xdg_dirs = xdg::BaseDirectories::with_prefix("tgdl")?;
        Ok(xdg_dirs.get_cache_home().join("thumbs"))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("tgdl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<TgdlConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = TgdlConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: TgdlConfig = toml::from_str(&data)?;
    Ok(cfg)
}
