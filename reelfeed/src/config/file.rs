//! INI configuration file.
//!
//! ```ini
//! [feed]
//! window_radius = 1
//! prefetch_trigger_distance = 2
//!
//! [visibility]
//! threshold = 0.6
//! settle_ms = 300
//!
//! [retry]
//! base_delay_ms = 1000
//! max_attempts = 3
//! max_delay_secs = 30
//!
//! [network]
//! recompute_interval_secs = 5
//! rtt_ceiling_ms = 400
//! fast_rtt_ms = 150
//! fast_downlink_mbps = 5
//! slow_downlink_mbps = 1
//!
//! [logging]
//! directory = /var/log/reelfeed
//! level = info
//! ```
//!
//! Keys missing from the file keep their defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;

use super::keys::ConfigKey;
use super::settings::{FeedConfig, DEFAULT_PREFETCH_TRIGGER_DISTANCE};
use super::ConfigError;
use crate::network::{
    NetworkConfig, DEFAULT_FAST_DOWNLINK_MBPS, DEFAULT_FAST_RTT, DEFAULT_RECOMPUTE_INTERVAL,
    DEFAULT_RTT_CEILING, DEFAULT_SLOW_DOWNLINK_MBPS,
};
use crate::playback::{
    RetryPolicy, DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY_SECS,
};
use crate::visibility::{VisibilityConfig, DEFAULT_SETTLE_PERIOD, DEFAULT_VISIBILITY_THRESHOLD};
use crate::window::DEFAULT_WINDOW_RADIUS;

/// Default log level when none is configured.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Directory holding the configuration file.
pub fn config_directory() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("reelfeed")
}

/// Path of the configuration file.
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

/// `[feed]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSettings {
    pub window_radius: usize,
    pub prefetch_trigger_distance: usize,
}

/// `[visibility]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibilitySettings {
    pub threshold: f64,
    pub settle_ms: u64,
}

/// `[retry]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrySettings {
    pub base_delay_ms: u64,
    pub max_attempts: u32,
    pub max_delay_secs: u64,
}

/// `[network]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkSettings {
    pub recompute_interval_secs: u64,
    pub rtt_ceiling_ms: u64,
    pub fast_rtt_ms: u64,
    pub fast_downlink_mbps: f64,
    pub slow_downlink_mbps: f64,
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Directory for log files; `None` uses the platform data directory.
    pub directory: Option<PathBuf>,
    pub level: String,
}

/// Parsed configuration file.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub feed: FeedSettings,
    pub visibility: VisibilitySettings,
    pub retry: RetrySettings,
    pub network: NetworkSettings,
    pub logging: LoggingSettings,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            feed: FeedSettings {
                window_radius: DEFAULT_WINDOW_RADIUS,
                prefetch_trigger_distance: DEFAULT_PREFETCH_TRIGGER_DISTANCE,
            },
            visibility: VisibilitySettings {
                threshold: DEFAULT_VISIBILITY_THRESHOLD,
                settle_ms: DEFAULT_SETTLE_PERIOD.as_millis() as u64,
            },
            retry: RetrySettings {
                base_delay_ms: DEFAULT_BASE_DELAY_MS,
                max_attempts: DEFAULT_MAX_ATTEMPTS,
                max_delay_secs: DEFAULT_MAX_DELAY_SECS,
            },
            network: NetworkSettings {
                recompute_interval_secs: DEFAULT_RECOMPUTE_INTERVAL.as_secs(),
                rtt_ceiling_ms: DEFAULT_RTT_CEILING.as_millis() as u64,
                fast_rtt_ms: DEFAULT_FAST_RTT.as_millis() as u64,
                fast_downlink_mbps: DEFAULT_FAST_DOWNLINK_MBPS,
                slow_downlink_mbps: DEFAULT_SLOW_DOWNLINK_MBPS,
            },
            logging: LoggingSettings {
                directory: None,
                level: DEFAULT_LOG_LEVEL.to_string(),
            },
        }
    }
}

impl ConfigFile {
    /// Load from the default location; a missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let mut config = Self::default();
        for key in ConfigKey::all() {
            if let Some(value) = ini.get_from(Some(key.section()), key.key_name()) {
                key.set(&mut config, value)?;
            }
        }
        Ok(config)
    }

    /// Save to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Save to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            let value = key.get(self);
            if !value.is_empty() {
                ini.with_section(Some(key.section()))
                    .set(key.key_name(), value);
            }
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        ini.write_to_file(path)?;
        Ok(())
    }

    /// Runtime configuration for the controller.
    pub fn feed_config(&self) -> FeedConfig {
        let network = NetworkConfig {
            recompute_interval: Duration::from_secs(self.network.recompute_interval_secs),
            rtt_ceiling: Duration::from_millis(self.network.rtt_ceiling_ms),
            fast_rtt: Duration::from_millis(self.network.fast_rtt_ms),
            fast_downlink_mbps: self.network.fast_downlink_mbps,
            slow_downlink_mbps: self.network.slow_downlink_mbps,
            ..NetworkConfig::default()
        };
        let retry = RetryPolicy {
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_attempts: self.retry.max_attempts,
            max_delay: Duration::from_secs(self.retry.max_delay_secs),
        };

        FeedConfig::default()
            .with_window_radius(self.feed.window_radius)
            .with_prefetch_trigger_distance(self.feed.prefetch_trigger_distance)
            .with_visibility(VisibilityConfig::new(
                self.visibility.threshold,
                Duration::from_millis(self.visibility.settle_ms),
            ))
            .with_retry(retry)
            .with_network(network)
    }
}
