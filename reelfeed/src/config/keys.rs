//! Named configuration keys for the `config` CLI commands.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::file::ConfigFile;
use super::ConfigError;

/// Upper bound on the mount radius.
pub const MAX_WINDOW_RADIUS: usize = 16;

/// Upper bound on retries per failure sequence.
pub const MAX_RETRY_ATTEMPTS: u32 = 10;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A configurable setting addressed as `section.key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    FeedWindowRadius,
    FeedPrefetchTriggerDistance,
    VisibilityThreshold,
    VisibilitySettleMs,
    RetryBaseDelayMs,
    RetryMaxAttempts,
    RetryMaxDelaySecs,
    NetworkRecomputeIntervalSecs,
    NetworkRttCeilingMs,
    NetworkFastRttMs,
    NetworkFastDownlinkMbps,
    NetworkSlowDownlinkMbps,
    LoggingDirectory,
    LoggingLevel,
}

impl ConfigKey {
    /// Every key, grouped by section.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::FeedWindowRadius,
            ConfigKey::FeedPrefetchTriggerDistance,
            ConfigKey::VisibilityThreshold,
            ConfigKey::VisibilitySettleMs,
            ConfigKey::RetryBaseDelayMs,
            ConfigKey::RetryMaxAttempts,
            ConfigKey::RetryMaxDelaySecs,
            ConfigKey::NetworkRecomputeIntervalSecs,
            ConfigKey::NetworkRttCeilingMs,
            ConfigKey::NetworkFastRttMs,
            ConfigKey::NetworkFastDownlinkMbps,
            ConfigKey::NetworkSlowDownlinkMbps,
            ConfigKey::LoggingDirectory,
            ConfigKey::LoggingLevel,
        ]
    }

    /// Full `section.key` name.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// INI section.
    pub fn section(&self) -> &'static str {
        match self {
            ConfigKey::FeedWindowRadius | ConfigKey::FeedPrefetchTriggerDistance => "feed",
            ConfigKey::VisibilityThreshold | ConfigKey::VisibilitySettleMs => "visibility",
            ConfigKey::RetryBaseDelayMs
            | ConfigKey::RetryMaxAttempts
            | ConfigKey::RetryMaxDelaySecs => "retry",
            ConfigKey::NetworkRecomputeIntervalSecs
            | ConfigKey::NetworkRttCeilingMs
            | ConfigKey::NetworkFastRttMs
            | ConfigKey::NetworkFastDownlinkMbps
            | ConfigKey::NetworkSlowDownlinkMbps => "network",
            ConfigKey::LoggingDirectory | ConfigKey::LoggingLevel => "logging",
        }
    }

    /// Key name within the section.
    pub fn key_name(&self) -> &'static str {
        match self {
            ConfigKey::FeedWindowRadius => "window_radius",
            ConfigKey::FeedPrefetchTriggerDistance => "prefetch_trigger_distance",
            ConfigKey::VisibilityThreshold => "threshold",
            ConfigKey::VisibilitySettleMs => "settle_ms",
            ConfigKey::RetryBaseDelayMs => "base_delay_ms",
            ConfigKey::RetryMaxAttempts => "max_attempts",
            ConfigKey::RetryMaxDelaySecs => "max_delay_secs",
            ConfigKey::NetworkRecomputeIntervalSecs => "recompute_interval_secs",
            ConfigKey::NetworkRttCeilingMs => "rtt_ceiling_ms",
            ConfigKey::NetworkFastRttMs => "fast_rtt_ms",
            ConfigKey::NetworkFastDownlinkMbps => "fast_downlink_mbps",
            ConfigKey::NetworkSlowDownlinkMbps => "slow_downlink_mbps",
            ConfigKey::LoggingDirectory => "directory",
            ConfigKey::LoggingLevel => "level",
        }
    }

    /// Current value as a string; empty if unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            ConfigKey::FeedWindowRadius => config.feed.window_radius.to_string(),
            ConfigKey::FeedPrefetchTriggerDistance => {
                config.feed.prefetch_trigger_distance.to_string()
            }
            ConfigKey::VisibilityThreshold => config.visibility.threshold.to_string(),
            ConfigKey::VisibilitySettleMs => config.visibility.settle_ms.to_string(),
            ConfigKey::RetryBaseDelayMs => config.retry.base_delay_ms.to_string(),
            ConfigKey::RetryMaxAttempts => config.retry.max_attempts.to_string(),
            ConfigKey::RetryMaxDelaySecs => config.retry.max_delay_secs.to_string(),
            ConfigKey::NetworkRecomputeIntervalSecs => {
                config.network.recompute_interval_secs.to_string()
            }
            ConfigKey::NetworkRttCeilingMs => config.network.rtt_ceiling_ms.to_string(),
            ConfigKey::NetworkFastRttMs => config.network.fast_rtt_ms.to_string(),
            ConfigKey::NetworkFastDownlinkMbps => config.network.fast_downlink_mbps.to_string(),
            ConfigKey::NetworkSlowDownlinkMbps => config.network.slow_downlink_mbps.to_string(),
            ConfigKey::LoggingDirectory => config
                .logging
                .directory
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            ConfigKey::LoggingLevel => config.logging.level.clone(),
        }
    }

    /// Validate and store `value`.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        match self {
            ConfigKey::FeedWindowRadius => {
                let radius: usize = self.parse(value)?;
                if radius > MAX_WINDOW_RADIUS {
                    return Err(self.invalid(value, format!("must be at most {MAX_WINDOW_RADIUS}")));
                }
                config.feed.window_radius = radius;
            }
            ConfigKey::FeedPrefetchTriggerDistance => {
                config.feed.prefetch_trigger_distance = self.parse(value)?;
            }
            ConfigKey::VisibilityThreshold => {
                let threshold: f64 = self.parse(value)?;
                if !(threshold > 0.0 && threshold < 1.0) {
                    return Err(self.invalid(value, "must be between 0 and 1 (exclusive)"));
                }
                config.visibility.threshold = threshold;
            }
            ConfigKey::VisibilitySettleMs => config.visibility.settle_ms = self.parse(value)?,
            ConfigKey::RetryBaseDelayMs => {
                let ms: u64 = self.parse(value)?;
                if ms == 0 {
                    return Err(self.invalid(value, "must be greater than 0"));
                }
                config.retry.base_delay_ms = ms;
            }
            ConfigKey::RetryMaxAttempts => {
                let attempts: u32 = self.parse(value)?;
                if attempts > MAX_RETRY_ATTEMPTS {
                    return Err(
                        self.invalid(value, format!("must be at most {MAX_RETRY_ATTEMPTS}"))
                    );
                }
                config.retry.max_attempts = attempts;
            }
            ConfigKey::RetryMaxDelaySecs => config.retry.max_delay_secs = self.parse(value)?,
            ConfigKey::NetworkRecomputeIntervalSecs => {
                config.network.recompute_interval_secs = self.parse(value)?
            }
            ConfigKey::NetworkRttCeilingMs => config.network.rtt_ceiling_ms = self.parse(value)?,
            ConfigKey::NetworkFastRttMs => config.network.fast_rtt_ms = self.parse(value)?,
            ConfigKey::NetworkFastDownlinkMbps => {
                config.network.fast_downlink_mbps = self.parse_positive(value)?
            }
            ConfigKey::NetworkSlowDownlinkMbps => {
                config.network.slow_downlink_mbps = self.parse_positive(value)?
            }
            ConfigKey::LoggingDirectory => {
                config.logging.directory = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            ConfigKey::LoggingLevel => {
                let level = value.to_ascii_lowercase();
                if !LOG_LEVELS.contains(&level.as_str()) {
                    let allowed = LOG_LEVELS.join(", ");
                    return Err(self.invalid(value, format!("must be one of {}", allowed)));
                }
                config.logging.level = level;
            }
        }
        Ok(())
    }

    fn parse<T: FromStr>(&self, value: &str) -> Result<T, ConfigError> {
        value
            .parse()
            .map_err(|_| self.invalid(value, "not a valid number"))
    }

    fn parse_positive(&self, value: &str) -> Result<f64, ConfigError> {
        let n: f64 = self.parse(value)?;
        if n.is_finite() && n > 0.0 {
            Ok(n)
        } else {
            Err(self.invalid(value, "must be a positive number"))
        }
    }

    fn invalid(&self, value: &str, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidValue {
            key: self.name(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section(), self.key_name())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}
