//! Typed configuration consumed by the feed controller.

use std::time::Duration;

use crate::network::NetworkConfig;
use crate::playback::RetryPolicy;
use crate::visibility::VisibilityConfig;
use crate::window::DEFAULT_WINDOW_RADIUS;

/// Default distance from the end of the loaded items at which the next page
/// is requested.
pub const DEFAULT_PREFETCH_TRIGGER_DISTANCE: usize = 2;

/// Runtime configuration for one feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    /// Positions mounted on each side of the active one.
    pub window_radius: usize,

    /// Request the next page once the active position is within this many
    /// items of the last loaded one.
    pub prefetch_trigger_distance: usize,

    pub visibility: VisibilityConfig,
    pub retry: RetryPolicy,
    pub network: NetworkConfig,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            window_radius: DEFAULT_WINDOW_RADIUS,
            prefetch_trigger_distance: DEFAULT_PREFETCH_TRIGGER_DISTANCE,
            visibility: VisibilityConfig::default(),
            retry: RetryPolicy::default(),
            network: NetworkConfig::default(),
        }
    }
}

impl FeedConfig {
    pub fn with_window_radius(mut self, radius: usize) -> Self {
        self.window_radius = radius;
        self
    }

    pub fn with_prefetch_trigger_distance(mut self, distance: usize) -> Self {
        self.prefetch_trigger_distance = distance;
        self
    }

    pub fn with_visibility(mut self, visibility: VisibilityConfig) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_network(mut self, network: NetworkConfig) -> Self {
        self.network = network;
        self
    }

    /// Convenience for tests: settle period in one call.
    pub fn with_settle_period(mut self, settle: Duration) -> Self {
        self.visibility.settle_period = settle;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FeedConfig::default();
        assert_eq!(config.window_radius, 1);
        assert_eq!(config.prefetch_trigger_distance, 2);
        assert_eq!(config.visibility.settle_period, Duration::from_millis(300));
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_builders() {
        let config = FeedConfig::default()
            .with_window_radius(3)
            .with_settle_period(Duration::from_millis(100));
        assert_eq!(config.window_radius, 3);
        assert_eq!(config.visibility.settle_period, Duration::from_millis(100));
    }
}
