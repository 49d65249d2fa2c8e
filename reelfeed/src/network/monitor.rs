//! Connection quality monitoring for adaptive prefetch.
//!
//! Derives a [`SpeedTier`] from connection samples and maps it to a
//! [`NetworkBudget`].
//!
//! # Detection Logic
//!
//! ```text
//! Slow:   save-data OR RTT > ceiling OR type in {slow-2g, 2g} OR downlink < 1 Mbps
//! Fast:   type = 4g AND downlink >= 5 Mbps AND RTT <= 150 ms (unknowns count as met)
//! Medium: everything else
//! ```
//!
//! # Throttling
//!
//! Connection-change events can arrive in bursts (wifi handover, tunnels).
//! The budget is recomputed at most once per throttle interval; a sample that
//! arrives inside the interval is held and applied when the interval elapses,
//! so the newest reading always wins without thrashing prefetch decisions.

use std::time::{Duration, Instant};

use super::budget::{ConnectionSample, EffectiveConnectionType, NetworkBudget, SpeedTier};

/// Default minimum time between budget recomputations.
pub const DEFAULT_RECOMPUTE_INTERVAL: Duration = Duration::from_secs(5);

/// Default round-trip time above which the connection is treated as slow.
pub const DEFAULT_RTT_CEILING: Duration = Duration::from_millis(400);

/// Default round-trip time at or below which a 4g connection can be fast.
pub const DEFAULT_FAST_RTT: Duration = Duration::from_millis(150);

/// Default downlink at or above which a 4g connection can be fast.
pub const DEFAULT_FAST_DOWNLINK_MBPS: f64 = 5.0;

/// Default downlink below which the connection is slow.
pub const DEFAULT_SLOW_DOWNLINK_MBPS: f64 = 1.0;

/// Thresholds for tier derivation.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkConfig {
    /// Minimum time between recomputations.
    pub recompute_interval: Duration,

    /// RTT above which the connection is slow.
    pub rtt_ceiling: Duration,

    /// RTT at or below which the connection may be fast.
    pub fast_rtt: Duration,

    /// Downlink at or above which the connection may be fast.
    pub fast_downlink_mbps: f64,

    /// Downlink below which the connection is slow.
    pub slow_downlink_mbps: f64,

    /// Budget used before the first sample arrives.
    pub initial_budget: NetworkBudget,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            recompute_interval: DEFAULT_RECOMPUTE_INTERVAL,
            rtt_ceiling: DEFAULT_RTT_CEILING,
            fast_rtt: DEFAULT_FAST_RTT,
            fast_downlink_mbps: DEFAULT_FAST_DOWNLINK_MBPS,
            slow_downlink_mbps: DEFAULT_SLOW_DOWNLINK_MBPS,
            initial_budget: NetworkBudget::default(),
        }
    }
}

/// Tracks connection samples and publishes the current prefetch budget.
#[derive(Debug)]
pub struct NetworkQualityMonitor {
    config: NetworkConfig,

    /// Budget currently in force.
    budget: NetworkBudget,

    /// When the budget was last recomputed.
    last_recompute: Option<Instant>,

    /// Sample waiting for the throttle interval to elapse.
    pending: Option<ConnectionSample>,
}

impl NetworkQualityMonitor {
    /// Create a monitor with the given thresholds.
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            budget: config.initial_budget,
            config,
            last_recompute: None,
            pending: None,
        }
    }

    /// Create with default thresholds.
    pub fn with_defaults() -> Self {
        Self::new(NetworkConfig::default())
    }

    /// Budget currently in force.
    pub fn budget(&self) -> NetworkBudget {
        self.budget
    }

    /// Record a connection sample.
    ///
    /// # Returns
    ///
    /// The new budget if it changed as a result of this sample, `None` if it
    /// is unchanged or the sample was deferred by throttling.
    pub fn observe(&mut self, sample: ConnectionSample, now: Instant) -> Option<NetworkBudget> {
        if self.is_throttled(now) {
            tracing::trace!(?sample, "Connection sample deferred by throttle");
            self.pending = Some(sample);
            return None;
        }
        self.apply(sample, now)
    }

    /// Apply a deferred sample once the throttle interval has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<NetworkBudget> {
        if self.pending.is_none() || self.is_throttled(now) {
            return None;
        }
        let sample = self.pending.take()?;
        self.apply(sample, now)
    }

    /// When a deferred sample will be applied, if one is waiting.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (&self.pending, self.last_recompute) {
            (Some(_), Some(last)) => Some(last + self.config.recompute_interval),
            _ => None,
        }
    }

    /// Derive a tier from a sample (without throttling).
    pub fn classify(&self, sample: &ConnectionSample) -> SpeedTier {
        let rtt_too_high = sample
            .rtt
            .is_some_and(|rtt| rtt > self.config.rtt_ceiling);
        let downlink_too_low = sample
            .downlink_mbps
            .is_some_and(|mbps| mbps < self.config.slow_downlink_mbps);
        let slow_type = matches!(
            sample.effective_type,
            EffectiveConnectionType::Slow2g | EffectiveConnectionType::TwoG
        );

        if sample.save_data || rtt_too_high || downlink_too_low || slow_type {
            return SpeedTier::Slow;
        }

        let fast_downlink = sample
            .downlink_mbps
            .map_or(true, |mbps| mbps >= self.config.fast_downlink_mbps);
        let fast_rtt = sample.rtt.map_or(true, |rtt| rtt <= self.config.fast_rtt);

        if sample.effective_type == EffectiveConnectionType::FourG && fast_downlink && fast_rtt {
            SpeedTier::Fast
        } else {
            SpeedTier::Medium
        }
    }

    fn is_throttled(&self, now: Instant) -> bool {
        self.last_recompute.is_some_and(|last| {
            now.saturating_duration_since(last) < self.config.recompute_interval
        })
    }

    fn apply(&mut self, sample: ConnectionSample, now: Instant) -> Option<NetworkBudget> {
        self.last_recompute = Some(now);
        self.pending = None;

        let tier = self.classify(&sample);
        let budget = NetworkBudget::for_tier(tier);
        if budget == self.budget {
            return None;
        }

        tracing::info!(
            from = %self.budget.tier,
            to = %tier,
            max_prefetch = budget.max_prefetch_count,
            direction = %budget.direction,
            "Network budget changed"
        );
        self.budget = budget;
        Some(budget)
    }
}

impl Default for NetworkQualityMonitor {
    fn default() -> Self {
        Self::with_defaults()
    }
}
