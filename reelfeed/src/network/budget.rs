//! Connection samples and the prefetch budget derived from them.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Coarse connection class reported by the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EffectiveConnectionType {
    /// Very slow cellular, under ~50 kbps.
    Slow2g,
    /// 2G-class cellular.
    TwoG,
    /// 3G-class cellular.
    ThreeG,
    /// 4G/LTE, wifi or better.
    #[default]
    FourG,
}

impl EffectiveConnectionType {
    /// Parses the host's `effectiveType` string (`slow-2g`, `2g`, `3g`, `4g`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "slow-2g" => Some(Self::Slow2g),
            "2g" => Some(Self::TwoG),
            "3g" => Some(Self::ThreeG),
            "4g" => Some(Self::FourG),
            _ => None,
        }
    }
}

/// One reading of the connection characteristics.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConnectionSample {
    /// Effective connection type.
    pub effective_type: EffectiveConnectionType,

    /// Downlink estimate in megabits per second, if reported.
    pub downlink_mbps: Option<f64>,

    /// Round-trip time estimate, if reported.
    pub rtt: Option<Duration>,

    /// User asked the platform to reduce data usage.
    pub save_data: bool,
}

impl ConnectionSample {
    /// Sample with only a connection type.
    pub fn new(effective_type: EffectiveConnectionType) -> Self {
        Self {
            effective_type,
            ..Self::default()
        }
    }

    /// Sets the downlink estimate.
    pub fn with_downlink(mut self, mbps: f64) -> Self {
        self.downlink_mbps = Some(mbps);
        self
    }

    /// Sets the round-trip time.
    pub fn with_rtt(mut self, rtt: Duration) -> Self {
        self.rtt = Some(rtt);
        self
    }

    /// Sets the reduce-data preference.
    pub fn with_save_data(mut self, save_data: bool) -> Self {
        self.save_data = save_data;
        self
    }
}

/// Speed tier derived from a connection sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedTier {
    /// Slow, metered or reduce-data connection.
    Slow,
    /// Usable but constrained connection.
    Medium,
    /// Fast connection.
    Fast,
}

impl SpeedTier {
    /// Parses `fast`, `medium` or `slow`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Some(Self::Fast),
            "medium" => Some(Self::Medium),
            "slow" => Some(Self::Slow),
            _ => None,
        }
    }
}

impl fmt::Display for SpeedTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeedTier::Fast => write!(f, "fast"),
            SpeedTier::Medium => write!(f, "medium"),
            SpeedTier::Slow => write!(f, "slow"),
        }
    }
}

/// Which neighbors of the active position may be prefetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrefetchDirection {
    /// Items ahead of and behind the active one.
    Both,
    /// Only items ahead of the active one.
    Forward,
    /// No prefetch.
    None,
}

impl fmt::Display for PrefetchDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrefetchDirection::Both => write!(f, "both"),
            PrefetchDirection::Forward => write!(f, "forward"),
            PrefetchDirection::None => write!(f, "none"),
        }
    }
}

/// Prefetch policy for the current connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NetworkBudget {
    /// Speed tier the budget was derived from.
    pub tier: SpeedTier,

    /// Maximum number of neighbors to preload.
    pub max_prefetch_count: usize,

    /// Allowed prefetch direction.
    pub direction: PrefetchDirection,

    /// Forward buffer target handed to the decoding engine, in seconds.
    pub buffer_seconds: u32,
}

impl NetworkBudget {
    /// Budget for a fast connection.
    pub const FAST: NetworkBudget = NetworkBudget {
        tier: SpeedTier::Fast,
        max_prefetch_count: 2,
        direction: PrefetchDirection::Both,
        buffer_seconds: 30,
    };

    /// Budget for a medium connection.
    pub const MEDIUM: NetworkBudget = NetworkBudget {
        tier: SpeedTier::Medium,
        max_prefetch_count: 1,
        direction: PrefetchDirection::Forward,
        buffer_seconds: 15,
    };

    /// Budget for a slow or reduce-data connection.
    pub const SLOW: NetworkBudget = NetworkBudget {
        tier: SpeedTier::Slow,
        max_prefetch_count: 0,
        direction: PrefetchDirection::None,
        buffer_seconds: 5,
    };

    /// Budget preset for a tier.
    pub fn for_tier(tier: SpeedTier) -> Self {
        match tier {
            SpeedTier::Fast => Self::FAST,
            SpeedTier::Medium => Self::MEDIUM,
            SpeedTier::Slow => Self::SLOW,
        }
    }

    /// Whether any prefetch is allowed.
    pub fn allows_prefetch(&self) -> bool {
        self.max_prefetch_count > 0 && self.direction != PrefetchDirection::None
    }
}

impl Default for NetworkBudget {
    fn default() -> Self {
        Self::MEDIUM
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_type_parse() {
        assert_eq!(
            EffectiveConnectionType::parse("slow-2g"),
            Some(EffectiveConnectionType::Slow2g)
        );
        assert_eq!(
            EffectiveConnectionType::parse("4G"),
            Some(EffectiveConnectionType::FourG)
        );
        assert_eq!(EffectiveConnectionType::parse("5g"), None);
    }

    #[test]
    fn test_budget_presets() {
        assert_eq!(NetworkBudget::for_tier(SpeedTier::Fast).max_prefetch_count, 2);
        assert_eq!(
            NetworkBudget::for_tier(SpeedTier::Medium).direction,
            PrefetchDirection::Forward
        );
        assert!(!NetworkBudget::for_tier(SpeedTier::Slow).allows_prefetch());
        assert!(NetworkBudget::default().allows_prefetch());
    }

    #[test]
    fn test_tier_display_and_parse() {
        for tier in [SpeedTier::Fast, SpeedTier::Medium, SpeedTier::Slow] {
            assert_eq!(SpeedTier::parse(&tier.to_string()), Some(tier));
        }
    }
}
