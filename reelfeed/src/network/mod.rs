//! Network-adaptive prefetch budget.
//!
//! The [`NetworkQualityMonitor`] turns connection samples from the host into a
//! [`NetworkBudget`] limiting how many neighbors of the active item may be
//! preloaded, in which direction, and with how much forward buffer.
//!
//! | Tier | Prefetch | Direction | Buffer |
//! |------|----------|-----------|--------|
//! | fast | 2 | both | 30 s |
//! | medium | 1 | forward | 15 s |
//! | slow | 0 | none | 5 s |

mod budget;
mod monitor;

pub use budget::{
    ConnectionSample, EffectiveConnectionType, NetworkBudget, PrefetchDirection, SpeedTier,
};
pub use monitor::{
    NetworkConfig, NetworkQualityMonitor, DEFAULT_FAST_DOWNLINK_MBPS, DEFAULT_FAST_RTT,
    DEFAULT_RECOMPUTE_INTERVAL, DEFAULT_RTT_CEILING, DEFAULT_SLOW_DOWNLINK_MBPS,
};
