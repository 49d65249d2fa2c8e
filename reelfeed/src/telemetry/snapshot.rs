//! Point-in-time telemetry view.

use std::fmt;

use serde::Serialize;

/// Copy of [`FeedMetrics`](super::FeedMetrics) at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TelemetrySnapshot {
    pub activations: u64,
    pub transport_errors: u64,
    pub format_errors: u64,
    pub decode_errors: u64,
    pub retries_scheduled: u64,
    pub slots_exhausted: u64,
    pub manual_retries: u64,
    pub stale_callbacks: u64,
    pub engines_created: u64,
    pub live_engines: u64,
    pub pages_loaded: u64,
    pub items_loaded: u64,
    pub catalog_failures: u64,
    pub startup_latency_samples: usize,
    pub startup_latency_p50_ms: u64,
    pub startup_latency_p95_ms: u64,
}

impl TelemetrySnapshot {
    /// Fatal media errors of any kind.
    pub fn total_media_errors(&self) -> u64 {
        self.transport_errors + self.format_errors + self.decode_errors
    }

    /// JSON rendering for machine consumers.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for TelemetrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Activations:       {}", self.activations)?;
        writeln!(
            f,
            "Startup latency:   p50 {} ms, p95 {} ms ({} samples)",
            self.startup_latency_p50_ms, self.startup_latency_p95_ms, self.startup_latency_samples
        )?;
        writeln!(
            f,
            "Media errors:      {} (transport {}, format {}, decode {})",
            self.total_media_errors(),
            self.transport_errors,
            self.format_errors,
            self.decode_errors
        )?;
        writeln!(f, "Retries:           {}", self.retries_scheduled)?;
        writeln!(f, "Exhausted slots:   {}", self.slots_exhausted)?;
        writeln!(f, "Manual retries:    {}", self.manual_retries)?;
        writeln!(f, "Stale callbacks:   {}", self.stale_callbacks)?;
        writeln!(
            f,
            "Engines:           {} created, {} live",
            self.engines_created, self.live_engines
        )?;
        write!(
            f,
            "Catalog:           {} pages, {} items, {} failures",
            self.pages_loaded, self.items_loaded, self.catalog_failures
        )
    }
}
