//! Atomic feed counters.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use super::snapshot::TelemetrySnapshot;
use crate::playback::MediaErrorKind;

/// Number of startup-latency samples retained for percentiles.
pub const LATENCY_SAMPLE_CAPACITY: usize = 256;

/// Shared counters for one feed.
///
/// All recording methods take `&self` and are safe to call from any thread;
/// wrap in an `Arc` to share between the controller and a reporting task.
#[derive(Debug, Default)]
pub struct FeedMetrics {
    activations: AtomicU64,
    transport_errors: AtomicU64,
    format_errors: AtomicU64,
    decode_errors: AtomicU64,
    retries_scheduled: AtomicU64,
    slots_exhausted: AtomicU64,
    manual_retries: AtomicU64,
    stale_callbacks: AtomicU64,
    engines_created: AtomicU64,
    engines_destroyed: AtomicU64,
    pages_loaded: AtomicU64,
    items_loaded: AtomicU64,
    catalog_failures: AtomicU64,

    /// Most recent startup latencies, oldest first.
    latencies: Mutex<VecDeque<Duration>>,
}

impl FeedMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// A new position was confirmed active.
    pub fn activation(&self) {
        self.activations.fetch_add(1, Ordering::Relaxed);
    }

    /// An engine reported a fatal error.
    pub fn media_error(&self, kind: MediaErrorKind) {
        let counter = match kind {
            MediaErrorKind::Transport => &self.transport_errors,
            MediaErrorKind::Format => &self.format_errors,
            MediaErrorKind::Decode => &self.decode_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// A retry was scheduled.
    pub fn retry_scheduled(&self) {
        self.retries_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    /// A slot gave up.
    pub fn slot_exhausted(&self) {
        self.slots_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    /// The user asked a failed slot to try again.
    pub fn manual_retry(&self) {
        self.manual_retries.fetch_add(1, Ordering::Relaxed);
    }

    /// An engine callback arrived for an abandoned attach.
    pub fn stale_callback(&self) {
        self.stale_callbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// An engine handle was created.
    pub fn engine_created(&self) {
        self.engines_created.fetch_add(1, Ordering::Relaxed);
    }

    /// An engine handle was destroyed.
    pub fn engine_destroyed(&self) {
        self.engines_destroyed.fetch_add(1, Ordering::Relaxed);
    }

    /// A catalog page arrived.
    pub fn page_loaded(&self, items: usize) {
        self.pages_loaded.fetch_add(1, Ordering::Relaxed);
        self.items_loaded.fetch_add(items as u64, Ordering::Relaxed);
    }

    /// A catalog fetch failed.
    pub fn catalog_failure(&self) {
        self.catalog_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record time from intent-to-play to first frame.
    pub fn startup_latency(&self, latency: Duration) {
        let mut samples = self.latencies.lock();
        if samples.len() == LATENCY_SAMPLE_CAPACITY {
            samples.pop_front();
        }
        samples.push_back(latency);
    }

    /// Engines created and not yet destroyed.
    pub fn live_engines(&self) -> u64 {
        let created = self.engines_created.load(Ordering::Relaxed);
        let destroyed = self.engines_destroyed.load(Ordering::Relaxed);
        created.saturating_sub(destroyed)
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        let mut latencies: Vec<Duration> = self.latencies.lock().iter().copied().collect();
        latencies.sort_unstable();

        TelemetrySnapshot {
            activations: self.activations.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            format_errors: self.format_errors.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            retries_scheduled: self.retries_scheduled.load(Ordering::Relaxed),
            slots_exhausted: self.slots_exhausted.load(Ordering::Relaxed),
            manual_retries: self.manual_retries.load(Ordering::Relaxed),
            stale_callbacks: self.stale_callbacks.load(Ordering::Relaxed),
            engines_created: self.engines_created.load(Ordering::Relaxed),
            live_engines: self.live_engines(),
            pages_loaded: self.pages_loaded.load(Ordering::Relaxed),
            items_loaded: self.items_loaded.load(Ordering::Relaxed),
            catalog_failures: self.catalog_failures.load(Ordering::Relaxed),
            startup_latency_samples: latencies.len(),
            startup_latency_p50_ms: percentile_ms(&latencies, 50),
            startup_latency_p95_ms: percentile_ms(&latencies, 95),
        }
    }
}

/// Nearest-rank percentile of sorted samples, in milliseconds.
fn percentile_ms(sorted: &[Duration], pct: usize) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = (pct * sorted.len()).div_ceil(100).max(1);
    sorted[rank - 1].as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_new_metrics_are_zero() {
        let snapshot = FeedMetrics::new().snapshot();
        assert_eq!(snapshot.activations, 0);
        assert_eq!(snapshot.live_engines, 0);
        assert_eq!(snapshot.startup_latency_samples, 0);
        assert_eq!(snapshot.startup_latency_p95_ms, 0);
    }

    #[test]
    fn test_error_counters_by_kind() {
        let metrics = FeedMetrics::new();
        metrics.media_error(MediaErrorKind::Transport);
        metrics.media_error(MediaErrorKind::Transport);
        metrics.media_error(MediaErrorKind::Decode);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.transport_errors, 2);
        assert_eq!(snapshot.format_errors, 0);
        assert_eq!(snapshot.decode_errors, 1);
        assert_eq!(snapshot.total_media_errors(), 3);
    }

    #[test]
    fn test_live_engines() {
        let metrics = FeedMetrics::new();
        metrics.engine_created();
        metrics.engine_created();
        metrics.engine_destroyed();
        assert_eq!(metrics.live_engines(), 1);
    }

    #[test]
    fn test_latency_percentiles() {
        let metrics = FeedMetrics::new();
        for ms in 1..=100 {
            metrics.startup_latency(Duration::from_millis(ms));
        }
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.startup_latency_p50_ms, 50);
        assert_eq!(snapshot.startup_latency_p95_ms, 95);
    }

    #[test]
    fn test_latency_ring_is_bounded() {
        let metrics = FeedMetrics::new();
        for ms in 0..(LATENCY_SAMPLE_CAPACITY as u64 + 50) {
            metrics.startup_latency(Duration::from_millis(ms));
        }
        assert_eq!(
            metrics.snapshot().startup_latency_samples,
            LATENCY_SAMPLE_CAPACITY
        );
    }

    #[test]
    fn test_thread_safe_counting() {
        use std::thread;

        let metrics = Arc::new(FeedMetrics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..100 {
                        metrics.activation();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.snapshot().activations, 800);
    }
}
