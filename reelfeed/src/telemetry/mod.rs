//! Feed telemetry for observability and user feedback.
//!
//! Lock-free atomic counters record what the playback slots and the
//! controller do; a snapshot copies them into a serializable view.
//!
//! # Architecture
//!
//! ```text
//! Slots / Controller ─────► FeedMetrics ─────► TelemetrySnapshot ─────► Views
//!                          (atomic counters)   (point-in-time copy)     (CLI, UI)
//! ```
//!
//! # Example
//!
//! ```
//! use reelfeed::telemetry::FeedMetrics;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let metrics = Arc::new(FeedMetrics::new());
//!
//! metrics.activation();
//! metrics.startup_latency(Duration::from_millis(180));
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.activations, 1);
//! assert_eq!(snapshot.startup_latency_p50_ms, 180);
//! ```

mod metrics;
mod snapshot;

pub use metrics::{FeedMetrics, LATENCY_SAMPLE_CAPACITY};
pub use snapshot::TelemetrySnapshot;
