//! Active-position detection with settle hysteresis.
//!
//! Scroll motion produces a stream of intersection samples. The tracker keeps
//! the latest ratio per position, picks the most visible position above the
//! confidence threshold, and only confirms it once it has stayed the
//! candidate for the whole settle period. A fling across A → B → C therefore
//! confirms only C.
//!
//! ```text
//!  samples ──► ratios ──► candidate ──(unchanged for settle)──► emit
//!                             │
//!                     changed │ restart settle timer
//!                     none    │ drop pending
//! ```

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::feed::FeedPosition;

/// Default ratio a position must exceed to become a candidate.
pub const DEFAULT_VISIBILITY_THRESHOLD: f64 = 0.6;

/// Default time a candidate must persist before it is confirmed.
pub const DEFAULT_SETTLE_PERIOD: Duration = Duration::from_millis(300);

/// Configuration for visibility tracking.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibilityConfig {
    /// Intersection ratio a position must exceed (strictly).
    pub threshold: f64,

    /// How long a candidate must remain the most visible position.
    pub settle_period: Duration,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_VISIBILITY_THRESHOLD,
            settle_period: DEFAULT_SETTLE_PERIOD,
        }
    }
}

impl VisibilityConfig {
    /// Create a configuration.
    pub fn new(threshold: f64, settle_period: Duration) -> Self {
        Self {
            threshold,
            settle_period,
        }
    }
}

/// One intersection observation for one position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilitySample {
    /// Observed position.
    pub position: FeedPosition,

    /// Fraction of the item inside the viewport, 0.0 to 1.0.
    pub ratio: f64,

    /// Whether the item intersects the viewport at all.
    pub is_intersecting: bool,
}

impl VisibilitySample {
    /// Sample with an explicit intersecting flag.
    pub fn new(position: impl Into<FeedPosition>, ratio: f64, is_intersecting: bool) -> Self {
        Self {
            position: position.into(),
            ratio,
            is_intersecting,
        }
    }

    /// Sample for a position that is visible at `ratio`.
    pub fn visible(position: impl Into<FeedPosition>, ratio: f64) -> Self {
        Self::new(position, ratio, ratio > 0.0)
    }

    /// Sample for a position that left the viewport.
    pub fn hidden(position: impl Into<FeedPosition>) -> Self {
        Self::new(position, 0.0, false)
    }
}

/// A candidate waiting out its settle period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingActivation {
    /// Candidate position.
    pub position: FeedPosition,

    /// When the candidate will be confirmed.
    pub fire_at: Instant,
}

/// Debounced detector of the single active position.
#[derive(Debug)]
pub struct VisibilityTracker {
    config: VisibilityConfig,

    /// Latest ratio per intersecting position.
    ratios: BTreeMap<FeedPosition, f64>,

    pending: Option<PendingActivation>,

    last_emitted: Option<FeedPosition>,
}

impl VisibilityTracker {
    /// Create a tracker with the given threshold and settle period.
    pub fn new(config: VisibilityConfig) -> Self {
        Self {
            config,
            ratios: BTreeMap::new(),
            pending: None,
            last_emitted: None,
        }
    }

    /// Create with the default threshold and settle period.
    pub fn with_defaults() -> Self {
        Self::new(VisibilityConfig::default())
    }

    /// Feed a batch of samples.
    ///
    /// Never emits directly; confirmation happens in [`poll`](Self::poll) once
    /// the settle period has elapsed.
    pub fn observe(&mut self, samples: &[VisibilitySample], now: Instant) {
        for sample in samples {
            if sample.is_intersecting && sample.ratio.is_finite() && sample.ratio > 0.0 {
                self.ratios.insert(sample.position, sample.ratio.min(1.0));
            } else {
                self.ratios.remove(&sample.position);
            }
        }

        let Some(candidate) = self.candidate() else {
            if let Some(dropped) = self.pending.take() {
                tracing::trace!(
                    position = %dropped.position,
                    "No confident candidate, dropping pending activation"
                );
            }
            return;
        };

        if Some(candidate) == self.last_emitted {
            // Scrolled back to the confirmed item before the timer fired
            self.pending = None;
            return;
        }

        match self.pending {
            Some(pending) if pending.position == candidate => {}
            _ => {
                self.pending = Some(PendingActivation {
                    position: candidate,
                    fire_at: now + self.config.settle_period,
                });
            }
        }
    }

    /// Confirm the pending candidate if its settle period has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<FeedPosition> {
        let pending = self.pending?;
        if now < pending.fire_at {
            return None;
        }
        self.pending = None;
        self.last_emitted = Some(pending.position);
        Some(pending.position)
    }

    /// When the pending candidate will be confirmed.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.map(|p| p.fire_at)
    }

    /// Candidate currently waiting, if any.
    pub fn pending(&self) -> Option<PendingActivation> {
        self.pending
    }

    /// Drop any pending candidate.
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Most recently confirmed position.
    pub fn last_emitted(&self) -> Option<FeedPosition> {
        self.last_emitted
    }

    /// Treat `position` as confirmed without waiting (programmatic navigation).
    pub fn reset_to(&mut self, position: FeedPosition) {
        self.pending = None;
        self.last_emitted = Some(position);
    }

    /// Undo a confirmation the owner refused; `confirmed` stays the last
    /// emitted position.
    ///
    /// Samples for the refused position re-arm a fresh candidate.
    pub fn reject(&mut self, confirmed: Option<FeedPosition>) {
        self.pending = None;
        self.last_emitted = confirmed;
    }

    /// Clear all state.
    pub fn teardown(&mut self) {
        self.ratios.clear();
        self.pending = None;
    }

    /// Most visible position above the threshold; ties go to the lower position.
    fn candidate(&self) -> Option<FeedPosition> {
        let mut best: Option<(FeedPosition, f64)> = None;
        for (&position, &ratio) in &self.ratios {
            if ratio <= self.config.threshold {
                continue;
            }
            if best.map_or(true, |(_, r)| ratio > r) {
                best = Some((position, ratio));
            }
        }
        best.map(|(position, _)| position)
    }
}

impl Default for VisibilityTracker {
    fn default() -> Self {
        Self::with_defaults()
    }
}
