//! Viewport visibility tracking.

mod tracker;

pub use tracker::{
    PendingActivation, VisibilityConfig, VisibilitySample, VisibilityTracker,
    DEFAULT_SETTLE_PERIOD, DEFAULT_VISIBILITY_THRESHOLD,
};
