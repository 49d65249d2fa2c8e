//! Windowed mounting around the active position.
//!
//! Only a bounded neighborhood of the active item is mounted; memory and
//! decoder usage are independent of how long the feed grows.

mod manager;

pub use manager::{MountWindow, PrefetchSet, WindowManager, DEFAULT_WINDOW_RADIUS};
