//! Mount window and prefetch set computation.
//!
//! # Algorithm
//!
//! 1. Mount window: `[active - radius, active + radius]` clamped to the
//!    loaded feed. Contiguous, always contains `active`.
//! 2. Prefetch set: window positions other than `active`, ordered by
//!    priority for the budget's direction, truncated to the budget's count.
//!
//! ```text
//! direction = both, radius 2, active 5:   6, 4, 7, 3
//! direction = forward:                    6, 7
//! direction = none:                       (empty)
//! ```

use std::fmt;

use crate::feed::FeedPosition;
use crate::network::{NetworkBudget, PrefetchDirection};

/// Default number of positions mounted on each side of the active one.
pub const DEFAULT_WINDOW_RADIUS: usize = 1;

/// Inclusive, contiguous range of mounted positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MountWindow {
    start: FeedPosition,
    end: FeedPosition,
}

impl MountWindow {
    /// Window covering `start..=end`.
    ///
    /// The bounds are swapped if given in the wrong order.
    pub fn new(start: FeedPosition, end: FeedPosition) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// First mounted position.
    pub fn start(&self) -> FeedPosition {
        self.start
    }

    /// Last mounted position.
    pub fn end(&self) -> FeedPosition {
        self.end
    }

    /// Number of mounted positions.
    pub fn len(&self) -> usize {
        self.end.index() - self.start.index() + 1
    }

    /// A window always holds at least the active position.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether `position` is mounted.
    pub fn contains(&self, position: FeedPosition) -> bool {
        self.start <= position && position <= self.end
    }

    /// Mounted positions in ascending order.
    pub fn positions(&self) -> impl Iterator<Item = FeedPosition> {
        (self.start.index()..=self.end.index()).map(FeedPosition)
    }
}

impl fmt::Display for MountWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}..={}]", self.start.index(), self.end.index())
    }
}

/// Positions instructed to preload, highest priority first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefetchSet {
    positions: Vec<FeedPosition>,
}

impl PrefetchSet {
    /// Empty set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether `position` should preload.
    pub fn contains(&self, position: FeedPosition) -> bool {
        self.positions.contains(&position)
    }

    /// Number of positions to preload.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// True when nothing should preload.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Positions in priority order.
    pub fn positions(&self) -> &[FeedPosition] {
        &self.positions
    }

    /// Iterate in priority order.
    pub fn iter(&self) -> impl Iterator<Item = FeedPosition> + '_ {
        self.positions.iter().copied()
    }
}

/// Computes which positions are mounted and which preload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowManager {
    radius: usize,
}

impl WindowManager {
    /// Manager mounting `radius` positions either side of the active one.
    pub fn new(radius: usize) -> Self {
        Self { radius }
    }

    /// Mount radius.
    pub fn radius(&self) -> usize {
        self.radius
    }

    /// Maximum number of positions a window can hold.
    pub fn capacity(&self) -> usize {
        2 * self.radius + 1
    }

    /// Positions to mount around `active` in a feed of `len` items.
    ///
    /// `None` when the feed is empty. An `active` past the end is clamped to
    /// the last item.
    pub fn mount_window(&self, active: FeedPosition, len: usize) -> Option<MountWindow> {
        if len == 0 {
            return None;
        }
        let last = len - 1;
        let active = active.index().min(last);
        let start = active.saturating_sub(self.radius);
        let end = active.saturating_add(self.radius).min(last);
        Some(MountWindow::new(FeedPosition(start), FeedPosition(end)))
    }

    /// Neighbors of `active` within `window` to preload under `budget`.
    pub fn prefetch_set(
        &self,
        window: MountWindow,
        active: FeedPosition,
        budget: &NetworkBudget,
    ) -> PrefetchSet {
        if !budget.allows_prefetch() {
            return PrefetchSet::empty();
        }

        let mut positions = Vec::with_capacity(budget.max_prefetch_count);
        for distance in 1..=self.radius {
            if positions.len() >= budget.max_prefetch_count {
                break;
            }
            let ahead = active.offset(distance as isize).filter(|p| window.contains(*p));
            let behind = match budget.direction {
                PrefetchDirection::Both => active
                    .offset(-(distance as isize))
                    .filter(|p| window.contains(*p)),
                _ => None,
            };
            for position in [ahead, behind].into_iter().flatten() {
                if positions.len() < budget.max_prefetch_count {
                    positions.push(position);
                }
            }
        }

        PrefetchSet { positions }
    }
}

impl Default for WindowManager {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_RADIUS)
    }
}
