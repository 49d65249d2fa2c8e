//! Notifications for the UI layer.

use crate::catalog::CatalogError;
use crate::feed::FeedPosition;
use crate::network::NetworkBudget;
use crate::playback::{MediaErrorKind, SlotState};

/// Something the UI should reflect.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// A new position was confirmed active.
    ActiveChanged {
        from: Option<FeedPosition>,
        to: FeedPosition,
    },

    /// A position entered the mount window.
    Mounted { position: FeedPosition },

    /// A position left the mount window; its engine has been released.
    Unmounted { position: FeedPosition },

    /// A slot changed lifecycle state.
    SlotStateChanged {
        position: FeedPosition,
        from: SlotState,
        to: SlotState,
    },

    /// An engine failed fatally.
    SlotError {
        position: FeedPosition,
        kind: MediaErrorKind,
    },

    /// A slot gave up; show the poster with a retry affordance.
    FallbackShown {
        position: FeedPosition,
        thumbnail_url: Option<String>,
    },

    /// A catalog page was appended.
    PageLoaded {
        appended: usize,
        total: usize,
        has_more: bool,
    },

    /// A catalog fetch failed; fetching stops until a manual retry.
    CatalogFailed { error: CatalogError },

    /// The prefetch budget changed.
    BudgetChanged { budget: NetworkBudget },
}
