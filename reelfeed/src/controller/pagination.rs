//! Cursor pagination state.
//!
//! At most one fetch is ever in flight. A failed fetch blocks further
//! fetching until [`Pagination::retry`] is called; nothing retries a catalog
//! failure automatically.

use crate::catalog::{CatalogPage, PageRequest};
use crate::feed::FeedPosition;

#[derive(Debug, Clone)]
pub(crate) struct Pagination {
    cursor: Option<String>,
    has_more: bool,
    in_flight: bool,
    failed: bool,

    /// Fetch once the active position is this close to the last loaded item.
    trigger_distance: usize,
}

impl Pagination {
    pub(crate) fn new(trigger_distance: usize) -> Self {
        Self {
            cursor: None,
            has_more: true,
            in_flight: false,
            failed: false,
            trigger_distance,
        }
    }

    /// The fetch to start now, if any. Marks it in flight.
    pub(crate) fn next_request(
        &mut self,
        active: Option<FeedPosition>,
        loaded: usize,
    ) -> Option<PageRequest> {
        if !self.has_more || self.in_flight || self.failed {
            return None;
        }

        let near_end = match active {
            _ if loaded == 0 => true,
            Some(active) => active.index() + 1 + self.trigger_distance >= loaded,
            None => false,
        };
        if !near_end {
            return None;
        }

        self.in_flight = true;
        Some(PageRequest {
            cursor: self.cursor.clone(),
        })
    }

    pub(crate) fn on_success(&mut self, page: &CatalogPage) {
        self.in_flight = false;
        self.failed = false;
        self.cursor = page.next_cursor.clone();
        self.has_more = page.has_more;

        if page.has_more && page.next_cursor.is_none() {
            tracing::warn!("Catalog reported more pages without a cursor, stopping pagination");
            self.has_more = false;
        }
    }

    pub(crate) fn on_failure(&mut self) {
        self.in_flight = false;
        self.failed = true;
    }

    /// Allow fetching again after a failure.
    pub(crate) fn retry(&mut self) -> bool {
        std::mem::replace(&mut self.failed, false)
    }

    pub(crate) fn has_more(&self) -> bool {
        self.has_more
    }

    pub(crate) fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub(crate) fn has_failed(&self) -> bool {
        self.failed
    }
}
