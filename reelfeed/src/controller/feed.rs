//! The feed orchestrator.
//!
//! # Architecture
//!
//! ```text
//! samples ──► VisibilityTracker ──confirmed──► FeedController ──► WindowManager
//!                                                  │                   │
//! connection ──► NetworkQualityMonitor ──budget────┤          mount window + prefetch set
//!                                                  ▼                   │
//! engine events ─────────────────────────────► SlotTable ◄─────────────┘
//! ```
//!
//! The controller is the single owner of the active position. All inputs
//! carry the current time, so the controller itself never reads a clock; the
//! host calls [`tick`](FeedController::tick) at
//! [`next_deadline`](FeedController::next_deadline).
//!
//! Reconciling the window always tears down departing slots before any new
//! slot attaches, so the number of live engines never exceeds the table size.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use super::events::FeedEvent;
use super::pagination::Pagination;
use crate::catalog::{CatalogError, CatalogPage, PageRequest};
use crate::config::FeedConfig;
use crate::feed::{FeedItem, FeedPosition, FeedSequence};
use crate::network::{ConnectionSample, NetworkBudget, NetworkQualityMonitor};
use crate::playback::{
    EngineEvent, EngineEventKind, EngineFactory, EventOutcome, PlaybackSlot, SlotEnv,
    SlotResources, SlotState, SlotTable,
};
use crate::preferences::{
    self, load_muted, load_saved_position, PreferenceStore, KEY_LAST_ITEM_ID, KEY_LAST_POSITION,
    KEY_MUTED,
};
use crate::telemetry::FeedMetrics;
use crate::visibility::{VisibilitySample, VisibilityTracker};
use crate::window::{MountWindow, PrefetchSet, WindowManager};

/// Orchestrates visibility, windowing, prefetch and playback for one feed.
pub struct FeedController {
    items: FeedSequence,
    active: Option<FeedPosition>,
    window: WindowManager,
    mounted: Option<MountWindow>,
    slots: SlotTable,
    resources: SlotResources,
    tracker: VisibilityTracker,
    monitor: NetworkQualityMonitor,
    pagination: Pagination,
    preferences: Box<dyn PreferenceStore>,
    muted: bool,
    metrics: Arc<FeedMetrics>,
    events: Vec<FeedEvent>,
    shut_down: bool,
}

impl FeedController {
    /// Create a controller with fresh metrics.
    pub fn new(
        config: FeedConfig,
        factory: Box<dyn EngineFactory>,
        preferences: Box<dyn PreferenceStore>,
    ) -> Self {
        Self::with_metrics(config, factory, preferences, Arc::new(FeedMetrics::new()))
    }

    /// Create a controller recording into shared metrics.
    pub fn with_metrics(
        config: FeedConfig,
        factory: Box<dyn EngineFactory>,
        preferences: Box<dyn PreferenceStore>,
        metrics: Arc<FeedMetrics>,
    ) -> Self {
        let muted = load_muted(preferences.as_ref());
        let window = WindowManager::new(config.window_radius);

        Self {
            items: FeedSequence::new(),
            active: None,
            window,
            mounted: None,
            slots: SlotTable::for_radius(config.window_radius),
            resources: SlotResources::new(factory, config.retry.clone(), Arc::clone(&metrics)),
            tracker: VisibilityTracker::new(config.visibility.clone()),
            monitor: NetworkQualityMonitor::new(config.network.clone()),
            pagination: Pagination::new(config.prefetch_trigger_distance),
            preferences,
            muted,
            metrics,
            events: Vec::new(),
            shut_down: false,
        }
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Confirmed active position.
    pub fn active(&self) -> Option<FeedPosition> {
        self.active
    }

    /// Loaded items.
    pub fn items(&self) -> &FeedSequence {
        &self.items
    }

    /// Item at a position.
    pub fn item(&self, position: FeedPosition) -> Option<&FeedItem> {
        self.items.get(position)
    }

    /// Currently mounted range.
    pub fn mount_window(&self) -> Option<MountWindow> {
        self.mounted
    }

    /// Whether a slot is mounted at `position`.
    pub fn is_mounted(&self, position: FeedPosition) -> bool {
        self.slots.contains(position)
    }

    /// Mounted positions in ascending order.
    pub fn mounted_positions(&self) -> Vec<FeedPosition> {
        self.slots.positions()
    }

    /// Lifecycle state of the slot at `position`.
    pub fn slot_state(&self, position: FeedPosition) -> Option<SlotState> {
        self.slots.get(position).map(PlaybackSlot::state)
    }

    /// Slot at `position`.
    pub fn slot(&self, position: FeedPosition) -> Option<&PlaybackSlot> {
        self.slots.get(position)
    }

    /// Slots holding an engine handle.
    pub fn live_engine_count(&self) -> usize {
        self.slots.live_engine_count()
    }

    /// Budget in force.
    pub fn budget(&self) -> NetworkBudget {
        self.monitor.budget()
    }

    /// Prefetch set for the current window and budget.
    pub fn prefetch_set(&self) -> PrefetchSet {
        match (self.mounted, self.active) {
            (Some(window), Some(active)) => {
                let budget = self.monitor.budget();
                self.window.prefetch_set(window, active, &budget)
            }
            _ => PrefetchSet::empty(),
        }
    }

    /// Mute preference for the playing item.
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Whether the catalog has more pages.
    pub fn has_more(&self) -> bool {
        self.pagination.has_more()
    }

    /// Whether a catalog fetch is in flight.
    pub fn is_fetching(&self) -> bool {
        self.pagination.is_in_flight()
    }

    /// Whether the last catalog fetch failed and awaits a manual retry.
    pub fn catalog_failed(&self) -> bool {
        self.pagination.has_failed()
    }

    /// Shared metrics.
    pub fn metrics(&self) -> Arc<FeedMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Take all notifications produced since the last call.
    pub fn drain_events(&mut self) -> Vec<FeedEvent> {
        std::mem::take(&mut self.events)
    }

    /// Earliest time [`tick`](Self::tick) has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.shut_down {
            return None;
        }
        [self.tracker.next_deadline(), self.monitor.next_deadline()]
            .into_iter()
            .chain(self.slots.iter().map(PlaybackSlot::next_deadline))
            .flatten()
            .min()
    }

    // -------------------------------------------------------------------------
    // Pagination
    // -------------------------------------------------------------------------

    /// The catalog fetch to start now, if one is needed.
    ///
    /// The returned request is considered in flight until its result is
    /// passed to [`on_page`](Self::on_page).
    pub fn next_fetch(&mut self) -> Option<PageRequest> {
        if self.shut_down {
            return None;
        }
        let request = self.pagination.next_request(self.active, self.items.len())?;
        tracing::debug!(
            cursor = ?request.cursor,
            loaded = self.items.len(),
            "Requesting catalog page"
        );
        Some(request)
    }

    /// Deliver the result of a catalog fetch.
    pub fn on_page(&mut self, result: Result<CatalogPage, CatalogError>, now: Instant) {
        if self.shut_down {
            return;
        }
        match result {
            Ok(page) => {
                self.pagination.on_success(&page);
                let appended = self.items.append(page.items);
                self.metrics.page_loaded(appended);
                tracing::info!(
                    appended,
                    total = self.items.len(),
                    has_more = self.pagination.has_more(),
                    "Catalog page loaded"
                );
                self.events.push(FeedEvent::PageLoaded {
                    appended,
                    total: self.items.len(),
                    has_more: self.pagination.has_more(),
                });

                if self.active.is_none() && !self.items.is_empty() {
                    let initial = self.restored_position();
                    self.tracker.reset_to(initial);
                    self.confirm_active(initial, now);
                } else {
                    self.reconcile(now);
                }
            }
            Err(error) => {
                self.pagination.on_failure();
                self.metrics.catalog_failure();
                tracing::warn!(error = %error, "Catalog fetch failed");
                self.events.push(FeedEvent::CatalogFailed { error });
            }
        }
    }

    /// Allow fetching again after a catalog failure.
    pub fn retry_catalog(&mut self) -> bool {
        let retried = self.pagination.retry();
        if retried {
            tracing::info!("Catalog fetch re-enabled");
        }
        retried
    }

    // -------------------------------------------------------------------------
    // Visibility and navigation
    // -------------------------------------------------------------------------

    /// Feed a batch of intersection samples.
    pub fn observe_visibility(&mut self, samples: &[VisibilitySample], now: Instant) {
        if self.shut_down {
            return;
        }
        self.tracker.observe(samples, now);
        self.poll_visibility(now);
    }

    /// Run every timer that is due at `now`.
    pub fn tick(&mut self, now: Instant) {
        if self.shut_down {
            return;
        }
        self.poll_visibility(now);

        if let Some(budget) = self.monitor.poll(now) {
            self.apply_budget(budget, now);
        }

        for position in self.slots.positions() {
            self.drive(position, now, |slot, env| slot.poll_retry(env));
        }
    }

    /// Make `position` active immediately, cancelling any pending candidate.
    pub fn go_to(&mut self, position: FeedPosition, now: Instant) -> bool {
        if self.shut_down || position.index() >= self.items.len() {
            return false;
        }
        self.tracker.reset_to(position);
        self.confirm_active(position, now);
        true
    }

    /// Move to the following item.
    pub fn next(&mut self, now: Instant) -> bool {
        match self.active.and_then(|p| p.offset(1)) {
            Some(position) => self.go_to(position, now),
            None => false,
        }
    }

    /// Move to the preceding item.
    pub fn previous(&mut self, now: Instant) -> bool {
        match self.active.and_then(|p| p.offset(-1)) {
            Some(position) => self.go_to(position, now),
            None => false,
        }
    }

    // -------------------------------------------------------------------------
    // Playback inputs
    // -------------------------------------------------------------------------

    /// Deliver an engine callback.
    pub fn on_engine_event(&mut self, event: EngineEvent, now: Instant) {
        let position = event.ticket.position;
        let outcome = self
            .drive(position, now, |slot, env| slot.on_engine_event(event, env))
            .unwrap_or(EventOutcome::Stale);

        match (outcome, event.kind) {
            (EventOutcome::Stale, _) => {
                self.metrics.stale_callback();
                tracing::debug!(ticket = %event.ticket, "Ignoring stale engine callback");
            }
            (EventOutcome::Applied, EngineEventKind::Error { kind, fatal: true }) => {
                self.events.push(FeedEvent::SlotError { position, kind });
            }
            _ => {}
        }
    }

    /// Deliver a connection sample.
    pub fn on_connection_change(&mut self, sample: ConnectionSample, now: Instant) {
        if self.shut_down {
            return;
        }
        if let Some(budget) = self.monitor.observe(sample, now) {
            self.apply_budget(budget, now);
        }
    }

    /// User asked a failed slot to try again.
    pub fn retry_slot(&mut self, position: FeedPosition, now: Instant) -> bool {
        if self.shut_down {
            return false;
        }
        let retried = self
            .drive(position, now, |slot, env| slot.manual_retry(env))
            .unwrap_or(false);
        if retried {
            tracing::info!(position = %position, "Manual retry");
            self.reconcile(now);
        }
        retried
    }

    /// Set and persist the mute preference.
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        preferences::write(self.preferences.as_mut(), KEY_MUTED, &muted.to_string());
        if let Some(slot) = self.active.and_then(|p| self.slots.get_mut(p)) {
            slot.set_muted(muted);
        }
    }

    /// Release every engine and stop all timers. Idempotent.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.tracker.teardown();
        for mut slot in self.slots.drain_outside(None) {
            slot.teardown(&self.metrics);
            self.events.push(FeedEvent::Unmounted {
                position: slot.position(),
            });
        }
        self.mounted = None;
        self.shut_down = true;
        tracing::info!("Feed shut down");
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn poll_visibility(&mut self, now: Instant) {
        if let Some(position) = self.tracker.poll(now) {
            self.confirm_active(position, now);
        }
    }

    fn confirm_active(&mut self, position: FeedPosition, now: Instant) {
        if position.index() >= self.items.len() {
            tracing::debug!(
                position = %position,
                loaded = self.items.len(),
                "Ignoring activation past loaded items"
            );
            self.tracker.reject(self.active);
            return;
        }
        if self.active == Some(position) {
            return;
        }

        let from = self.active.replace(position);
        self.metrics.activation();
        tracing::info!(
            from = ?from.map(|p| p.index()),
            to = position.index(),
            "Active position changed"
        );
        self.events.push(FeedEvent::ActiveChanged { from, to: position });
        self.persist_position(position);
        self.reconcile(now);
    }

    fn persist_position(&mut self, position: FeedPosition) {
        let store = self.preferences.as_mut();
        preferences::write(store, KEY_LAST_POSITION, &position.index().to_string());
        if let Some(item) = self.items.get(position) {
            preferences::write(store, KEY_LAST_ITEM_ID, item.id.as_str());
        }
    }

    /// Position to start at: the saved item if it is loaded, then the saved
    /// index when no item id was saved, else the first item.
    fn restored_position(&self) -> FeedPosition {
        let saved = load_saved_position(self.preferences.as_ref());
        if let Some(id) = &saved.item_id {
            if let Some(position) = self.items.position_of(id) {
                return position;
            }
            tracing::debug!(item_id = %id, "Saved item not in first page, starting at top");
            return FeedPosition(0);
        }
        match saved.position {
            Some(index) if index < self.items.len() => FeedPosition(index),
            _ => FeedPosition(0),
        }
    }

    fn apply_budget(&mut self, budget: NetworkBudget, now: Instant) {
        for slot in self.slots.iter_mut() {
            slot.set_budget(&budget);
        }
        self.events.push(FeedEvent::BudgetChanged { budget });
        self.reconcile(now);
    }

    /// Bring mounted slots in line with the active position and budget.
    fn reconcile(&mut self, now: Instant) {
        let Some(active) = self.active else {
            return;
        };
        let window = self.window.mount_window(active, self.items.len());

        // Departing slots release their engines before anything attaches.
        for mut slot in self.slots.drain_outside(window) {
            slot.teardown(&self.metrics);
            self.events.push(FeedEvent::Unmounted {
                position: slot.position(),
            });
        }
        self.mounted = window;

        let Some(window) = window else {
            return;
        };

        for position in window.positions() {
            if self.slots.contains(position) {
                continue;
            }
            let Some(item) = self.items.get(position).cloned() else {
                continue;
            };
            if let Some(mut displaced) = self.slots.insert(PlaybackSlot::new(position, item)) {
                tracing::warn!(
                    position = %displaced.position(),
                    "Slot cell still occupied, tearing down"
                );
                displaced.teardown(&self.metrics);
                self.events.push(FeedEvent::Unmounted {
                    position: displaced.position(),
                });
            }
            self.events.push(FeedEvent::Mounted { position });
        }

        for position in self.slots.positions() {
            if position != active {
                self.drive(position, now, |slot, env| slot.deactivate(env));
            }
        }
        self.drive(active, now, |slot, env| slot.activate(env));

        let prefetch = self
            .window
            .prefetch_set(window, active, &self.monitor.budget());
        for position in prefetch.iter() {
            self.drive(position, now, |slot, env| slot.start_preload(env));
        }
    }

    /// Run `f` against the slot at `position` and report any state change.
    fn drive<R>(
        &mut self,
        position: FeedPosition,
        now: Instant,
        f: impl FnOnce(&mut PlaybackSlot, &mut SlotEnv<'_>) -> R,
    ) -> Option<R> {
        let budget = self.monitor.budget();
        let muted = self.muted;
        let slot = self.slots.get_mut(position)?;
        let mut env = SlotEnv::new(&mut self.resources, budget, muted, now);

        let before = slot.state();
        let result = f(slot, &mut env);
        let after = slot.state();
        let thumbnail_url = slot.item().thumbnail_url.clone();

        if before != after {
            tracing::debug!(
                position = %position,
                from = %before,
                to = %after,
                "Slot state changed"
            );
            self.events.push(FeedEvent::SlotStateChanged {
                position,
                from: before,
                to: after,
            });
            if after == SlotState::Exhausted {
                self.events.push(FeedEvent::FallbackShown {
                    position,
                    thumbnail_url,
                });
            }
        }
        Some(result)
    }
}

impl fmt::Debug for FeedController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedController")
            .field("items", &self.items.len())
            .field("active", &self.active)
            .field("mounted", &self.mounted)
            .field("budget", &self.monitor.budget())
            .field("muted", &self.muted)
            .field("shut_down", &self.shut_down)
            .finish_non_exhaustive()
    }
}

impl Drop for FeedController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::testing::{EngineCall, RecordingFactory};
    use crate::preferences::MemoryPreferenceStore;
    use std::time::Duration;

    fn items(range: std::ops::Range<usize>) -> Vec<FeedItem> {
        range
            .map(|i| FeedItem::new(format!("item-{i}"), format!("https://cdn/{i}.m3u8")))
            .collect()
    }

    fn controller() -> (FeedController, RecordingFactory) {
        let factory = RecordingFactory::new();
        let controller = FeedController::new(
            FeedConfig::default(),
            Box::new(factory.clone()),
            Box::new(MemoryPreferenceStore::new()),
        );
        (controller, factory)
    }

    fn load(
        controller: &mut FeedController,
        range: std::ops::Range<usize>,
        has_more: bool,
        now: Instant,
    ) {
        controller.next_fetch();
        let cursor = has_more.then(|| range.end.to_string());
        controller.on_page(Ok(CatalogPage::new(items(range), cursor, has_more)), now);
    }

    #[test]
    fn test_first_page_activates_position_zero() {
        let (mut controller, _) = controller();
        let now = Instant::now();
        assert!(controller.next_fetch().is_some());
        controller.on_page(Ok(CatalogPage::new(items(0..10), Some("10".into()), true)), now);

        assert_eq!(controller.active(), Some(FeedPosition(0)));
        assert_eq!(
            controller.mounted_positions(),
            vec![FeedPosition(0), FeedPosition(1)]
        );
        assert_eq!(controller.slot_state(FeedPosition(0)), Some(SlotState::Preloading));

        let events = controller.drain_events();
        assert!(events.contains(&FeedEvent::ActiveChanged {
            from: None,
            to: FeedPosition(0)
        }));
    }

    #[test]
    fn test_default_budget_preloads_forward_neighbor() {
        let (mut controller, _) = controller();
        let now = Instant::now();
        load(&mut controller, 0..10, true, now);

        let neighbor = controller.slot(FeedPosition(1)).unwrap();
        assert_eq!(neighbor.state(), SlotState::Preloading);
        assert!(neighbor.is_preload());
    }

    #[test]
    fn test_next_and_previous() {
        let (mut controller, _) = controller();
        let now = Instant::now();
        load(&mut controller, 0..3, false, now);

        assert!(controller.next(now));
        assert!(controller.next(now));
        assert!(!controller.next(now));
        assert_eq!(controller.active(), Some(FeedPosition(2)));

        assert!(controller.previous(now));
        assert_eq!(controller.active(), Some(FeedPosition(1)));
    }

    #[test]
    fn test_go_to_unloaded_position_rejected() {
        let (mut controller, _) = controller();
        let now = Instant::now();
        load(&mut controller, 0..3, false, now);
        assert!(!controller.go_to(FeedPosition(3), now));
    }

    #[test]
    fn test_catalog_failure_blocks_until_retry() {
        let (mut controller, _) = controller();
        let now = Instant::now();
        controller.next_fetch();
        controller.on_page(Err(CatalogError::Http { status: 502 }), now);

        assert!(controller.catalog_failed());
        assert!(controller.next_fetch().is_none());
        assert!(controller
            .drain_events()
            .iter()
            .any(|e| matches!(e, FeedEvent::CatalogFailed { .. })));

        assert!(controller.retry_catalog());
        assert!(controller.next_fetch().is_some());
    }

    #[test]
    fn test_mute_applies_to_playing_slot() {
        let (mut controller, factory) = controller();
        let now = Instant::now();
        load(&mut controller, 0..3, false, now);
        assert!(controller.is_muted());

        let ticket = factory.last_ticket(FeedPosition(0)).unwrap();
        controller.on_engine_event(EngineEvent::ready(ticket), now);
        assert_eq!(controller.slot_state(FeedPosition(0)), Some(SlotState::Playing));

        factory.clear();
        controller.set_muted(false);
        assert!(factory.calls().contains(&EngineCall::SetMuted {
            position: FeedPosition(0),
            muted: false
        }));
    }

    #[test]
    fn test_next_deadline_tracks_settle_timer() {
        let (mut controller, _) = controller();
        let now = Instant::now();
        load(&mut controller, 0..5, false, now);
        assert_eq!(controller.next_deadline(), None);

        controller.observe_visibility(&[VisibilitySample::visible(1, 0.9)], now);
        assert_eq!(
            controller.next_deadline(),
            Some(now + Duration::from_millis(300))
        );

        controller.tick(now + Duration::from_millis(300));
        assert_eq!(controller.active(), Some(FeedPosition(1)));
    }

    #[test]
    fn test_shutdown_releases_everything() {
        let (mut controller, factory) = controller();
        let now = Instant::now();
        load(&mut controller, 0..5, false, now);
        assert!(factory.live_engines() > 0);

        controller.shutdown();
        controller.shutdown();
        assert_eq!(factory.live_engines(), 0);
        assert_eq!(controller.live_engine_count(), 0);
        assert!(controller.mounted_positions().is_empty());
        assert!(controller.next_fetch().is_none());
    }
}
