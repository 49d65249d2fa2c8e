//! Integration tests for the feed controller.
//!
//! These drive a [`FeedController`] with recorded engines and explicit
//! timestamps, covering:
//! - windowed mounting and the live engine bound
//! - settle hysteresis during a fling
//! - retry backoff and exhaustion
//! - teardown ordering when the window jumps
//! - network budget changes and pagination
//!
//! Run with: `cargo test --test feed_controller_integration`

use std::time::{Duration, Instant};

use reelfeed::catalog::{CatalogError, CatalogPage};
use reelfeed::config::FeedConfig;
use reelfeed::network::{ConnectionSample, EffectiveConnectionType, NetworkBudget};
use reelfeed::playback::testing::{EngineCall, RecordingFactory};
use reelfeed::playback::{EngineEvent, MediaErrorKind, SlotState};
use reelfeed::preferences::{
    IniPreferenceStore, MemoryPreferenceStore, PreferenceStore, KEY_LAST_ITEM_ID,
    KEY_LAST_POSITION, KEY_MUTED,
};
use reelfeed::visibility::VisibilitySample;
use reelfeed::{FeedController, FeedEvent, FeedItem, FeedPosition};

// ============================================================================
// Helper Functions
// ============================================================================

fn pos(n: usize) -> FeedPosition {
    FeedPosition(n)
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn make_items(range: std::ops::Range<usize>) -> Vec<FeedItem> {
    range
        .map(|i| {
            FeedItem::new(format!("item-{i}"), format!("https://cdn.example/{i}.m3u8"))
                .with_thumbnail(format!("https://cdn.example/{i}.jpg"))
        })
        .collect()
}

fn page(range: std::ops::Range<usize>, has_more: bool) -> CatalogPage {
    let cursor = has_more.then(|| range.end.to_string());
    CatalogPage::new(make_items(range), cursor, has_more)
}

fn fast_sample() -> ConnectionSample {
    ConnectionSample::new(EffectiveConnectionType::FourG)
        .with_downlink(25.0)
        .with_rtt(ms(40))
}

struct Feed {
    controller: FeedController,
    engines: RecordingFactory,
    t0: Instant,
}

impl Feed {
    fn new(config: FeedConfig, store: Box<dyn PreferenceStore>) -> Self {
        let engines = RecordingFactory::new();
        let controller = FeedController::new(config, Box::new(engines.clone()), store);
        Self {
            controller,
            engines,
            t0: Instant::now(),
        }
    }

    fn with_defaults() -> Self {
        Self::new(FeedConfig::default(), Box::new(MemoryPreferenceStore::new()))
    }

    fn at(&self, offset_ms: u64) -> Instant {
        self.t0 + ms(offset_ms)
    }

    /// Fetch and deliver the first page at t0.
    fn load(&mut self, range: std::ops::Range<usize>, has_more: bool) {
        self.controller.next_fetch().expect("first page should be requested");
        self.controller.on_page(Ok(page(range, has_more)), self.t0);
    }

    fn ready(&mut self, position: usize, at: Instant) {
        let ticket = self.engines.last_ticket(pos(position)).expect("attached");
        self.controller.on_engine_event(EngineEvent::ready(ticket), at);
    }

    fn fail(&mut self, position: usize, kind: MediaErrorKind, at: Instant) {
        let ticket = self.engines.last_ticket(pos(position)).expect("attached");
        self.controller.on_engine_event(EngineEvent::fatal(ticket, kind), at);
    }
}

// ============================================================================
// Windowing and engine bounds
// ============================================================================

#[test]
fn test_mount_window_follows_active_position() {
    let mut feed = Feed::with_defaults();
    feed.load(0..20, false);

    for target in [1, 2, 10, 19, 18, 0] {
        let now = feed.at(0);
        assert!(feed.controller.go_to(pos(target), now));
        let mounted = feed.controller.mounted_positions();

        assert!(mounted.len() <= 3, "mounted {mounted:?}");
        assert!(mounted.contains(&pos(target)));
        for pair in mounted.windows(2) {
            assert_eq!(pair[0].index() + 1, pair[1].index(), "window must be contiguous");
        }
    }
}

#[test]
fn test_live_engines_never_exceed_window_during_scroll() {
    let config = FeedConfig::default().with_window_radius(2);
    let mut feed = Feed::new(config, Box::new(MemoryPreferenceStore::new()));
    feed.controller.on_connection_change(fast_sample(), feed.at(0));
    feed.load(0..200, false);

    for i in 1..200 {
        let now = feed.at(i as u64 * 50);
        feed.controller.go_to(pos(i), now);
        feed.ready(i, now);
        assert!(feed.controller.live_engine_count() <= 5);
    }

    assert!(feed.engines.peak_live_engines() <= 5);
    assert_eq!(
        feed.controller.metrics().snapshot().live_engines as usize,
        feed.engines.live_engines()
    );
}

#[test]
fn test_window_jump_tears_down_before_attaching() {
    let mut feed = Feed::with_defaults();
    feed.load(0..10, false);
    assert_eq!(feed.controller.mounted_positions(), vec![pos(0), pos(1)]);

    feed.engines.clear();
    feed.controller.go_to(pos(5), feed.at(10));
    assert_eq!(
        feed.controller.mounted_positions(),
        vec![pos(4), pos(5), pos(6)]
    );

    let calls = feed.engines.calls();
    let last_teardown = calls
        .iter()
        .rposition(|c| {
            matches!(c, EngineCall::Destroy { position } if position.index() <= 1)
        })
        .expect("old slots destroyed");
    let first_attach = calls
        .iter()
        .position(|c| matches!(c, EngineCall::Create { .. } | EngineCall::Attach { .. }))
        .expect("new slots attached");
    assert!(last_teardown < first_attach, "calls: {calls:#?}");

    let events = feed.controller.drain_events();
    assert!(events.contains(&FeedEvent::Unmounted { position: pos(0) }));
    assert!(events.contains(&FeedEvent::Mounted { position: pos(6) }));
}

// ============================================================================
// Visibility
// ============================================================================

#[test]
fn test_fling_confirms_only_final_item() {
    let mut feed = Feed::with_defaults();
    feed.load(0..10, true);
    feed.controller.drain_events();

    feed.controller.observe_visibility(
        &[VisibilitySample::visible(0, 0.3), VisibilitySample::visible(1, 0.9)],
        feed.at(0),
    );
    feed.controller.observe_visibility(
        &[
            VisibilitySample::hidden(0),
            VisibilitySample::visible(1, 0.2),
            VisibilitySample::visible(2, 0.9),
        ],
        feed.at(100),
    );
    feed.controller.tick(feed.at(150));
    feed.controller.observe_visibility(
        &[
            VisibilitySample::hidden(1),
            VisibilitySample::visible(2, 0.1),
            VisibilitySample::visible(3, 0.95),
        ],
        feed.at(200),
    );
    feed.controller.tick(feed.at(450));
    assert_eq!(feed.controller.active(), Some(pos(0)));

    feed.controller.tick(feed.at(500));
    assert_eq!(feed.controller.active(), Some(pos(3)));

    let activations: Vec<_> = feed
        .controller
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            FeedEvent::ActiveChanged { to, .. } => Some(to),
            _ => None,
        })
        .collect();
    assert_eq!(activations, vec![pos(3)]);
}

#[test]
fn test_budget_change_during_settle_keeps_landing_item() {
    let mut feed = Feed::with_defaults();
    feed.load(0..20, false);
    assert_eq!(feed.controller.mounted_positions(), vec![pos(0), pos(1)]);

    // Long fling lands on an item outside the mounted window
    feed.controller.observe_visibility(
        &[VisibilitySample::hidden(0), VisibilitySample::visible(5, 1.0)],
        feed.at(10),
    );
    let slow = ConnectionSample::new(EffectiveConnectionType::TwoG);
    feed.controller.on_connection_change(slow, feed.at(50));
    feed.controller
        .observe_visibility(&[VisibilitySample::hidden(4)], feed.at(60));

    feed.controller.tick(feed.at(1000));
    assert_eq!(feed.controller.active(), Some(pos(5)));
    assert!(feed.controller.is_mounted(pos(5)));
}

#[test]
fn test_refused_activation_rearms_after_page_load() {
    let mut feed = Feed::with_defaults();
    feed.load(0..3, true);

    // Settles on a position the catalog has not delivered yet
    feed.controller.observe_visibility(
        &[VisibilitySample::hidden(0), VisibilitySample::visible(4, 0.9)],
        feed.at(10),
    );
    feed.controller.tick(feed.at(400));
    assert_eq!(feed.controller.active(), Some(pos(0)));

    feed.controller.next_fetch().expect("near the end");
    feed.controller.on_page(Ok(page(3..6, false)), feed.at(450));
    assert_eq!(feed.controller.active(), Some(pos(0)));

    feed.controller
        .observe_visibility(&[VisibilitySample::visible(4, 0.9)], feed.at(500));
    feed.controller.tick(feed.at(800));
    assert_eq!(feed.controller.active(), Some(pos(4)));
}

#[test]
fn test_activation_pauses_previous_item() {
    let mut feed = Feed::with_defaults();
    feed.load(0..10, false);
    feed.ready(0, feed.at(0));
    assert_eq!(feed.controller.slot_state(pos(0)), Some(SlotState::Playing));

    feed.ready(1, feed.at(10));
    assert_eq!(feed.controller.slot_state(pos(1)), Some(SlotState::Ready));

    feed.controller.next(feed.at(20));
    assert_eq!(feed.controller.slot_state(pos(0)), Some(SlotState::Paused));
    assert_eq!(feed.controller.slot_state(pos(1)), Some(SlotState::Playing));

    let snapshot = feed.controller.metrics().snapshot();
    assert_eq!(snapshot.startup_latency_samples, 2);
    // Preloaded item starts instantly
    assert_eq!(snapshot.startup_latency_p50_ms, 0);
}

// ============================================================================
// Retry and recovery
// ============================================================================

#[test]
fn test_retry_backoff_then_exhausted() {
    let mut feed = Feed::with_defaults();
    feed.load(0..5, false);

    let mut failed_at = feed.at(0);
    let mut delays = Vec::new();
    for _ in 0..3 {
        feed.fail(0, MediaErrorKind::Transport, failed_at);
        assert_eq!(feed.controller.slot_state(pos(0)), Some(SlotState::Retrying));

        let deadline = feed.controller.next_deadline().expect("retry scheduled");
        delays.push(deadline.duration_since(failed_at).as_millis() as u64);

        feed.controller.tick(deadline);
        failed_at = deadline;
    }
    assert_eq!(delays, vec![1000, 2000, 4000]);

    feed.fail(0, MediaErrorKind::Transport, failed_at);
    assert_eq!(feed.controller.slot_state(pos(0)), Some(SlotState::Exhausted));
    assert!(feed.controller.next_deadline().is_none());

    let events = feed.controller.drain_events();
    assert!(events.contains(&FeedEvent::FallbackShown {
        position: pos(0),
        thumbnail_url: Some("https://cdn.example/0.jpg".to_string()),
    }));
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, FeedEvent::SlotError { .. }))
            .count(),
        4
    );

    // Scrolling stays possible
    assert!(feed.controller.next(failed_at));
    assert_eq!(feed.controller.active(), Some(pos(1)));
}

#[test]
fn test_manual_retry_recovers_exhausted_slot() {
    let mut feed = Feed::with_defaults();
    feed.load(0..5, false);
    feed.fail(0, MediaErrorKind::Decode, feed.at(0));
    assert_eq!(feed.controller.slot_state(pos(0)), Some(SlotState::Exhausted));

    assert!(feed.controller.retry_slot(pos(0), feed.at(500)));
    assert_eq!(feed.controller.slot_state(pos(0)), Some(SlotState::Preloading));

    feed.ready(0, feed.at(700));
    assert_eq!(feed.controller.slot_state(pos(0)), Some(SlotState::Playing));
}

#[test]
fn test_exhausted_slot_resets_on_remount() {
    let mut feed = Feed::with_defaults();
    feed.load(0..10, false);

    feed.fail(1, MediaErrorKind::Decode, feed.at(0));
    assert_eq!(feed.controller.slot_state(pos(1)), Some(SlotState::Exhausted));

    feed.controller.go_to(pos(5), feed.at(100));
    assert!(!feed.controller.is_mounted(pos(1)));

    feed.controller.go_to(pos(1), feed.at(200));
    let slot = feed.controller.slot(pos(1)).expect("remounted");
    assert_eq!(slot.state(), SlotState::Preloading);
    assert_eq!(slot.attempt_count(), 0);
}

#[test]
fn test_preload_error_parks_until_active() {
    let mut feed = Feed::with_defaults();
    feed.load(0..10, false);

    feed.fail(1, MediaErrorKind::Transport, feed.at(0));
    assert_eq!(feed.controller.slot_state(pos(1)), Some(SlotState::Error));
    assert!(feed.controller.next_deadline().is_none());

    feed.controller.next(feed.at(50));
    assert_eq!(feed.controller.slot_state(pos(1)), Some(SlotState::Preloading));
    feed.ready(1, feed.at(80));
    assert_eq!(feed.controller.slot_state(pos(1)), Some(SlotState::Playing));
}

#[test]
fn test_late_callback_after_unmount_is_ignored() {
    let mut feed = Feed::with_defaults();
    feed.load(0..10, false);
    let stale = feed.engines.last_ticket(pos(0)).unwrap();

    feed.controller.go_to(pos(6), feed.at(10));
    assert!(!feed.controller.is_mounted(pos(0)));

    feed.controller
        .on_engine_event(EngineEvent::ready(stale), feed.at(20));
    feed.controller
        .on_engine_event(EngineEvent::fatal(stale, MediaErrorKind::Transport), feed.at(30));

    let snapshot = feed.controller.metrics().snapshot();
    assert_eq!(snapshot.stale_callbacks, 2);
    assert_eq!(snapshot.transport_errors, 0);
}

#[test]
fn test_remounted_position_rejects_previous_ticket() {
    let mut feed = Feed::with_defaults();
    feed.load(0..10, false);
    let old = feed.engines.last_ticket(pos(1)).unwrap();

    feed.controller.go_to(pos(6), feed.at(10));
    feed.controller.go_to(pos(0), feed.at(20));
    let new = feed.engines.last_ticket(pos(1)).unwrap();
    assert_ne!(old, new);

    feed.controller
        .on_engine_event(EngineEvent::ready(old), feed.at(30));
    assert_eq!(feed.controller.slot_state(pos(1)), Some(SlotState::Preloading));
}

// ============================================================================
// Network budget
// ============================================================================

#[test]
fn test_fast_budget_preloads_both_directions() {
    let config = FeedConfig::default().with_window_radius(2);
    let mut feed = Feed::new(config, Box::new(MemoryPreferenceStore::new()));
    feed.controller.on_connection_change(fast_sample(), feed.at(0));
    feed.load(0..10, false);
    feed.controller.go_to(pos(5), feed.at(10));

    assert_eq!(feed.controller.prefetch_set().positions(), &[pos(6), pos(4)]);
    assert_eq!(feed.controller.slot_state(pos(6)), Some(SlotState::Preloading));
    assert_eq!(feed.controller.slot_state(pos(4)), Some(SlotState::Preloading));
    assert_eq!(feed.controller.slot_state(pos(7)), Some(SlotState::Idle));
    assert_eq!(feed.controller.slot_state(pos(3)), Some(SlotState::Idle));
}

#[test]
fn test_slow_budget_keeps_in_flight_preload() {
    let mut feed = Feed::with_defaults();
    feed.controller.on_connection_change(fast_sample(), feed.at(0));
    feed.load(0..10, false);
    assert_eq!(feed.controller.slot_state(pos(1)), Some(SlotState::Preloading));

    // Inside the throttle window: deferred
    let slow = ConnectionSample::new(EffectiveConnectionType::TwoG);
    feed.controller.on_connection_change(slow, feed.at(1000));
    assert_eq!(feed.controller.budget(), NetworkBudget::FAST);
    assert_eq!(feed.controller.next_deadline(), Some(feed.at(5000)));

    feed.engines.clear();
    feed.controller.tick(feed.at(5000));
    assert_eq!(feed.controller.budget(), NetworkBudget::SLOW);
    assert!(feed.controller.prefetch_set().is_empty());

    let slot = feed.controller.slot(pos(1)).unwrap();
    assert_eq!(slot.state(), SlotState::Preloading);
    assert!(slot.has_engine());
    assert!(!feed
        .engines
        .calls()
        .iter()
        .any(|c| matches!(c, EngineCall::Destroy { .. } | EngineCall::Detach { .. })));

    let events = feed.controller.drain_events();
    assert!(events.contains(&FeedEvent::BudgetChanged {
        budget: NetworkBudget::SLOW
    }));
}

#[test]
fn test_slow_budget_mounts_without_preloading() {
    let mut feed = Feed::with_defaults();
    feed.controller.on_connection_change(
        ConnectionSample::new(EffectiveConnectionType::FourG).with_save_data(true),
        feed.at(0),
    );
    feed.load(0..10, false);

    assert!(feed.controller.is_mounted(pos(1)));
    assert_eq!(feed.controller.slot_state(pos(1)), Some(SlotState::Idle));
    assert_eq!(feed.controller.live_engine_count(), 1);
}

// ============================================================================
// Pagination
// ============================================================================

#[test]
fn test_fetches_near_end_of_loaded_items() {
    let mut feed = Feed::with_defaults();
    feed.load(0..10, true);
    assert!(feed.controller.next_fetch().is_none());

    feed.controller.go_to(pos(6), feed.at(10));
    assert!(feed.controller.next_fetch().is_none());

    feed.controller.go_to(pos(7), feed.at(20));
    let request = feed.controller.next_fetch().expect("near the end");
    assert_eq!(request.cursor.as_deref(), Some("10"));
    assert!(feed.controller.next_fetch().is_none(), "single flight");

    feed.controller.on_page(Ok(page(10..20, true)), feed.at(30));
    assert_eq!(feed.controller.items().len(), 20);
    assert!(feed.controller.next_fetch().is_none());
}

#[test]
fn test_has_more_false_stops_fetching() {
    let mut feed = Feed::with_defaults();
    feed.load(0..3, false);
    feed.controller.go_to(pos(2), feed.at(10));
    assert!(!feed.controller.has_more());
    assert!(feed.controller.next_fetch().is_none());
}

#[test]
fn test_catalog_failure_is_not_retried_automatically() {
    let mut feed = Feed::with_defaults();
    feed.load(0..10, true);
    feed.controller.go_to(pos(8), feed.at(10));
    feed.controller.next_fetch().unwrap();
    feed.controller
        .on_page(Err(CatalogError::Transport("timeout".into())), feed.at(20));

    feed.controller.tick(feed.at(60_000));
    assert!(feed.controller.next_fetch().is_none());

    feed.controller.retry_catalog();
    assert!(feed.controller.next_fetch().is_some());
    assert_eq!(feed.controller.metrics().snapshot().catalog_failures, 1);
}

#[test]
fn test_later_page_extends_window_at_end() {
    let mut feed = Feed::with_defaults();
    feed.load(0..3, true);
    feed.controller.go_to(pos(2), feed.at(10));
    assert_eq!(feed.controller.mounted_positions(), vec![pos(1), pos(2)]);

    feed.controller.next_fetch().unwrap();
    feed.controller.on_page(Ok(page(3..6, false)), feed.at(20));
    assert_eq!(
        feed.controller.mounted_positions(),
        vec![pos(1), pos(2), pos(3)]
    );
}

// ============================================================================
// Preferences
// ============================================================================

#[test]
fn test_restores_saved_item() {
    let store = MemoryPreferenceStore::new()
        .with(KEY_LAST_POSITION, "2")
        .with(KEY_LAST_ITEM_ID, "item-4");
    let mut feed = Feed::new(FeedConfig::default(), Box::new(store));
    feed.load(0..10, true);

    // Item id wins over the raw index
    assert_eq!(feed.controller.active(), Some(pos(4)));
}

#[test]
fn test_unknown_saved_item_starts_at_top() {
    let store = MemoryPreferenceStore::new()
        .with(KEY_LAST_POSITION, "4")
        .with(KEY_LAST_ITEM_ID, "gone");
    let mut feed = Feed::new(FeedConfig::default(), Box::new(store));
    feed.load(0..10, true);
    assert_eq!(feed.controller.active(), Some(pos(0)));
}

#[test]
fn test_position_and_mute_persisted() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("prefs.ini");

    let store = IniPreferenceStore::open(&path).unwrap();
    let mut feed = Feed::new(FeedConfig::default(), Box::new(store));
    feed.load(0..10, false);
    feed.controller.go_to(pos(3), feed.at(10));
    feed.controller.set_muted(false);

    let reopened = IniPreferenceStore::open(&path).unwrap();
    assert_eq!(reopened.get(KEY_LAST_POSITION).unwrap().as_deref(), Some("3"));
    assert_eq!(reopened.get(KEY_LAST_ITEM_ID).unwrap().as_deref(), Some("item-3"));
    assert_eq!(reopened.get(KEY_MUTED).unwrap().as_deref(), Some("false"));

    // A new session resumes where the last one stopped, unmuted
    let mut resumed = Feed::new(FeedConfig::default(), Box::new(reopened));
    resumed.load(0..10, false);
    assert_eq!(resumed.controller.active(), Some(pos(3)));
    assert!(!resumed.controller.is_muted());
}

// ============================================================================
// Shutdown
// ============================================================================

#[test]
fn test_shutdown_is_idempotent_and_final() {
    let mut feed = Feed::with_defaults();
    feed.load(0..10, true);
    let ticket = feed.engines.last_ticket(pos(0)).unwrap();

    feed.controller.shutdown();
    feed.controller.shutdown();
    assert_eq!(feed.engines.live_engines(), 0);

    feed.controller
        .on_engine_event(EngineEvent::ready(ticket), feed.at(10));
    assert!(feed.controller.next_deadline().is_none());
    assert!(!feed.controller.go_to(pos(3), feed.at(20)));
}
