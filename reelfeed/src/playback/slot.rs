//! Per-position playback state machine.
//!
//! # State Machine
//!
//! ```text
//!   Idle ──preload/activate──► Preloading ──ready──► Ready ──active──► Playing ⇄ Paused
//!                                  │                   │                  │
//!                                  └──────── fatal error ─────────────────┘
//!                                                │
//!                                              Error ──recoverable, active──► Retrying
//!                                                │                             │   │
//!                                           terminal                       ready  limit
//!                                                ▼                             ▼   ▼
//!                                            Exhausted ◄───────────────── Ready  Exhausted
//! ```
//!
//! A recoverable error on a slot that is not active parks it in `Error`
//! without spending retry budget; it re-attaches when it becomes active.
//!
//! Every engine callback is checked against the slot's current
//! [`AttachTicket`]. Callbacks for an abandoned attach (after an error, a
//! retry or a teardown) are ignored.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use super::engine::{
    AttachTicket, BufferTarget, DecodingEngine, EngineEvent, EngineEventKind, EngineFactory,
    MediaErrorKind,
};
use super::retry::{RetryPolicy, RetrySchedule};
use crate::feed::{FeedItem, FeedPosition};
use crate::network::NetworkBudget;
use crate::telemetry::FeedMetrics;

/// Lifecycle state of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    /// Mounted, no engine attached.
    Idle,
    /// Engine attached, waiting for first playable data.
    Preloading,
    /// First data buffered; not playing.
    Ready,
    /// Active and playing.
    Playing,
    /// Inactive after playing.
    Paused,
    /// Engine failed; parked until the slot is active again.
    Error,
    /// Waiting for (or running) a retry attach.
    Retrying,
    /// Gave up; fallback poster shown until a manual retry.
    Exhausted,
}

impl SlotState {
    /// Whether the UI should show a loading spinner.
    pub fn shows_spinner(&self) -> bool {
        matches!(self, SlotState::Preloading | SlotState::Retrying)
    }

    /// Whether the UI should show the fallback poster with a retry affordance.
    pub fn shows_fallback(&self) -> bool {
        matches!(self, SlotState::Exhausted)
    }

    /// Short label.
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotState::Idle => "idle",
            SlotState::Preloading => "preloading",
            SlotState::Ready => "ready",
            SlotState::Playing => "playing",
            SlotState::Paused => "paused",
            SlotState::Error => "error",
            SlotState::Retrying => "retrying",
            SlotState::Exhausted => "exhausted",
        }
    }
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What became of an engine event offered to a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// The event belonged to the current attach and was applied.
    Applied,
    /// The event was for an attach this slot no longer owns.
    Stale,
}

/// Shared resources slots need to attach engines.
///
/// Owned by the controller and lent to a slot for the duration of one call.
pub struct SlotResources {
    factory: Box<dyn EngineFactory>,
    policy: RetryPolicy,
    metrics: Arc<FeedMetrics>,
    next_attach_id: u64,
}

impl SlotResources {
    /// Creates resources around an engine factory.
    pub fn new(
        factory: Box<dyn EngineFactory>,
        policy: RetryPolicy,
        metrics: Arc<FeedMetrics>,
    ) -> Self {
        Self {
            factory,
            policy,
            metrics,
            next_attach_id: 1,
        }
    }

    /// Retry policy in force.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Metrics sink.
    pub fn metrics(&self) -> &FeedMetrics {
        &self.metrics
    }

    fn next_ticket(&mut self, position: FeedPosition) -> AttachTicket {
        let attach_id = self.next_attach_id;
        self.next_attach_id += 1;
        AttachTicket {
            position,
            attach_id,
        }
    }
}

impl fmt::Debug for SlotResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotResources")
            .field("policy", &self.policy)
            .field("next_attach_id", &self.next_attach_id)
            .finish_non_exhaustive()
    }
}

/// Everything a slot needs for one state transition.
pub struct SlotEnv<'a> {
    /// Factory, policy and metrics.
    pub resources: &'a mut SlotResources,
    /// Budget in force.
    pub budget: NetworkBudget,
    /// User mute preference for the playing slot.
    pub muted: bool,
    /// Current time.
    pub now: Instant,
}

impl<'a> SlotEnv<'a> {
    /// Bundle the inputs for a slot call.
    pub fn new(
        resources: &'a mut SlotResources,
        budget: NetworkBudget,
        muted: bool,
        now: Instant,
    ) -> Self {
        Self {
            resources,
            budget,
            muted,
            now,
        }
    }
}

/// State machine wrapping one item's decoding-engine lifecycle.
pub struct PlaybackSlot {
    position: FeedPosition,
    item: FeedItem,
    state: SlotState,

    /// Retries spent since the last success or manual reset.
    attempt_count: u32,

    /// Exclusively owned engine handle.
    engine: Option<Box<dyn DecodingEngine>>,

    /// Ticket of the attach currently in flight or live.
    ticket: Option<AttachTicket>,

    /// Attached with the reduced preload buffer.
    is_preload: bool,

    /// Mirrors whether this position is the active one.
    is_active: bool,

    /// Pending retry, if any.
    retry: Option<RetrySchedule>,

    /// Candidate source to use on the next attach.
    source_index: usize,

    /// Intent-to-play time for the startup-latency sample.
    play_requested_at: Option<Instant>,

    torn_down: bool,
}

impl PlaybackSlot {
    /// Creates an idle slot for an item.
    pub fn new(position: FeedPosition, item: FeedItem) -> Self {
        Self {
            position,
            item,
            state: SlotState::Idle,
            attempt_count: 0,
            engine: None,
            ticket: None,
            is_preload: false,
            is_active: false,
            retry: None,
            source_index: 0,
            play_requested_at: None,
            torn_down: false,
        }
    }

    /// Position this slot is mounted at.
    pub fn position(&self) -> FeedPosition {
        self.position
    }

    /// Item this slot is rendering.
    pub fn item(&self) -> &FeedItem {
        &self.item
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SlotState {
        self.state
    }

    /// Retries spent since the last success.
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Whether the slot is attached with the reduced preload buffer.
    pub fn is_preload(&self) -> bool {
        self.is_preload
    }

    /// Whether this slot is the active one.
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Whether an engine handle is currently held.
    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    /// Ticket of the current attach.
    pub fn ticket(&self) -> Option<AttachTicket> {
        self.ticket
    }

    /// Pending retry, if any.
    pub fn retry_schedule(&self) -> Option<&RetrySchedule> {
        self.retry.as_ref()
    }

    /// When this slot next needs a `poll_retry`.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.retry
            .as_ref()
            .filter(|r| !r.is_cancelled())
            .map(RetrySchedule::next_fire_time)
    }

    /// Whether `teardown` has run.
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Begin a reduced-buffer preload. Only valid from `Idle` while inactive.
    pub fn start_preload(&mut self, env: &mut SlotEnv<'_>) -> bool {
        if self.torn_down || self.is_active || self.state != SlotState::Idle {
            return false;
        }
        let buffer = BufferTarget::preload(&env.budget);
        if self.attach(env, buffer) {
            self.set_state(SlotState::Preloading);
            true
        } else {
            false
        }
    }

    /// This position became the active one.
    pub fn activate(&mut self, env: &mut SlotEnv<'_>) {
        if self.torn_down || self.is_active {
            return;
        }
        self.is_active = true;
        self.play_requested_at = Some(env.now);

        match self.state {
            SlotState::Idle | SlotState::Error => {
                let buffer = BufferTarget::playback(&env.budget);
                if self.attach(env, buffer) {
                    self.set_state(SlotState::Preloading);
                }
            }
            SlotState::Preloading => {
                if self.is_preload {
                    self.is_preload = false;
                    if let Some(engine) = self.engine.as_mut() {
                        engine.set_buffer_target(BufferTarget::playback(&env.budget));
                    }
                }
            }
            SlotState::Ready | SlotState::Paused => {
                self.is_preload = false;
                if let Some(engine) = self.engine.as_mut() {
                    engine.set_buffer_target(BufferTarget::playback(&env.budget));
                }
                self.start_playing(env);
            }
            SlotState::Playing | SlotState::Retrying | SlotState::Exhausted => {}
        }
    }

    /// This position stopped being the active one.
    ///
    /// Pauses and mutes immediately. A pending retry is cancelled and the
    /// slot parks in `Error` until it is active again.
    pub fn deactivate(&mut self, env: &mut SlotEnv<'_>) {
        if self.torn_down || !self.is_active {
            return;
        }
        self.is_active = false;
        self.play_requested_at = None;

        if let Some(engine) = self.engine.as_mut() {
            engine.pause();
            engine.set_muted(true);
        }

        match self.state {
            SlotState::Playing => self.set_state(SlotState::Paused),
            SlotState::Preloading => {
                self.is_preload = true;
                if let Some(engine) = self.engine.as_mut() {
                    engine.set_buffer_target(BufferTarget::preload(&env.budget));
                }
            }
            SlotState::Retrying => {
                if let Some(mut retry) = self.retry.take() {
                    retry.cancel();
                }
                self.release_engine(env.resources.metrics());
                self.set_state(SlotState::Error);
            }
            _ => {}
        }
    }

    /// Apply an engine callback, if it belongs to the current attach.
    pub fn on_engine_event(&mut self, event: EngineEvent, env: &mut SlotEnv<'_>) -> EventOutcome {
        if self.torn_down || self.ticket != Some(event.ticket) {
            return EventOutcome::Stale;
        }

        match event.kind {
            EngineEventKind::Ready => self.on_ready(env),
            EngineEventKind::Error { kind, fatal } => {
                if fatal {
                    self.on_fatal_error(kind, env);
                } else {
                    tracing::debug!(
                        position = %self.position,
                        kind = %kind,
                        "Engine reported non-fatal error, leaving recovery to engine"
                    );
                }
            }
        }
        EventOutcome::Applied
    }

    /// Fire the pending retry if it is due.
    ///
    /// # Returns
    ///
    /// `true` if a retry attach was started.
    pub fn poll_retry(&mut self, env: &mut SlotEnv<'_>) -> bool {
        if self.torn_down || self.state != SlotState::Retrying {
            return false;
        }
        let due = self.retry.as_ref().is_some_and(|r| r.is_due(env.now));
        if !due {
            return false;
        }
        let Some(retry) = self.retry.take() else {
            return false;
        };

        tracing::debug!(
            position = %self.position,
            attempt = retry.attempt(),
            "Retry timer fired"
        );
        self.play_requested_at = Some(env.now);
        let buffer = BufferTarget::playback(&env.budget);
        self.attach(env, buffer)
    }

    /// User asked to try again after the slot gave up.
    ///
    /// Resets the attempt count and the candidate source, then re-attaches if
    /// the slot is active. An inactive slot returns to `Idle`.
    pub fn manual_retry(&mut self, env: &mut SlotEnv<'_>) -> bool {
        if self.torn_down || !matches!(self.state, SlotState::Exhausted | SlotState::Error) {
            return false;
        }
        env.resources.metrics().manual_retry();
        self.attempt_count = 0;
        self.source_index = 0;
        self.retry = None;
        self.set_state(SlotState::Idle);

        if self.is_active {
            self.play_requested_at = Some(env.now);
            let buffer = BufferTarget::playback(&env.budget);
            if self.attach(env, buffer) {
                self.set_state(SlotState::Preloading);
            }
        }
        true
    }

    /// Push a new budget to the attached engine.
    ///
    /// A preload already in flight keeps running; only its buffer input
    /// follows the new tier.
    pub fn set_budget(&mut self, budget: &NetworkBudget) {
        if let Some(engine) = self.engine.as_mut() {
            let target = if self.is_preload {
                BufferTarget::preload(budget)
            } else {
                BufferTarget::playback(budget)
            };
            engine.set_buffer_target(target);
        }
    }

    /// Apply the user's mute preference to a playing slot.
    pub fn set_muted(&mut self, muted: bool) {
        if self.state == SlotState::Playing {
            if let Some(engine) = self.engine.as_mut() {
                engine.set_muted(muted);
            }
        }
    }

    /// Release everything this slot holds. Idempotent.
    ///
    /// # Returns
    ///
    /// `true` if this call did the teardown, `false` if it had already run.
    pub fn teardown(&mut self, metrics: &FeedMetrics) -> bool {
        if self.torn_down {
            return false;
        }
        if let Some(mut retry) = self.retry.take() {
            retry.cancel();
        }
        self.release_engine(metrics);
        self.is_active = false;
        self.play_requested_at = None;
        self.torn_down = true;
        tracing::debug!(position = %self.position, state = %self.state, "Slot torn down");
        true
    }

    fn on_ready(&mut self, env: &mut SlotEnv<'_>) {
        match self.state {
            SlotState::Preloading | SlotState::Retrying => {
                if self.state == SlotState::Retrying {
                    tracing::info!(
                        position = %self.position,
                        attempts = self.attempt_count,
                        "Retry succeeded"
                    );
                }
                self.attempt_count = 0;
                self.set_state(SlotState::Ready);
                if self.is_active {
                    self.start_playing(env);
                }
            }
            _ => {}
        }
    }

    fn on_fatal_error(&mut self, kind: MediaErrorKind, env: &mut SlotEnv<'_>) {
        if !matches!(
            self.state,
            SlotState::Preloading
                | SlotState::Ready
                | SlotState::Playing
                | SlotState::Paused
                | SlotState::Retrying
        ) {
            return;
        }

        env.resources.metrics().media_error(kind);
        tracing::debug!(
            position = %self.position,
            kind = %kind,
            state = %self.state,
            attempt = self.attempt_count,
            "Engine fatal error"
        );

        self.release_engine(env.resources.metrics());
        self.set_state(SlotState::Error);

        if kind == MediaErrorKind::Format && self.item.sources.len() > 1 {
            self.source_index += 1;
        }

        if !env.resources.policy().is_retryable(kind) {
            self.exhaust(env);
            return;
        }

        if !self.is_active {
            // Parked: no retry budget spent on an item the user may never reach.
            return;
        }

        match env.resources.policy().delay_for_attempt(self.attempt_count) {
            Some(delay) => {
                let schedule = RetrySchedule::new(self.attempt_count, env.now, delay);
                tracing::debug!(
                    position = %self.position,
                    attempt = self.attempt_count,
                    delay_ms = delay.as_millis() as u64,
                    "Retry scheduled"
                );
                self.attempt_count += 1;
                self.retry = Some(schedule);
                env.resources.metrics().retry_scheduled();
                self.set_state(SlotState::Retrying);
            }
            None => self.exhaust(env),
        }
    }

    fn exhaust(&mut self, env: &mut SlotEnv<'_>) {
        self.retry = None;
        self.release_engine(env.resources.metrics());
        env.resources.metrics().slot_exhausted();
        tracing::warn!(
            position = %self.position,
            item_id = %self.item.id,
            attempts = self.attempt_count,
            "Slot exhausted, showing fallback poster"
        );
        self.set_state(SlotState::Exhausted);
    }

    fn start_playing(&mut self, env: &mut SlotEnv<'_>) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        engine.set_muted(env.muted);
        engine.play();
        if let Some(requested) = self.play_requested_at.take() {
            env.resources
                .metrics()
                .startup_latency(env.now.saturating_duration_since(requested));
        }
        self.set_state(SlotState::Playing);
    }

    fn attach(&mut self, env: &mut SlotEnv<'_>, buffer: BufferTarget) -> bool {
        let Some(source) = self.item.source(self.source_index).cloned() else {
            tracing::warn!(item_id = %self.item.id, "Item has no media sources");
            self.exhaust(env);
            return false;
        };

        self.release_engine(env.resources.metrics());
        let ticket = env.resources.next_ticket(self.position);
        let mut engine = env.resources.factory.create(self.position);
        env.resources.metrics().engine_created();
        engine.set_muted(true);
        engine.attach(ticket, &source, buffer);

        self.engine = Some(engine);
        self.ticket = Some(ticket);
        self.is_preload = buffer.preload;
        true
    }

    fn release_engine(&mut self, metrics: &FeedMetrics) {
        self.ticket = None;
        if let Some(mut engine) = self.engine.take() {
            engine.detach();
            engine.destroy();
            metrics.engine_destroyed();
        }
    }

    fn set_state(&mut self, state: SlotState) {
        if self.state != state {
            tracing::trace!(
                position = %self.position,
                from = %self.state,
                to = %state,
                "Slot transition"
            );
            self.state = state;
        }
    }
}

impl fmt::Debug for PlaybackSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackSlot")
            .field("position", &self.position)
            .field("item", &self.item.id)
            .field("state", &self.state)
            .field("attempt_count", &self.attempt_count)
            .field("has_engine", &self.engine.is_some())
            .field("ticket", &self.ticket)
            .field("is_preload", &self.is_preload)
            .field("is_active", &self.is_active)
            .field("torn_down", &self.torn_down)
            .finish()
    }
}

impl Drop for PlaybackSlot {
    fn drop(&mut self) {
        // Engines must never outlive their slot.
        if let Some(mut engine) = self.engine.take() {
            engine.detach();
            engine.destroy();
        }
    }
}
