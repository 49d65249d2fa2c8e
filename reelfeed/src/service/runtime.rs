//! Async host loop for a [`FeedController`].
//!
//! ```text
//!  FeedHandle ──FeedCommand──►┐
//!                             │   ┌──────────────────┐
//!  catalog task ──page───────►├──►│  FeedController  │──FeedEvent──► UI
//!                             │   └──────────────────┘
//!  sleep_until(next_deadline)►┘
//! ```
//!
//! The controller is owned by a single task, so samples, timers, engine
//! callbacks and catalog results are applied strictly one at a time.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::ServiceError;
use crate::catalog::{CatalogClient, CatalogError, CatalogPage, PageRequest};
use crate::controller::{FeedController, FeedEvent};
use crate::feed::FeedPosition;
use crate::network::{ConnectionSample, NetworkBudget};
use crate::playback::EngineEvent;
use crate::telemetry::FeedMetrics;
use crate::visibility::VisibilitySample;

/// Input to the feed loop.
#[derive(Debug)]
pub enum FeedCommand {
    /// Batch of intersection samples.
    Visibility(Vec<VisibilitySample>),
    /// Decoder callback.
    Engine(EngineEvent),
    /// Connection information changed.
    Connection(ConnectionSample),
    /// Manual retry of an exhausted slot.
    RetrySlot(FeedPosition),
    /// Re-enable catalog fetching after a failure.
    RetryCatalog,
    /// Jump to a position.
    GoTo(FeedPosition),
    /// Advance one item.
    Next,
    /// Go back one item.
    Previous,
    /// Set the mute preference.
    SetMuted(bool),
    /// Reply with a [`FeedStatus`].
    Status(oneshot::Sender<FeedStatus>),
    /// Stop the loop and release every engine.
    Shutdown,
}

/// Point-in-time view of the controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedStatus {
    pub active: Option<FeedPosition>,
    pub mounted: Vec<FeedPosition>,
    pub live_engines: usize,
    pub loaded: usize,
    pub has_more: bool,
    pub catalog_failed: bool,
    pub muted: bool,
    pub budget: NetworkBudget,
}

impl FeedStatus {
    fn of(controller: &FeedController) -> Self {
        Self {
            active: controller.active(),
            mounted: controller.mounted_positions(),
            live_engines: controller.live_engine_count(),
            loaded: controller.items().len(),
            has_more: controller.has_more(),
            catalog_failed: controller.catalog_failed(),
            muted: controller.is_muted(),
            budget: controller.budget(),
        }
    }
}

/// Cloneable sender for feed commands.
#[derive(Debug, Clone)]
pub struct FeedHandle {
    commands: mpsc::UnboundedSender<FeedCommand>,
}

impl FeedHandle {
    /// Send a raw command.
    pub fn send(&self, command: FeedCommand) -> Result<(), ServiceError> {
        self.commands
            .send(command)
            .map_err(|_| ServiceError::Stopped)
    }

    /// Forward intersection samples.
    pub fn observe_visibility(&self, samples: Vec<VisibilitySample>) -> Result<(), ServiceError> {
        self.send(FeedCommand::Visibility(samples))
    }

    /// Forward a decoder callback.
    pub fn engine_event(&self, event: EngineEvent) -> Result<(), ServiceError> {
        self.send(FeedCommand::Engine(event))
    }

    /// Report new connection information.
    pub fn connection_changed(&self, sample: ConnectionSample) -> Result<(), ServiceError> {
        self.send(FeedCommand::Connection(sample))
    }

    /// Retry the slot at `position` after exhaustion.
    pub fn retry_slot(&self, position: FeedPosition) -> Result<(), ServiceError> {
        self.send(FeedCommand::RetrySlot(position))
    }

    /// Allow catalog fetching again.
    pub fn retry_catalog(&self) -> Result<(), ServiceError> {
        self.send(FeedCommand::RetryCatalog)
    }

    /// Navigate to `position`.
    pub fn go_to(&self, position: FeedPosition) -> Result<(), ServiceError> {
        self.send(FeedCommand::GoTo(position))
    }

    /// Advance to the following item.
    pub fn next(&self) -> Result<(), ServiceError> {
        self.send(FeedCommand::Next)
    }

    /// Go back one item.
    pub fn previous(&self) -> Result<(), ServiceError> {
        self.send(FeedCommand::Previous)
    }

    /// Set the mute preference.
    pub fn set_muted(&self, muted: bool) -> Result<(), ServiceError> {
        self.send(FeedCommand::SetMuted(muted))
    }

    /// Current controller status.
    pub async fn status(&self) -> Result<FeedStatus, ServiceError> {
        let (tx, rx) = oneshot::channel();
        self.send(FeedCommand::Status(tx))?;
        rx.await.map_err(|_| ServiceError::Stopped)
    }
}

/// A running feed.
#[derive(Debug)]
pub struct FeedService {
    handle: FeedHandle,
    cancellation: CancellationToken,
    task: JoinHandle<()>,
    metrics: Arc<FeedMetrics>,
}

impl FeedService {
    /// Spawn the feed loop on the current tokio runtime.
    ///
    /// # Returns
    ///
    /// The service and the receiver of UI events.
    pub fn start(
        controller: FeedController,
        catalog: Arc<dyn CatalogClient>,
    ) -> (Self, mpsc::UnboundedReceiver<FeedEvent>) {
        Self::start_with_cancellation(controller, catalog, CancellationToken::new())
    }

    /// Like [`start`](Self::start), stopping when `cancellation` fires.
    pub fn start_with_cancellation(
        controller: FeedController,
        catalog: Arc<dyn CatalogClient>,
        cancellation: CancellationToken,
    ) -> (Self, mpsc::UnboundedReceiver<FeedEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let metrics = controller.metrics();

        let feed_loop = FeedLoop {
            controller,
            catalog,
            events: event_tx,
            cancellation: cancellation.clone(),
        };
        let task = tokio::spawn(feed_loop.run(command_rx));

        let service = Self {
            handle: FeedHandle {
                commands: command_tx,
            },
            cancellation,
            task,
            metrics,
        };
        (service, event_rx)
    }

    /// Sender for commands.
    pub fn handle(&self) -> FeedHandle {
        self.handle.clone()
    }

    /// Metrics of the running controller.
    pub fn metrics(&self) -> Arc<FeedMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Stop the loop, release every engine and wait for the task to finish.
    pub async fn shutdown(self) -> Result<(), ServiceError> {
        self.cancellation.cancel();
        self.task
            .await
            .map_err(|e| ServiceError::TaskFailed(e.to_string()))
    }
}

struct FeedLoop {
    controller: FeedController,
    catalog: Arc<dyn CatalogClient>,
    events: mpsc::UnboundedSender<FeedEvent>,
    cancellation: CancellationToken,
}

impl FeedLoop {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<FeedCommand>) {
        tracing::info!("Feed service started");
        let (page_tx, mut pages) = mpsc::unbounded_channel();

        loop {
            if let Some(request) = self.controller.next_fetch() {
                self.spawn_fetch(request, page_tx.clone());
            }
            self.flush_events();

            let deadline = self.controller.next_deadline();

            tokio::select! {
                biased;

                _ = self.cancellation.cancelled() => break,

                command = commands.recv() => {
                    match command {
                        None | Some(FeedCommand::Shutdown) => break,
                        Some(command) => self.apply(command),
                    }
                }

                Some(result) = pages.recv() => {
                    self.controller.on_page(result, now());
                }

                _ = sleep_until(deadline) => {
                    self.controller.tick(now());
                }
            }
        }

        self.controller.shutdown();
        self.flush_events();
        tracing::info!("Feed service stopped");
    }

    fn apply(&mut self, command: FeedCommand) {
        let now = now();
        match command {
            FeedCommand::Visibility(samples) => self.controller.observe_visibility(&samples, now),
            FeedCommand::Engine(event) => self.controller.on_engine_event(event, now),
            FeedCommand::Connection(sample) => self.controller.on_connection_change(sample, now),
            FeedCommand::RetrySlot(position) => {
                self.controller.retry_slot(position, now);
            }
            FeedCommand::RetryCatalog => {
                self.controller.retry_catalog();
            }
            FeedCommand::GoTo(position) => {
                self.controller.go_to(position, now);
            }
            FeedCommand::Next => {
                self.controller.next(now);
            }
            FeedCommand::Previous => {
                self.controller.previous(now);
            }
            FeedCommand::SetMuted(muted) => self.controller.set_muted(muted),
            FeedCommand::Status(reply) => {
                let _ = reply.send(FeedStatus::of(&self.controller));
            }
            FeedCommand::Shutdown => {}
        }
    }

    fn spawn_fetch(
        &self,
        request: PageRequest,
        results: mpsc::UnboundedSender<Result<CatalogPage, CatalogError>>,
    ) {
        let catalog = Arc::clone(&self.catalog);
        let cancellation = self.cancellation.child_token();
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = cancellation.cancelled() => Err(CatalogError::Cancelled),
                result = catalog.fetch_page(request.cursor) => result,
            };
            // The loop may already have stopped.
            let _ = results.send(result);
        });
    }

    fn flush_events(&mut self) {
        for event in self.controller.drain_events() {
            if self.events.send(event).is_err() {
                // Receiver dropped; keep running without a UI.
                break;
            }
        }
    }
}

fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}
