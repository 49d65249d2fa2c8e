//! Tokio runtime for the feed controller.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use reelfeed::catalog::InMemoryCatalog;
//! use reelfeed::config::FeedConfig;
//! use reelfeed::controller::FeedController;
//! use reelfeed::playback::testing::RecordingFactory;
//! use reelfeed::preferences::MemoryPreferenceStore;
//! use reelfeed::service::FeedService;
//!
//! # async fn run() -> Result<(), reelfeed::service::ServiceError> {
//! let controller = FeedController::new(
//!     FeedConfig::default(),
//!     Box::new(RecordingFactory::new()),
//!     Box::new(MemoryPreferenceStore::new()),
//! );
//! let catalog = Arc::new(InMemoryCatalog::generated(50, 10));
//!
//! let (service, mut events) = FeedService::start(controller, catalog);
//! let handle = service.handle();
//! handle.next()?;
//!
//! while let Ok(event) = events.try_recv() {
//!     println!("{event:?}");
//! }
//! service.shutdown().await
//! # }
//! ```

mod runtime;

use thiserror::Error;

pub use runtime::{FeedCommand, FeedHandle, FeedService, FeedStatus};

/// Errors talking to a running feed.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The feed loop is no longer running.
    #[error("Feed service has stopped")]
    Stopped,

    /// The feed task panicked or was aborted.
    #[error("Feed task failed: {0}")]
    TaskFailed(String),
}
