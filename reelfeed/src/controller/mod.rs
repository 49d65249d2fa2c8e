//! Top-level feed orchestration.
//!
//! [`FeedController`] is a synchronous, timestamp-driven state machine; the
//! async host loop lives in [`crate::service`].

mod events;
mod feed;
mod pagination;

pub use events::FeedEvent;
pub use feed::FeedController;
