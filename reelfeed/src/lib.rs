//! Reelfeed - playback engine for single-item-per-viewport media feeds.
//!
//! At every moment the engine decides which feed positions are mounted,
//! which single position is playing, which neighbors preload, and how failed
//! media fetches recover, while keeping live decoder handles bounded by a
//! small fixed window regardless of feed length.
//!
//! # Modules
//!
//! - [`visibility`] - debounced detection of the active position
//! - [`window`] - mount window and prefetch set
//! - [`playback`] - per-position slot state machine, engine abstraction, retry policy
//! - [`network`] - connection quality and prefetch budget
//! - [`controller`] - orchestration of all of the above
//! - [`service`] - tokio host loop around the controller
//! - [`catalog`], [`preferences`] - external collaborators
//! - [`config`], [`logging`], [`telemetry`] - ambient plumbing

pub mod catalog;
pub mod config;
pub mod controller;
pub mod feed;
pub mod logging;
pub mod network;
pub mod playback;
pub mod preferences;
pub mod service;
pub mod telemetry;
pub mod visibility;
pub mod window;

pub use controller::{FeedController, FeedEvent};
pub use feed::{FeedItem, FeedPosition, ItemId, MediaSource};
