//! Per-item playback lifecycle.
//!
//! Each mounted feed position owns one [`PlaybackSlot`], which in turn owns
//! at most one [`DecodingEngine`] handle. Slots live in a [`SlotTable`] whose
//! size is fixed by the mount radius, so the number of live decoders is
//! bounded regardless of feed length.
//!
//! Failed attaches are retried with exponential backoff per [`RetryPolicy`].

mod engine;
mod retry;
mod slot;
mod table;
pub mod testing;

pub use engine::{
    AttachTicket, BufferTarget, DecodingEngine, EngineEvent, EngineEventKind, EngineFactory,
    MediaErrorKind, PRELOAD_BUFFER,
};
pub use retry::{
    RetryPolicy, RetrySchedule, DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_DELAY_SECS,
};
pub use slot::{EventOutcome, PlaybackSlot, SlotEnv, SlotResources, SlotState};
pub use table::SlotTable;
