//! In-memory engine doubles.
//!
//! [`RecordingFactory`] hands out engines that do nothing but append every
//! call to a shared log, so tests (and the CLI simulator) can assert on the
//! exact sequence of attach/teardown operations.

use std::sync::Arc;

use parking_lot::Mutex;

use super::engine::{AttachTicket, BufferTarget, DecodingEngine, EngineFactory};
use crate::feed::{FeedPosition, MediaSource};

/// One recorded engine call.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Create {
        position: FeedPosition,
    },
    Attach {
        position: FeedPosition,
        ticket: AttachTicket,
        url: String,
        buffer: BufferTarget,
    },
    SetBufferTarget {
        position: FeedPosition,
        buffer: BufferTarget,
    },
    Play {
        position: FeedPosition,
    },
    Pause {
        position: FeedPosition,
    },
    SetMuted {
        position: FeedPosition,
        muted: bool,
    },
    Detach {
        position: FeedPosition,
    },
    Destroy {
        position: FeedPosition,
    },
}

#[derive(Debug, Default)]
struct Log {
    calls: Vec<EngineCall>,
    live: usize,
    peak_live: usize,
}

/// Factory producing [`RecordingEngine`]s that share one call log.
#[derive(Debug, Clone, Default)]
pub struct RecordingFactory {
    log: Arc<Mutex<Log>>,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// All calls so far, in order.
    pub fn calls(&self) -> Vec<EngineCall> {
        self.log.lock().calls.clone()
    }

    /// Forget recorded calls (live counts are kept).
    pub fn clear(&self) {
        self.log.lock().calls.clear();
    }

    /// Engines created and not yet destroyed.
    pub fn live_engines(&self) -> usize {
        self.log.lock().live
    }

    /// Highest number of simultaneously live engines seen.
    pub fn peak_live_engines(&self) -> usize {
        self.log.lock().peak_live
    }

    /// Ticket of the most recent attach at `position`.
    pub fn last_ticket(&self, position: FeedPosition) -> Option<AttachTicket> {
        self.log.lock().calls.iter().rev().find_map(|call| match call {
            EngineCall::Attach {
                position: p,
                ticket,
                ..
            } if *p == position => Some(*ticket),
            _ => None,
        })
    }

    /// Tickets of every attach, in order.
    pub fn tickets(&self) -> Vec<AttachTicket> {
        self.log
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                EngineCall::Attach { ticket, .. } => Some(*ticket),
                _ => None,
            })
            .collect()
    }
}

impl EngineFactory for RecordingFactory {
    fn create(&mut self, position: FeedPosition) -> Box<dyn DecodingEngine> {
        {
            let mut log = self.log.lock();
            log.calls.push(EngineCall::Create { position });
            log.live += 1;
            log.peak_live = log.peak_live.max(log.live);
        }
        Box::new(RecordingEngine {
            position,
            log: Arc::clone(&self.log),
            destroyed: false,
        })
    }
}

/// Engine that records calls and never reports anything by itself.
#[derive(Debug)]
pub struct RecordingEngine {
    position: FeedPosition,
    log: Arc<Mutex<Log>>,
    destroyed: bool,
}

impl RecordingEngine {
    fn record(&self, call: EngineCall) {
        self.log.lock().calls.push(call);
    }
}

impl DecodingEngine for RecordingEngine {
    fn attach(&mut self, ticket: AttachTicket, source: &MediaSource, buffer: BufferTarget) {
        self.record(EngineCall::Attach {
            position: self.position,
            ticket,
            url: source.url.clone(),
            buffer,
        });
    }

    fn set_buffer_target(&mut self, buffer: BufferTarget) {
        self.record(EngineCall::SetBufferTarget {
            position: self.position,
            buffer,
        });
    }

    fn play(&mut self) {
        self.record(EngineCall::Play {
            position: self.position,
        });
    }

    fn pause(&mut self) {
        self.record(EngineCall::Pause {
            position: self.position,
        });
    }

    fn set_muted(&mut self, muted: bool) {
        self.record(EngineCall::SetMuted {
            position: self.position,
            muted,
        });
    }

    fn detach(&mut self) {
        self.record(EngineCall::Detach {
            position: self.position,
        });
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        let mut log = self.log.lock();
        log.calls.push(EngineCall::Destroy {
            position: self.position,
        });
        log.live = log.live.saturating_sub(1);
    }
}
