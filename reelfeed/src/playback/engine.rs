//! Decoding engine abstraction.
//!
//! The streaming decoder is an external component. The core only sees it
//! through [`DecodingEngine`]: attach a source, adjust the buffer target,
//! play/pause/mute, detach and destroy. Engines report back asynchronously
//! through the host as [`EngineEvent`]s tagged with the [`AttachTicket`] they
//! were attached with, which lets the owning slot discard callbacks from an
//! attach it has already abandoned.

use std::fmt;
use std::time::Duration;

use crate::feed::{FeedPosition, MediaSource};
use crate::network::{NetworkBudget, SpeedTier};

/// Identifies one attach of one engine at one position.
///
/// Attach ids are unique for the lifetime of a controller, so a ticket from a
/// torn-down slot can never match the slot that later occupies its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttachTicket {
    /// Position the engine was attached for.
    pub position: FeedPosition,

    /// Unique attach id.
    pub attach_id: u64,
}

impl fmt::Display for AttachTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/attach-{}", self.position, self.attach_id)
    }
}

/// Buffer and quality input for an attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferTarget {
    /// Forward buffer to accumulate.
    pub forward_buffer: Duration,

    /// Quality hint keyed by the current speed tier.
    pub tier: SpeedTier,

    /// Whether this is a reduced preload target.
    pub preload: bool,
}

/// Forward buffer used for preloads regardless of tier.
pub const PRELOAD_BUFFER: Duration = Duration::from_secs(3);

impl BufferTarget {
    /// Full target for the active item.
    pub fn playback(budget: &NetworkBudget) -> Self {
        Self {
            forward_buffer: Duration::from_secs(u64::from(budget.buffer_seconds)),
            tier: budget.tier,
            preload: false,
        }
    }

    /// Reduced target for a neighbor being preloaded.
    pub fn preload(budget: &NetworkBudget) -> Self {
        let full = Duration::from_secs(u64::from(budget.buffer_seconds));
        Self {
            forward_buffer: full.min(PRELOAD_BUFFER),
            tier: budget.tier,
            preload: true,
        }
    }
}

/// Classification of a media failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaErrorKind {
    /// Timeout, reset or other network failure.
    Transport,
    /// The engine rejected the media format or manifest.
    Format,
    /// The stream decoded as corrupt.
    Decode,
}

impl MediaErrorKind {
    /// Whether the error can clear up on a later attempt.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, MediaErrorKind::Transport | MediaErrorKind::Format)
    }

    /// Short label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaErrorKind::Transport => "transport",
            MediaErrorKind::Format => "format",
            MediaErrorKind::Decode => "decode",
        }
    }
}

impl fmt::Display for MediaErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an engine reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEventKind {
    /// First playable data is buffered.
    Ready,

    /// The engine failed.
    ///
    /// `fatal` is the engine's own verdict; a fatal transport error is still
    /// retried by the slot, a non-fatal one is left to the engine to recover.
    Error { kind: MediaErrorKind, fatal: bool },
}

/// An engine callback delivered through the host event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineEvent {
    /// Ticket the engine was attached with.
    pub ticket: AttachTicket,

    /// What happened.
    pub kind: EngineEventKind,
}

impl EngineEvent {
    /// Ready event for a ticket.
    pub fn ready(ticket: AttachTicket) -> Self {
        Self {
            ticket,
            kind: EngineEventKind::Ready,
        }
    }

    /// Fatal error event for a ticket.
    pub fn fatal(ticket: AttachTicket, kind: MediaErrorKind) -> Self {
        Self {
            ticket,
            kind: EngineEventKind::Error { kind, fatal: true },
        }
    }
}

/// One streaming decoder instance.
///
/// A handle is exclusively owned by a single slot for its whole life and is
/// destroyed when that slot is torn down.
pub trait DecodingEngine: Send {
    /// Start loading `source`; report [`EngineEvent`]s tagged with `ticket`.
    fn attach(&mut self, ticket: AttachTicket, source: &MediaSource, buffer: BufferTarget);

    /// Change the buffer target of the current attach.
    fn set_buffer_target(&mut self, buffer: BufferTarget);

    /// Start or resume output.
    fn play(&mut self);

    /// Pause output.
    fn pause(&mut self);

    /// Mute or unmute output.
    fn set_muted(&mut self, muted: bool);

    /// Disconnect from the output surface.
    fn detach(&mut self);

    /// Release all decoder resources. No events may follow.
    fn destroy(&mut self);
}

/// Creates engines on demand.
pub trait EngineFactory: Send {
    /// Create a fresh, unattached engine for `position`.
    fn create(&mut self, position: FeedPosition) -> Box<dyn DecodingEngine>;
}

impl<F> EngineFactory for F
where
    F: FnMut(FeedPosition) -> Box<dyn DecodingEngine> + Send,
{
    fn create(&mut self, position: FeedPosition) -> Box<dyn DecodingEngine> {
        self(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_error_recoverable() {
        assert!(MediaErrorKind::Transport.is_recoverable());
        assert!(MediaErrorKind::Format.is_recoverable());
        assert!(!MediaErrorKind::Decode.is_recoverable());
    }

    #[test]
    fn test_buffer_targets() {
        let full = BufferTarget::playback(&NetworkBudget::FAST);
        assert_eq!(full.forward_buffer, Duration::from_secs(30));
        assert!(!full.preload);

        let preload = BufferTarget::preload(&NetworkBudget::FAST);
        assert_eq!(preload.forward_buffer, PRELOAD_BUFFER);
        assert!(preload.preload);
        assert_eq!(preload.tier, SpeedTier::Fast);
    }

    #[test]
    fn test_ticket_display() {
        let ticket = AttachTicket {
            position: FeedPosition(4),
            attach_id: 17,
        };
        assert_eq!(ticket.to_string(), "#4/attach-17");
    }
}
