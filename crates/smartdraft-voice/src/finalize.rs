//! Graceful finalization of a tool-submitted document payload.
//!
//! When the model calls `submit_document_details`, its closing remarks are
//! still arriving as trailing audio chunks. Delivering the payload instantly
//! would cut the agent off mid-sentence, so the coordinator holds the payload
//! until playback has drained, then waits out a short grace period before
//! handing it to the caller. The grace timer is a single slot: every trigger
//! (new tool result, or a buffer ending) replaces the previous deadline, which
//! also absorbs the transient empty moments between chunks of one trailing
//! utterance.

use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

/// The document fields the agent gathered, as a flat key-value mapping.
pub type GatheredData = Map<String, Value>;

/// Grace delay between playback draining and delivery of the result.
pub const FINALIZE_GRACE: Duration = Duration::from_millis(1500);

/// Holds at most one pending tool result and the single-slot restartable
/// grace timer. Times are offsets from the session epoch, injected by the
/// caller, so the restart behavior is testable without sleeping.
#[derive(Debug)]
pub struct Finalizer {
    grace: Duration,
    pending: Option<GatheredData>,
    deadline: Option<Duration>,
}

impl Finalizer {
    pub fn new(grace: Duration) -> Self {
        Self {
            grace,
            pending: None,
            deadline: None,
        }
    }

    /// Store a tool result and arm the grace timer. A second submission
    /// before delivery overwrites the first (last-write-wins).
    pub fn submit(&mut self, data: GatheredData, now: Duration) {
        if self.pending.is_some() {
            debug!("finalize: replacing undelivered tool result");
        }
        self.pending = Some(data);
        self.deadline = Some(now + self.grace);
    }

    /// Restart the grace timer. Called whenever a playback buffer ends while
    /// a result is pending; a no-op otherwise.
    pub fn rearm(&mut self, now: Duration) {
        if self.pending.is_some() {
            self.deadline = Some(now + self.grace);
        }
    }

    /// When the armed deadline should fire, for timer scheduling.
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Check the expired timer. Delivery happens only when the deadline has
    /// passed AND playback is idle; if audio is still in flight the slot is
    /// disarmed and the next buffer-end rearms it.
    pub fn take_ready(&mut self, now: Duration, playback_idle: bool) -> Option<GatheredData> {
        let deadline = self.deadline?;
        if now < deadline {
            return None;
        }
        self.deadline = None;
        if playback_idle {
            self.pending.take()
        } else {
            None
        }
    }
}

impl Default for Finalizer {
    fn default() -> Self {
        Self::new(FINALIZE_GRACE)
    }
}
