//! Playback scheduling for model audio.
//!
//! Two halves: [`OutputTimeline`] is the pure scheduling state machine (a
//! monotonic start-time cursor plus the set of in-flight buffers) and
//! [`Speaker`] is the rodio sink that actually renders samples. Keeping the
//! timeline free of real audio lets the ordering, interruption and drain
//! properties be tested against an injected clock.
//!
//! Scheduling contract: a chunk starts at `max(cursor, now)` and the cursor
//! advances by the chunk's duration, so in-order chunks play back-to-back with
//! no gap and nothing is ever scheduled in the past. An interruption stops
//! every in-flight buffer, empties the set, and resets the cursor to zero so
//! the next chunk starts fresh relative to the current clock.

use crate::error::{SessionError, SessionResult};
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

use crate::pcm::PLAYBACK_SAMPLE_RATE;

/// One scheduled, not-yet-finished buffer. Times are offsets from the
/// session's playback epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledBuffer {
    pub id: u64,
    pub start: Duration,
    pub end: Duration,
}

/// The scheduling state machine: cursor + in-flight set.
#[derive(Debug, Default)]
pub struct OutputTimeline {
    cursor: Duration,
    next_id: u64,
    in_flight: HashMap<u64, ScheduledBuffer>,
}

impl OutputTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a chunk of the given duration at `now`. The returned buffer's
    /// start is `max(cursor, now)`; membership in the in-flight set lasts
    /// until [`complete`](Self::complete) or [`interrupt`](Self::interrupt).
    pub fn schedule(&mut self, now: Duration, duration: Duration) -> ScheduledBuffer {
        let start = self.cursor.max(now);
        let buffer = ScheduledBuffer {
            id: self.next_id,
            start,
            end: start + duration,
        };
        self.next_id += 1;
        self.cursor = buffer.end;
        self.in_flight.insert(buffer.id, buffer);
        buffer
    }

    /// Remove a buffer whose playback ended. Returns `false` when the id was
    /// already gone (e.g. stopped by an interruption first).
    pub fn complete(&mut self, id: u64) -> bool {
        self.in_flight.remove(&id).is_some()
    }

    /// Stop everything: clears the in-flight set and resets the cursor so the
    /// next chunk schedules against the current clock, not a stale future
    /// time. Returns how many buffers were cut off.
    pub fn interrupt(&mut self) -> usize {
        let stopped = self.in_flight.len();
        self.in_flight.clear();
        self.cursor = Duration::ZERO;
        stopped
    }

    /// The earliest end time among in-flight buffers, for timer scheduling.
    pub fn next_end(&self) -> Option<(u64, Duration)> {
        self.in_flight
            .values()
            .min_by_key(|b| b.end)
            .map(|b| (b.id, b.end))
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty()
    }

    pub fn cursor(&self) -> Duration {
        self.cursor
    }
}

/// The output device. Appending to the rodio sink in arrival order matches the
/// timeline's back-to-back schedule; `stop()` is the interruption kill-switch.
pub struct Speaker {
    _stream: OutputStream,
    _handle: OutputStreamHandle,
    sink: Sink,
}

impl Speaker {
    pub fn new() -> SessionResult<Self> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|e| SessionError::Playback(e.to_string()))?;
        let sink = Sink::try_new(&handle).map_err(|e| SessionError::Playback(e.to_string()))?;
        info!("playback: output sink ready");
        Ok(Self {
            _stream: stream,
            _handle: handle,
            sink,
        })
    }

    /// Queue one decoded chunk at the model's fixed output rate.
    pub fn play(&self, samples: Vec<f32>) {
        if samples.is_empty() {
            return;
        }
        self.sink
            .append(SamplesBuffer::new(1, PLAYBACK_SAMPLE_RATE, samples));
    }

    /// Stop immediately and clear everything queued.
    pub fn stop(&self) {
        self.sink.stop();
    }

    pub fn is_playing(&self) -> bool {
        !self.sink.empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn chunks_schedule_back_to_back_with_no_gap() {
        let mut timeline = OutputTimeline::new();
        let durations = [ms(120), ms(80), ms(200), ms(40)];

        let first = timeline.schedule(ms(10), durations[0]);
        assert_eq!(first.start, ms(10));

        // Each later chunk arrives while audio is still queued; its start must
        // equal the first start plus the sum of all prior durations.
        let mut expected_start = first.end;
        for &d in &durations[1..] {
            let b = timeline.schedule(ms(15), d);
            assert_eq!(b.start, expected_start, "gap or overlap at buffer {}", b.id);
            expected_start = b.end;
        }
        assert_eq!(timeline.in_flight_count(), durations.len());
    }

    #[test]
    fn late_chunk_never_schedules_in_the_past() {
        let mut timeline = OutputTimeline::new();
        timeline.schedule(ms(0), ms(100));
        // A chunk arriving well after the cursor drained starts at "now".
        let b = timeline.schedule(ms(500), ms(100));
        assert_eq!(b.start, ms(500));
        assert_eq!(timeline.cursor(), ms(600));
    }

    #[test]
    fn cursor_never_decreases_without_interruption() {
        let mut timeline = OutputTimeline::new();
        let mut last = Duration::ZERO;
        for i in 0..20 {
            timeline.schedule(ms(i * 7), ms(50));
            assert!(timeline.cursor() >= last);
            last = timeline.cursor();
        }
    }

    #[test]
    fn complete_removes_exactly_the_ended_buffer() {
        let mut timeline = OutputTimeline::new();
        let a = timeline.schedule(ms(0), ms(100));
        let b = timeline.schedule(ms(0), ms(100));
        assert!(timeline.complete(a.id));
        assert!(!timeline.complete(a.id));
        assert_eq!(timeline.in_flight_count(), 1);
        assert!(timeline.complete(b.id));
        assert!(timeline.is_idle());
    }

    #[test]
    fn interruption_clears_in_flight_and_resets_cursor() {
        let mut timeline = OutputTimeline::new();
        for _ in 0..3 {
            timeline.schedule(ms(0), ms(500));
        }
        assert_eq!(timeline.interrupt(), 3);
        assert!(timeline.is_idle());
        assert_eq!(timeline.cursor(), Duration::ZERO);

        // Post-interruption chunk starts at the current clock, not the stale
        // pre-interruption cursor (which had advanced to 1500 ms).
        let b = timeline.schedule(ms(700), ms(100));
        assert_eq!(b.start, ms(700));
    }

    #[test]
    fn next_end_is_the_earliest_in_flight_deadline() {
        let mut timeline = OutputTimeline::new();
        let a = timeline.schedule(ms(0), ms(100));
        timeline.schedule(ms(0), ms(100));
        assert_eq!(timeline.next_end(), Some((a.id, ms(100))));
        timeline.complete(a.id);
        assert_eq!(timeline.next_end().map(|(_, end)| end), Some(ms(200)));
    }
}
