//! Client-side voice activity detection.
//!
//! A deterministic threshold + hold-time detector over per-frame loudness.
//! Server-side VAD is not tunable enough for noisy office microphones; a fixed
//! dB threshold with a 1.5 s hold gives predictable end-of-turn latency
//! independent of network jitter.
//!
//! Two states: Quiet and Speaking. Speaking ends only after a full silence run
//! of `hold` below the threshold, and the end-of-turn signal fires exactly
//! once per run, on the transition itself.

use std::time::{Duration, Instant};

/// Loudness threshold above which a frame counts as speech, in dBFS.
pub const SPEECH_THRESHOLD_DB: f32 = -45.0;

/// Silence duration that ends a turn.
pub const SILENCE_HOLD: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone)]
pub struct VadConfig {
    /// Frames at or above this loudness are speech.
    pub threshold_db: f32,
    /// Continuous silence required to declare end-of-turn.
    pub hold: Duration,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            threshold_db: SPEECH_THRESHOLD_DB,
            hold: SILENCE_HOLD,
        }
    }
}

/// Stateful end-of-turn detector, driven once per capture frame.
///
/// `silence_start` is `Some` exactly while a silence run is in progress.
#[derive(Debug)]
pub struct TurnDetector {
    config: VadConfig,
    speaking: bool,
    silence_start: Option<Instant>,
}

impl TurnDetector {
    pub fn new(config: VadConfig) -> Self {
        Self {
            config,
            speaking: false,
            silence_start: None,
        }
    }

    /// Feed one frame's loudness. Returns `true` on the Speaking -> Quiet
    /// transition, i.e. when the user's turn is complete. Never fires twice
    /// for the same silence run.
    pub fn update(&mut self, loudness_db: f32, now: Instant) -> bool {
        if loudness_db >= self.config.threshold_db {
            self.speaking = true;
            self.silence_start = None;
            return false;
        }

        if !self.speaking {
            return false;
        }

        match self.silence_start {
            None => {
                self.silence_start = Some(now);
                false
            }
            Some(started) => {
                if now.duration_since(started) >= self.config.hold {
                    self.speaking = false;
                    self.silence_start = None;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Whether the detector currently classifies the user as speaking.
    pub fn is_speaking(&self) -> bool {
        self.speaking
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOUD: f32 = -30.0;
    const QUIET: f32 = -60.0;

    fn detector() -> TurnDetector {
        TurnDetector::new(VadConfig::default())
    }

    /// Drive the detector with frames every 32 ms, returning fire times (ms).
    fn run(detector: &mut TurnDetector, spans: &[(f32, u64)]) -> Vec<u64> {
        let epoch = Instant::now();
        let mut fired = Vec::new();
        let mut t_ms = 0u64;
        for &(db, span_ms) in spans {
            let mut elapsed = 0u64;
            while elapsed < span_ms {
                if detector.update(db, epoch + Duration::from_millis(t_ms)) {
                    fired.push(t_ms);
                }
                t_ms += 32;
                elapsed += 32;
            }
        }
        fired
    }

    #[test]
    fn quiet_from_the_start_never_fires() {
        let fired = run(&mut detector(), &[(QUIET, 5_000)]);
        assert!(fired.is_empty());
    }

    #[test]
    fn three_seconds_speech_then_two_seconds_silence_fires_once_at_hold() {
        let mut d = detector();
        let fired = run(&mut d, &[(LOUD, 3_000), (QUIET, 2_000)]);
        assert_eq!(fired.len(), 1);
        // Silence run starts at 3000ms; the signal must come at >= 3000 + 1500.
        assert!(fired[0] >= 4_500, "fired too early at {}ms", fired[0]);
        assert!(fired[0] < 4_600);
        assert!(!d.is_speaking());
    }

    #[test]
    fn one_second_pause_does_not_end_the_turn() {
        let mut d = detector();
        let fired = run(&mut d, &[(LOUD, 2_000), (QUIET, 1_000), (LOUD, 1_000)]);
        assert!(fired.is_empty());
        assert!(d.is_speaking());
    }

    #[test]
    fn fires_at_most_once_per_silence_run() {
        let fired = run(&mut detector(), &[(LOUD, 1_000), (QUIET, 10_000)]);
        assert_eq!(fired.len(), 1);
    }

    #[test]
    fn fires_again_after_speech_resumes() {
        let fired = run(
            &mut detector(),
            &[(LOUD, 1_000), (QUIET, 2_000), (LOUD, 1_000), (QUIET, 2_000)],
        );
        assert_eq!(fired.len(), 2);
    }

    #[test]
    fn loud_frame_resets_the_silence_run() {
        let mut d = detector();
        let epoch = Instant::now();
        assert!(!d.update(LOUD, epoch));
        // 1.4s of silence, one loud blip, then silence again: the run restarts.
        assert!(!d.update(QUIET, epoch + Duration::from_millis(100)));
        assert!(!d.update(QUIET, epoch + Duration::from_millis(1_400)));
        assert!(!d.update(LOUD, epoch + Duration::from_millis(1_450)));
        assert!(!d.update(QUIET, epoch + Duration::from_millis(1_500)));
        assert!(!d.update(QUIET, epoch + Duration::from_millis(2_900)));
        assert!(d.update(QUIET, epoch + Duration::from_millis(3_000)));
    }

    #[test]
    fn threshold_boundary_counts_as_speech() {
        let mut d = detector();
        let epoch = Instant::now();
        assert!(!d.update(SPEECH_THRESHOLD_DB, epoch));
        assert!(d.is_speaking());
    }
}
