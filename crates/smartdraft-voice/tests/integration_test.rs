//! Integration tests for the voice session pipeline.
//!
//! Note: tests touching the microphone or the Live API are ignored by
//! default since they require audio hardware and a GEMINI_API_KEY. The rest
//! exercise the pure pipeline stages end to end without devices.

use smartdraft_voice::finalize::Finalizer;
use smartdraft_voice::pcm::{chunk_duration, decode_chunk, encode_frame};
use smartdraft_voice::vad::{SILENCE_HOLD, SPEECH_THRESHOLD_DB};
use smartdraft_voice::{
    loudness_db, ConnState, LiveSession, OutputTimeline, SessionConfig, TurnDetector, VadConfig,
};
use std::time::{Duration, Instant};

/// A capture frame of speech goes out encoded and comes back within
/// quantization error when decoded with the inbound path.
#[test]
fn outbound_audio_survives_the_wire_format() {
    let frame: Vec<f32> = (0..512)
        .map(|i| (i as f32 * 0.05).sin() * 0.5)
        .collect();
    let encoded = encode_frame(&frame);
    let decoded = decode_chunk(&encoded).expect("valid base64 PCM");
    assert_eq!(decoded.len(), frame.len());
    for (a, b) in frame.iter().zip(decoded.iter()) {
        assert!((a - b).abs() <= 1.0 / 32768.0);
    }
}

/// Speech, silence, end of turn: the detector and the loudness meter agree
/// on real sample data, not just on synthetic dB values.
#[test]
fn turn_detection_on_sample_data() {
    let mut detector = TurnDetector::new(VadConfig::default());
    let start = Instant::now();
    let frame_len = Duration::from_millis(32);

    let speech: Vec<f32> = (0..512).map(|i| (i as f32 * 0.3).sin() * 0.4).collect();
    let silence = vec![0.0f32; 512];
    assert!(loudness_db(&speech) >= SPEECH_THRESHOLD_DB);
    assert!(loudness_db(&silence) < SPEECH_THRESHOLD_DB);

    let mut fired = 0;
    let mut now = start;
    for _ in 0..30 {
        if detector.update(loudness_db(&speech), now) {
            fired += 1;
        }
        now += frame_len;
    }
    assert!(detector.is_speaking());

    for _ in 0..60 {
        if detector.update(loudness_db(&silence), now) {
            fired += 1;
        }
        now += frame_len;
    }
    assert_eq!(fired, 1);
    assert!(now - start >= Duration::from_millis(960) + SILENCE_HOLD);
}

/// A burst of inbound chunks schedules gaplessly, and finalization waits for
/// the last buffer to drain before delivering.
#[test]
fn playback_drain_gates_finalization() {
    let mut timeline = OutputTimeline::new();
    let mut finalizer = Finalizer::new(Duration::from_millis(1500));

    // Three 500 ms chunks arrive in a burst at t=0.
    let chunk = chunk_duration(12_000);
    assert_eq!(chunk, Duration::from_millis(500));
    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(timeline.schedule(Duration::ZERO, chunk).id);
    }
    assert_eq!(timeline.cursor(), Duration::from_millis(1500));

    // Tool call lands at t=200 ms while audio is still queued.
    let mut data = smartdraft_voice::GatheredData::new();
    data.insert("title".into(), serde_json::json!("Sportsfest 2026"));
    finalizer.submit(data, Duration::from_millis(200));

    // Grace from the submission expires at t=1700 ms, but three buffers are
    // still in flight so nothing is delivered.
    assert!(finalizer
        .take_ready(Duration::from_millis(1700), timeline.is_idle())
        .is_none());
    assert!(finalizer.has_pending());

    // Buffers drain one by one, each completion restarts the grace timer.
    timeline.complete(ids[0]);
    finalizer.rearm(Duration::from_millis(1800));
    timeline.complete(ids[1]);
    finalizer.rearm(Duration::from_millis(2300));
    timeline.complete(ids[2]);
    finalizer.rearm(Duration::from_millis(2800));
    assert!(timeline.is_idle());

    let delivered = finalizer
        .take_ready(Duration::from_millis(4300), timeline.is_idle())
        .expect("delivered after drain plus grace");
    assert_eq!(delivered["title"], "Sportsfest 2026");

    // Exactly once.
    assert!(finalizer
        .take_ready(Duration::from_millis(5000), timeline.is_idle())
        .is_none());
}

/// An interruption that empties the in-flight set must restart the grace
/// timer itself: the cut-off buffers never end, so without the rearm at the
/// interruption a pending tool result would sit undelivered forever.
#[test]
fn interruption_still_delivers_a_pending_result() {
    let mut timeline = OutputTimeline::new();
    let mut finalizer = Finalizer::new(Duration::from_millis(1500));

    // A long closing-remarks chunk is playing when the tool call lands.
    timeline.schedule(Duration::ZERO, Duration::from_secs(10));
    let mut data = smartdraft_voice::GatheredData::new();
    data.insert("title".into(), serde_json::json!("Club Charter"));
    finalizer.submit(data, Duration::ZERO);

    // Grace fires at t=1500 ms while playback is busy: the slot disarms but
    // the payload stays pending.
    assert!(finalizer
        .take_ready(Duration::from_millis(1500), timeline.is_idle())
        .is_none());
    assert!(finalizer.has_pending());
    assert!(finalizer.deadline().is_none());

    // The user barges in at t=2000 ms. The interruption empties the set and
    // restarts the grace timer, standing in for the buffer end that will
    // never come.
    timeline.interrupt();
    finalizer.rearm(Duration::from_millis(2000));
    assert!(timeline.is_idle());

    let delivered = finalizer
        .take_ready(Duration::from_millis(3500), timeline.is_idle())
        .expect("delivered one grace period after the interruption");
    assert_eq!(delivered["title"], "Club Charter");
}

/// An interruption mid-playback clears the queue; the next response starts
/// from a fresh cursor.
#[test]
fn interruption_resets_the_output_timeline() {
    let mut timeline = OutputTimeline::new();
    let chunk = chunk_duration(24_000);
    timeline.schedule(Duration::ZERO, chunk);
    timeline.schedule(Duration::ZERO, chunk);
    assert_eq!(timeline.interrupt(), 2);
    assert!(timeline.is_idle());

    let buf = timeline.schedule(Duration::from_millis(50), chunk);
    assert_eq!(buf.start, Duration::from_millis(50));
}

#[test]
fn session_teardown_is_idempotent() {
    let mut session = LiveSession::without_references(SessionConfig::new("test-key"));
    assert_eq!(session.state(), ConnState::Disconnected);
    session.disconnect();
    session.disconnect();
    assert_eq!(session.state(), ConnState::Disconnected);
}

#[tokio::test]
#[ignore] // Requires audio hardware and a GEMINI_API_KEY
async fn live_session_lifecycle() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let config = SessionConfig::from_env().expect("GEMINI_API_KEY set");
    let mut session = LiveSession::without_references(config);

    session
        .connect(Box::new(|data| {
            println!("gathered: {}", serde_json::Value::Object(data));
        }))
        .await
        .expect("connect");
    assert!(session.is_connected());

    tokio::time::sleep(Duration::from_millis(500)).await;

    session.disconnect();
    assert!(!session.is_connected());
}
