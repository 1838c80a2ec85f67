//! Wire PCM encoding and decoding.
//!
//! Outbound: f32 frames become 16-bit signed little-endian PCM, base64-encoded,
//! tagged `audio/pcm;rate=16000`. Inbound: the model's base64 chunks are 16-bit
//! LE PCM at a fixed 24 kHz; an odd-length payload is padded with one zero byte
//! to stay sample-aligned.

use crate::error::{SessionError, SessionResult};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;

/// Mime type declared on every outbound audio frame.
pub const OUTBOUND_MIME: &str = "audio/pcm;rate=16000";

/// The model's fixed output sample rate.
pub const PLAYBACK_SAMPLE_RATE: u32 = 24_000;

/// Encode one capture frame to the outbound wire format.
pub fn encode_frame(samples: &[f32]) -> String {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        let quantized = (clamped * 32768.0) as i16;
        bytes.extend_from_slice(&quantized.to_le_bytes());
    }
    B64.encode(&bytes)
}

/// Decode one inbound base64 chunk into normalized f32 samples.
pub fn decode_chunk(data: &str) -> SessionResult<Vec<f32>> {
    let mut bytes = B64
        .decode(data)
        .map_err(|e| SessionError::Decode(e.to_string()))?;

    // Sample alignment: tolerate a truncated trailing byte.
    if bytes.len() % 2 != 0 {
        bytes.push(0);
    }

    let samples = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect();
    Ok(samples)
}

/// Duration of `sample_count` mono samples at the model's output rate, in
/// whole microseconds.
pub fn chunk_duration(sample_count: usize) -> std::time::Duration {
    std::time::Duration::from_micros(
        sample_count as u64 * 1_000_000 / PLAYBACK_SAMPLE_RATE as u64,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_as_outbound(data: &str) -> Vec<f32> {
        // Same i16 LE layout on both directions; reuse the inbound decoder.
        decode_chunk(data).unwrap()
    }

    #[test]
    fn round_trip_all_zero_frame() {
        let frame = vec![0.0f32; 512];
        let decoded = decode_as_outbound(&encode_frame(&frame));
        assert_eq!(decoded.len(), 512);
        assert!(decoded.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn round_trip_sine_within_quantization_error() {
        let frame: Vec<f32> = (0..512)
            .map(|i| 0.8 * (i as f32 * std::f32::consts::TAU / 100.0).sin())
            .collect();
        let decoded = decode_as_outbound(&encode_frame(&frame));
        assert_eq!(decoded.len(), frame.len());
        for (orig, got) in frame.iter().zip(&decoded) {
            assert!((orig - got).abs() <= 1.0 / 32768.0 + 1e-6);
        }
    }

    #[test]
    fn clipping_samples_are_clamped() {
        let decoded = decode_as_outbound(&encode_frame(&[2.0, -2.0]));
        assert!(decoded[0] > 0.99);
        assert!(decoded[1] <= -0.99);
    }

    #[test]
    fn odd_length_payload_is_padded() {
        // Three raw bytes -> two samples after zero-padding.
        let data = B64.encode([0x00u8, 0x40, 0x7f]);
        let samples = decode_chunk(&data).unwrap();
        assert_eq!(samples.len(), 2);
        assert!((samples[0] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn garbage_base64_is_a_decode_error() {
        assert!(decode_chunk("not base64!!!").is_err());
    }

    #[test]
    fn chunk_duration_at_24khz() {
        assert_eq!(chunk_duration(24_000), std::time::Duration::from_secs(1));
        assert_eq!(
            chunk_duration(12_000),
            std::time::Duration::from_millis(500)
        );
    }
}
