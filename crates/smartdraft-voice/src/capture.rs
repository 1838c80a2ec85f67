//! Microphone capture pipeline.
//!
//! Pulls raw frames from the default input device via CPAL at 16 kHz mono,
//! regroups them into fixed-size frames, and stamps each frame with its RMS
//! loudness in dBFS. Device probing happens in [`MicCapture::open`] so that a
//! missing microphone fails the connect fast, before any audio context exists.

use crate::error::{SessionError, SessionResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Sample rate the remote model requires on the inbound (capture) side.
pub const CAPTURE_SAMPLE_RATE: u32 = 16_000;

/// Samples per capture frame (32 ms at 16 kHz). Also the size of the silent
/// wake frame sent right after connect.
pub const CAPTURE_FRAME_SIZE: usize = 512;

/// Floor for the RMS before converting to decibels, so absolute silence maps
/// to a finite -100 dB instead of -inf.
const MIN_RMS: f32 = 1e-5;

/// Capture configuration. Defaults match the wire contract (16 kHz mono).
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Frame size in samples.
    pub frame_size: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: CAPTURE_SAMPLE_RATE,
            channels: 1,
            frame_size: CAPTURE_FRAME_SIZE,
        }
    }
}

/// One fixed-size frame of linear PCM from the microphone.
#[derive(Debug, Clone)]
pub struct CaptureFrame {
    /// Samples in -1.0..1.0.
    pub samples: Vec<f32>,
    /// RMS loudness of the frame in dBFS.
    pub loudness_db: f32,
}

/// RMS loudness of a frame in dBFS: `20 * log10(rms)`, with the RMS clamped
/// to a minimum so silence stays finite.
pub fn loudness_db(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 20.0 * MIN_RMS.log10();
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    let rms = (sum_squares / samples.len() as f32).sqrt();
    20.0 * rms.max(MIN_RMS).log10()
}

/// Microphone capture handle. `open()` probes the device; `start()` builds the
/// CPAL stream and begins forwarding frames.
pub struct MicCapture {
    config: CaptureConfig,
    device: Device,
    stream_config: StreamConfig,
}

impl MicCapture {
    /// Probe the default input device. Fails with
    /// [`SessionError::DeviceUnavailable`] when no microphone exists or the
    /// host refuses access, without leaving any resource open.
    pub fn open(config: CaptureConfig) -> SessionResult<Self> {
        let device = cpal::default_host().default_input_device().ok_or_else(|| {
            SessionError::DeviceUnavailable("no input device available".to_string())
        })?;

        info!(
            "capture: using input device '{}' at {} Hz",
            device.name().unwrap_or_else(|_| "unknown".to_string()),
            config.sample_rate
        );

        // Confirms the device is actually usable before we report success.
        device.default_input_config()?;

        let stream_config = StreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        Ok(Self {
            config,
            device,
            stream_config,
        })
    }

    /// Start capturing. Incoming device buffers of arbitrary size are
    /// regrouped into `frame_size` frames; each frame is loudness-stamped and
    /// sent over `frame_tx`. The returned [`Stream`] must be kept alive for
    /// capture to continue; dropping it stops the microphone.
    pub fn start(self, frame_tx: mpsc::UnboundedSender<CaptureFrame>) -> SessionResult<Stream> {
        let frame_size = self.config.frame_size;
        let mut pending = Vec::with_capacity(frame_size);

        let stream = self.device.build_input_stream(
            &self.stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                for &sample in data {
                    pending.push(sample);
                    if pending.len() >= frame_size {
                        let samples = std::mem::replace(
                            &mut pending,
                            Vec::with_capacity(frame_size),
                        );
                        let frame = CaptureFrame {
                            loudness_db: loudness_db(&samples),
                            samples,
                        };
                        // Receiver gone means the session is tearing down;
                        // nothing to do from the audio callback.
                        let _ = frame_tx.send(frame);
                    }
                }
            },
            move |err| {
                warn!("capture: stream error: {}", err);
            },
            None,
        )?;

        stream.play()?;
        info!("capture: microphone stream started");

        Ok(stream)
    }
}
