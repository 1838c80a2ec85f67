//! smartdraft-voice: realtime voice interviews for document drafting.
//!
//! The crate runs a full-duplex voice session against the Gemini Live API.
//! The microphone is captured at 16 kHz mono and streamed as base64 PCM; a
//! loudness-based turn detector signals end of turn after 1.5 s of silence;
//! inbound 24 kHz audio is decoded, scheduled on a gapless output timeline
//! and played through the default output device. When the model calls the
//! `submit_document_details` tool, a grace timer lets the closing remarks
//! finish before the gathered data is handed to the caller exactly once.
//!
//! Layering, bottom up:
//!
//! - [`pcm`], [`capture`], [`vad`]: sample math, the cpal input stream and
//!   the turn detector.
//! - [`wire`], [`channel`]: typed protocol frames and the websocket.
//! - [`playback`], [`finalize`]: the output timeline, the rodio sink and
//!   the finalization coordinator.
//! - [`instruction`], [`reference`]: system-instruction assembly and the
//!   optional reference-material backend.
//! - [`session`]: ties it all together behind [`LiveSession`].
//!
//! ```no_run
//! use smartdraft_voice::{LiveSession, SessionConfig};
//!
//! # async fn run() -> smartdraft_voice::SessionResult<()> {
//! let config = SessionConfig::from_env()?;
//! let mut session = LiveSession::without_references(config);
//! session
//!     .connect(Box::new(|data| {
//!         println!("gathered: {}", serde_json::Value::Object(data));
//!     }))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod channel;
pub mod error;
pub mod finalize;
pub mod instruction;
pub mod pcm;
pub mod playback;
pub mod reference;
pub mod session;
pub mod vad;
pub mod wire;

pub use capture::{loudness_db, CaptureConfig, CaptureFrame, MicCapture};
pub use error::{SessionError, SessionResult};
pub use finalize::{Finalizer, GatheredData};
pub use instruction::DocumentType;
pub use playback::OutputTimeline;
pub use reference::{NullReferenceSource, ReferenceSource, RestReferenceSource};
pub use session::{ConnState, LiveSession, OnDocumentReady, SessionConfig};
pub use vad::{TurnDetector, VadConfig};
