//! Session lifecycle: ordered connect, the driver event loop, idempotent
//! teardown.
//!
//! The cpal stream and rodio output handle are not `Send`, so the session
//! runs them on a dedicated driver thread with its own current-thread tokio
//! runtime. `connect()` opens the microphone and fetches reference material
//! on the caller's runtime, then hands off to the driver and waits for its
//! setup verdict. `disconnect()` flips the connected flag, signals the
//! driver and joins it; calling either twice is a no-op.

use crate::capture::{CaptureConfig, MicCapture, CAPTURE_FRAME_SIZE};
use crate::channel::LiveChannel;
use crate::error::{SessionError, SessionResult};
use crate::finalize::{Finalizer, GatheredData, FINALIZE_GRACE};
use crate::instruction::{
    submit_tool_declaration, system_instruction, DocumentType, SUBMIT_TOOL,
};
use crate::pcm::{chunk_duration, decode_chunk, encode_frame, OUTBOUND_MIME};
use crate::playback::{OutputTimeline, Speaker};
use crate::reference::{fetch_reference_block, NullReferenceSource, ReferenceSource};
use crate::vad::{TurnDetector, VadConfig};
use crate::wire::{
    Content, FunctionCall, FunctionResponse, GenerationConfig, Part, PrebuiltVoiceConfig,
    ServerEvent, Setup, SetupFrame, SpeechConfig, VoiceConfig,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Default Live API model.
pub const DEFAULT_MODEL: &str = "models/gemini-2.5-flash-native-audio-preview-09-2025";

/// Default prebuilt voice.
pub const DEFAULT_VOICE: &str = "Kore";

/// Invoked once per finalized interview with the last submitted data.
pub type OnDocumentReady = Box<dyn FnMut(GatheredData) + Send + 'static>;

/// Session configuration. Model, voice, VAD tuning and the finalization
/// grace all have working defaults; only the API key is required.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub api_key: String,
    pub model: String,
    pub voice: String,
    /// Scopes reference-material lookups. No department, no lookups.
    pub department: Option<String>,
    pub document_type: Option<DocumentType>,
    pub capture: CaptureConfig,
    pub vad: VadConfig,
    pub finalize_grace: Duration,
}

impl SessionConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            department: None,
            document_type: None,
            capture: CaptureConfig::default(),
            vad: VadConfig::default(),
            finalize_grace: FINALIZE_GRACE,
        }
    }

    /// Build from environment: `GEMINI_API_KEY` (required),
    /// `SMARTDRAFT_DEPARTMENT` (optional).
    pub fn from_env() -> SessionResult<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| SessionError::Config("GEMINI_API_KEY is not set".to_string()))?;
        let mut config = Self::new(api_key);
        config.department = std::env::var("SMARTDRAFT_DEPARTMENT").ok();
        Ok(config)
    }

    fn setup_frame(&self, reference_block: &str) -> SetupFrame {
        SetupFrame {
            setup: Setup {
                model: self.model.clone(),
                generation_config: GenerationConfig {
                    response_modalities: vec!["AUDIO".to_string()],
                    speech_config: SpeechConfig {
                        voice_config: VoiceConfig {
                            prebuilt_voice_config: PrebuiltVoiceConfig {
                                voice_name: self.voice.clone(),
                            },
                        },
                    },
                },
                system_instruction: Content {
                    parts: vec![Part {
                        text: Some(system_instruction(self.document_type, reference_block)),
                        inline_data: None,
                    }],
                },
                tools: vec![json!({ "functionDeclarations": [submit_tool_declaration()] })],
            },
        }
    }
}

/// Connection state, observable through [`LiveSession::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Disconnected,
    Connecting,
    Connected,
}

/// A live voice session. One microphone, one model connection, one speaker.
pub struct LiveSession {
    config: SessionConfig,
    reference: Arc<dyn ReferenceSource>,
    state: ConnState,
    connected: Arc<AtomicBool>,
    stop_tx: Option<oneshot::Sender<()>>,
    driver: Option<thread::JoinHandle<()>>,
}

impl LiveSession {
    pub fn new(config: SessionConfig, reference: Arc<dyn ReferenceSource>) -> Self {
        Self {
            config,
            reference,
            state: ConnState::Disconnected,
            connected: Arc::new(AtomicBool::new(false)),
            stop_tx: None,
            driver: None,
        }
    }

    /// A session with no reference-material backend.
    pub fn without_references(config: SessionConfig) -> Self {
        Self::new(config, Arc::new(NullReferenceSource))
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnState::Connected
    }

    /// Open the session. Steps run in order: microphone, reference
    /// material, model connection, playback, capture stream. A failure at
    /// any step tears down what was already opened and returns the error.
    /// Calling while connected or connecting is a no-op.
    pub async fn connect(&mut self, on_ready: OnDocumentReady) -> SessionResult<()> {
        if self.state != ConnState::Disconnected {
            debug!("session: connect ignored, already {:?}", self.state);
            return Ok(());
        }
        self.state = ConnState::Connecting;

        // Fail fast on a missing microphone before touching the network.
        let mic = match MicCapture::open(self.config.capture.clone()) {
            Ok(mic) => mic,
            Err(e) => {
                self.state = ConnState::Disconnected;
                return Err(e);
            }
        };

        let reference_block = match (&self.config.department, self.config.document_type) {
            (Some(department), Some(doc_type)) => {
                fetch_reference_block(self.reference.as_ref(), department, doc_type).await
            }
            _ => String::new(),
        };

        let setup = self.config.setup_frame(&reference_block);
        let api_key = self.config.api_key.clone();
        let vad = self.config.vad.clone();
        let grace = self.config.finalize_grace;
        let connected = Arc::clone(&self.connected);

        let (stop_tx, stop_rx) = oneshot::channel();
        let (setup_tx, setup_rx) = oneshot::channel();

        let spawned = thread::Builder::new()
            .name("voice-session".to_string())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        let _ = setup_tx.send(Err(SessionError::Setup(e.to_string())));
                        return;
                    }
                };
                rt.block_on(drive(
                    mic, setup, api_key, vad, grace, connected, stop_rx, setup_tx, on_ready,
                ));
            });
        let driver = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.state = ConnState::Disconnected;
                return Err(SessionError::Setup(e.to_string()));
            }
        };

        match setup_rx.await {
            Ok(Ok(())) => {
                self.stop_tx = Some(stop_tx);
                self.driver = Some(driver);
                self.state = ConnState::Connected;
                info!("session: connected");
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = driver.join();
                self.state = ConnState::Disconnected;
                Err(e)
            }
            Err(_) => {
                let _ = driver.join();
                self.state = ConnState::Disconnected;
                Err(SessionError::Setup("driver exited during setup".to_string()))
            }
        }
    }

    /// Close the session. The connected flag drops first so in-flight
    /// microphone frames are discarded while the driver unwinds. Safe to
    /// call repeatedly and safe to call when never connected.
    pub fn disconnect(&mut self) {
        if self.state == ConnState::Disconnected {
            return;
        }
        self.connected.store(false, Ordering::SeqCst);
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(driver) = self.driver.take() {
            let _ = driver.join();
        }
        self.state = ConnState::Disconnected;
        info!("session: disconnected");
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// The driver event loop. Owns everything that is not `Send`.
#[allow(clippy::too_many_arguments)]
async fn drive(
    mic: MicCapture,
    setup: SetupFrame,
    api_key: String,
    vad: VadConfig,
    grace: Duration,
    connected: Arc<AtomicBool>,
    mut stop_rx: oneshot::Receiver<()>,
    setup_tx: oneshot::Sender<SessionResult<()>>,
    mut on_ready: OnDocumentReady,
) {
    let mut channel = match LiveChannel::connect(&api_key, setup).await {
        Ok(channel) => channel,
        Err(e) => {
            let _ = setup_tx.send(Err(e));
            return;
        }
    };

    let speaker = match Speaker::new() {
        Ok(speaker) => speaker,
        Err(e) => {
            channel.close().await;
            let _ = setup_tx.send(Err(e));
            return;
        }
    };

    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel();
    let _capture_stream = match mic.start(frame_tx) {
        Ok(stream) => stream,
        Err(e) => {
            channel.close().await;
            let _ = setup_tx.send(Err(e));
            return;
        }
    };

    // One silent frame to open the model's audio stream. Losing it is not
    // fatal, real frames follow immediately.
    if let Err(e) = channel
        .send_audio(OUTBOUND_MIME, encode_frame(&[0.0; CAPTURE_FRAME_SIZE]))
        .await
    {
        warn!("session: wake frame failed: {}", e);
    }

    connected.store(true, Ordering::SeqCst);
    if setup_tx.send(Ok(())).is_err() {
        // The connect caller is gone; unwind as a normal teardown.
        connected.store(false, Ordering::SeqCst);
        channel.close().await;
        return;
    }

    let epoch = Instant::now();
    let mut detector = TurnDetector::new(vad);
    let mut timeline = OutputTimeline::new();
    let mut finalizer = Finalizer::new(grace);

    loop {
        let now = epoch.elapsed();
        let mut wake = timeline.next_end().map(|(_, end)| end);
        if let Some(deadline) = finalizer.deadline() {
            wake = Some(wake.map_or(deadline, |w| w.min(deadline)));
        }
        let sleep = tokio::time::sleep(match wake {
            Some(at) => at.saturating_sub(now),
            None => Duration::from_secs(3600),
        });
        tokio::pin!(sleep);

        tokio::select! {
            _ = &mut stop_rx => break,

            frame = frame_rx.recv() => {
                let Some(frame) = frame else { break };
                if !connected.load(Ordering::SeqCst) {
                    continue;
                }
                if detector.update(frame.loudness_db, Instant::now()) {
                    debug!("session: end of user turn");
                    if let Err(e) = channel.send_turn_complete().await {
                        warn!("session: turn-complete send failed: {}", e);
                    }
                }
                if let Err(e) = channel
                    .send_audio(OUTBOUND_MIME, encode_frame(&frame.samples))
                    .await
                {
                    warn!("session: dropped outbound frame: {}", e);
                }
            }

            msg = channel.recv() => {
                let Some(msg) = msg else {
                    info!("session: server closed the channel");
                    break;
                };
                for event in msg.into_events() {
                    match event {
                        ServerEvent::Interrupted => {
                            let dropped = timeline.interrupt();
                            speaker.stop();
                            // The cut-off buffers will never end, so a pending
                            // tool result must get its grace timer restarted
                            // here or it would sit undelivered forever.
                            finalizer.rearm(epoch.elapsed());
                            info!("session: interrupted, dropped {} buffer(s)", dropped);
                        }
                        ServerEvent::AudioChunk(data) => match decode_chunk(&data) {
                            Ok(samples) => {
                                let buf = timeline
                                    .schedule(epoch.elapsed(), chunk_duration(samples.len()));
                                debug!(
                                    "session: chunk {} scheduled {:?}..{:?}",
                                    buf.id, buf.start, buf.end
                                );
                                speaker.play(samples);
                            }
                            Err(e) => warn!("session: bad audio chunk: {}", e),
                        },
                        ServerEvent::ToolCall(call) => {
                            handle_tool_call(&mut channel, &mut finalizer, call, epoch).await;
                        }
                    }
                }
            }

            _ = &mut sleep => {
                let now = epoch.elapsed();
                while let Some((id, end)) = timeline.next_end() {
                    if end > now {
                        break;
                    }
                    timeline.complete(id);
                    finalizer.rearm(now);
                }
                if let Some(data) = finalizer.take_ready(now, timeline.is_idle()) {
                    info!("session: interview finalized, {} field(s)", data.len());
                    on_ready(data);
                }
            }
        }
    }

    speaker.stop();
    channel.close().await;
    connected.store(false, Ordering::SeqCst);
    debug!("session: driver stopped");
}

/// Acknowledge the call on the wire before any finalization bookkeeping, so
/// the model can speak its confirmation while the grace timer runs.
async fn handle_tool_call(
    channel: &mut LiveChannel,
    finalizer: &mut Finalizer,
    call: FunctionCall,
    epoch: Instant,
) {
    if call.name != SUBMIT_TOOL {
        warn!("session: ignoring unknown tool call: {}", call.name);
        return;
    }

    let response = FunctionResponse {
        id: call.id.clone(),
        name: call.name.clone(),
        response: json!({ "result": "Data submitted successfully. Generating document." }),
    };
    if let Err(e) = channel.send_tool_response(response).await {
        warn!("session: tool response send failed: {}", e);
    }

    match call.args.get("gatheredData").and_then(Value::as_object) {
        Some(data) => {
            info!("session: gathered data submitted, {} field(s)", data.len());
            finalizer.submit(data.clone(), epoch.elapsed());
        }
        None => warn!("session: tool call without a gatheredData object, skipped"),
    }
}
