//! Typed frames for the Gemini Live (BidiGenerateContent) websocket protocol.
//!
//! Client frames are one-field JSON objects (`setup`, `realtimeInput`,
//! `clientContent`, `toolResponse`); server frames carry optional
//! `serverContent` / `toolCall` / `setupComplete` sections. Tool arguments stay
//! untyped (`serde_json::Value`) at this boundary: the required-field shape
//! varies by document type and is only validated for the presence of the
//! `gatheredData` key further up.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Client -> server
// ---------------------------------------------------------------------------

/// First frame on the wire: model, generation config, system instruction and
/// the declared tools.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupFrame {
    pub setup: Setup,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    pub system_instruction: Content,
    pub tools: Vec<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
    pub speech_config: SpeechConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    /// Base64 PCM payload.
    pub data: String,
}

/// A streamed microphone frame.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInputFrame {
    pub realtime_input: RealtimeInput,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    pub media_chunks: Vec<InlineData>,
}

impl RealtimeInputFrame {
    pub fn audio(mime_type: &str, data: String) -> Self {
        Self {
            realtime_input: RealtimeInput {
                media_chunks: vec![InlineData {
                    mime_type: mime_type.to_string(),
                    data,
                }],
            },
        }
    }
}

/// Explicit end-of-turn control frame, distinct from audio frames. Emitted
/// only on the detector's Speaking -> Quiet transition.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContentFrame {
    pub client_content: ClientContent,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContent {
    pub turn_complete: bool,
}

impl ClientContentFrame {
    pub fn turn_complete() -> Self {
        Self {
            client_content: ClientContent {
                turn_complete: true,
            },
        }
    }
}

/// Acknowledgement for a model-issued function call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponseFrame {
    pub tool_response: ToolResponse,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub function_responses: Vec<FunctionResponse>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub response: Value,
}

// ---------------------------------------------------------------------------
// Server -> client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default)]
    pub setup_complete: Option<Value>,
    #[serde(default)]
    pub server_content: Option<ServerContent>,
    #[serde(default)]
    pub tool_call: Option<ToolCall>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default)]
    pub interrupted: Option<bool>,
    #[serde(default)]
    pub turn_complete: Option<bool>,
    #[serde(default)]
    pub model_turn: Option<Content>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    #[serde(default)]
    pub function_calls: Vec<FunctionCall>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCall {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

/// The three event kinds a server message can carry, in dispatch order:
/// interruption first, then audio, then tool calls.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// Model was interrupted; all in-flight playback must stop.
    Interrupted,
    /// One base64 PCM chunk at the model's output rate.
    AudioChunk(String),
    /// One requested function invocation.
    ToolCall(FunctionCall),
}

impl ServerMessage {
    /// Flatten into dispatchable events. The checks are independent: a single
    /// message may in principle carry more than one kind, and the ordering
    /// here matches the dispatcher contract.
    pub fn into_events(self) -> Vec<ServerEvent> {
        let mut events = Vec::new();

        if let Some(ref content) = self.server_content {
            if content.interrupted.unwrap_or(false) {
                events.push(ServerEvent::Interrupted);
            }
            if let Some(ref turn) = content.model_turn {
                for part in &turn.parts {
                    if let Some(ref inline) = part.inline_data {
                        events.push(ServerEvent::AudioChunk(inline.data.clone()));
                    }
                }
            }
        }

        if let Some(tool_call) = self.tool_call {
            for call in tool_call.function_calls {
                events.push(ServerEvent::ToolCall(call));
            }
        }

        events
    }
}
