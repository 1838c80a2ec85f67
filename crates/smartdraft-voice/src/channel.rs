//! Full-duplex websocket channel to the Gemini Live API.
//!
//! One channel per session. The caller drives both directions from a single
//! task: `send_*` for outbound frames, `recv` for the next decoded server
//! message. Binary and text frames both carry JSON; anything that fails to
//! parse is logged and skipped rather than killing the stream.

use crate::error::{SessionError, SessionResult};
use crate::wire::{
    ClientContentFrame, FunctionResponse, RealtimeInputFrame, ServerMessage, SetupFrame,
    ToolResponse, ToolResponseFrame,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

const LIVE_HOST: &str = "generativelanguage.googleapis.com";
const LIVE_PATH: &str =
    "/ws/google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateContent";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An established Live API connection that has completed setup.
pub struct LiveChannel {
    ws: WsStream,
}

impl LiveChannel {
    /// Connect, send the setup frame and wait for the server's
    /// `setupComplete` acknowledgement. Any other first message is a
    /// handshake failure.
    pub async fn connect(api_key: &str, setup: SetupFrame) -> SessionResult<Self> {
        let url = format!("wss://{LIVE_HOST}{LIVE_PATH}?key={api_key}");
        let (ws, _resp) = connect_async(url).await?;
        let mut channel = Self { ws };

        channel.send_json(&setup).await?;

        match channel.recv().await {
            Some(msg) if msg.setup_complete.is_some() => {
                debug!("live channel: setup complete");
                Ok(channel)
            }
            Some(_) => Err(SessionError::Setup(
                "server replied before acknowledging setup".to_string(),
            )),
            None => Err(SessionError::Setup(
                "connection closed during setup".to_string(),
            )),
        }
    }

    /// Stream one base64 PCM chunk to the model.
    pub async fn send_audio(&mut self, mime_type: &str, data: String) -> SessionResult<()> {
        self.send_json(&RealtimeInputFrame::audio(mime_type, data))
            .await
    }

    /// Signal end of the user's turn.
    pub async fn send_turn_complete(&mut self) -> SessionResult<()> {
        self.send_json(&ClientContentFrame::turn_complete()).await
    }

    /// Acknowledge a function call.
    pub async fn send_tool_response(&mut self, response: FunctionResponse) -> SessionResult<()> {
        self.send_json(&ToolResponseFrame {
            tool_response: ToolResponse {
                function_responses: vec![response],
            },
        })
        .await
    }

    /// Next server message, or `None` when the connection is closed.
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        loop {
            match self.ws.next().await? {
                Ok(Message::Text(txt)) => match serde_json::from_str(&txt) {
                    Ok(msg) => return Some(msg),
                    Err(e) => warn!("live channel: unparseable text frame: {}", e),
                },
                Ok(Message::Binary(bin)) => match serde_json::from_slice(&bin) {
                    Ok(msg) => return Some(msg),
                    Err(e) => warn!("live channel: unparseable binary frame: {}", e),
                },
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {}
                Ok(Message::Close(frame)) => {
                    debug!("live channel: server close: {:?}", frame);
                    return None;
                }
                Err(e) => {
                    warn!("live channel: receive error: {}", e);
                    return None;
                }
            }
        }
    }

    /// Best-effort close. Errors here mean the socket is already gone.
    pub async fn close(&mut self) {
        if let Err(e) = self.ws.close(None).await {
            debug!("live channel: close: {}", e);
        }
    }

    async fn send_json<T: Serialize>(&mut self, frame: &T) -> SessionResult<()> {
        let txt = serde_json::to_string(frame)
            .map_err(|e| SessionError::Channel(format!("frame serialization: {e}")))?;
        self.ws.send(Message::Text(txt.into())).await?;
        Ok(())
    }
}
