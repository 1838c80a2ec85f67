//! Error types for the voice-agent session layer.

use thiserror::Error;

/// Result type alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors that can occur in a live voice session.
///
/// Only [`SessionError::DeviceUnavailable`] and [`SessionError::Setup`] propagate
/// to the caller of `connect()`; everything else is contained within the session
/// and logged (a failed frame send or a bad audio chunk never tears the session
/// down).
#[derive(Error, Debug)]
pub enum SessionError {
    /// Microphone missing or permission denied. Fatal to connect.
    #[error("microphone not found or permission denied: {0}")]
    DeviceUnavailable(String),

    #[error("audio capture error: {0}")]
    Capture(String),

    #[error("audio playback error: {0}")]
    Playback(String),

    /// Session-open failure (websocket connect, setup handshake). Fatal to connect.
    #[error("session setup failed: {0}")]
    Setup(String),

    #[error("channel error: {0}")]
    Channel(String),

    #[error("malformed audio chunk: {0}")]
    Decode(String),

    #[error("reference lookup error: {0}")]
    Reference(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<cpal::DefaultStreamConfigError> for SessionError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        SessionError::DeviceUnavailable(err.to_string())
    }
}

impl From<cpal::BuildStreamError> for SessionError {
    fn from(err: cpal::BuildStreamError) -> Self {
        SessionError::Capture(err.to_string())
    }
}

impl From<cpal::PlayStreamError> for SessionError {
    fn from(err: cpal::PlayStreamError) -> Self {
        SessionError::Capture(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SessionError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        SessionError::Channel(err.to_string())
    }
}
