use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error payload the service attaches to `error` events.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ServiceError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub code: Option<String>,
    pub message: String,
    pub param: Option<String>,
    pub event_id: Option<String>,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("WebSocket transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to serialize event: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Malformed inbound frame: {0}")]
    MalformedFrame(serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Header error: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid base64 audio payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Connection is not open")]
    NotConnected,

    #[error("History persistence failed: {0}")]
    Persistence(String),

    #[error("Reconnect attempts exhausted after {0} tries")]
    ReconnectExhausted(u32),

    #[error("The connection was closed unexpectedly")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, Error>;
