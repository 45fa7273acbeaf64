use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("websocket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("channel closed")]
    ChannelClosed,
    #[error("invalid relay url '{url}': {reason}")]
    InvalidRelayUrl { url: String, reason: String },
    #[error("invalid acknowledgement url '{url}': {reason}")]
    InvalidAckUrl { url: String, reason: String },
    #[error("user id must not be empty")]
    MissingUserId,
}
