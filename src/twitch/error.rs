use std::fmt;

/// Errors that can occur while talking to Twitch
#[derive(Debug)]
pub enum BotError {
    /// Socket or HTTP I/O failure (retried by the connection loop)
    Transport(String),

    /// Malformed frame or missing session identifier
    Protocol(String),

    /// Missing required credentials or identifiers at startup (fatal)
    Configuration(String),

    /// EventSub subscription registration rejected (carries status/body)
    Subscription(String),

    /// OAuth token refresh failure
    Auth(String),

    /// JSON parsing error
    Json(String),
}

impl fmt::Display for BotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BotError::Transport(msg) => write!(f, "Transport error: {}", msg),
            BotError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            BotError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            BotError::Subscription(msg) => write!(f, "Subscription error: {}", msg),
            BotError::Auth(msg) => write!(f, "Authentication error: {}", msg),
            BotError::Json(msg) => write!(f, "JSON error: {}", msg),
        }
    }
}

impl std::error::Error for BotError {}

impl From<serde_json::Error> for BotError {
    fn from(err: serde_json::Error) -> Self {
        BotError::Json(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for BotError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        BotError::Transport(err.to_string())
    }
}

impl From<reqwest::Error> for BotError {
    fn from(err: reqwest::Error) -> Self {
        BotError::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
