use std::path::PathBuf;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Start-up configuration problems. The session never starts when one of these is raised.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("options '--file' and '--live-device' cannot be used at the same time")]
    ConflictingSources,

    #[error("replay file {path} is not usable: {reason}")]
    ReplayFile { path: PathBuf, reason: String },
}

/// Failures raised by a sample source. End-of-data is not one of them.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed row at line {line}: {source}")]
    Parse {
        line: u64,
        #[source]
        source: csv::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Reasons the auth handshake did not succeed.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("server rejected credentials: {}", .err_msg.as_deref().unwrap_or("no reason given"))]
    Rejected { err_msg: Option<String> },

    #[error("connection closed before the auth reply arrived")]
    ClosedDuringHandshake,

    #[error("unreadable auth reply: {0}")]
    InvalidReply(String),

    #[error("transport error during handshake: {0}")]
    Transport(#[from] tungstenite::Error),
}

/// Errors that end a session.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("could not connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tungstenite::Error,
    },

    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("sample source failed: {0}")]
    Source(#[from] SourceError),

    #[error("connection closed unexpectedly (code {code}): {reason}")]
    ClosedAbnormally { code: u16, reason: String },

    #[error("websocket error: {0}")]
    Transport(#[from] tungstenite::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("control state dropped while a handler was waiting on it")]
    ControlClosed,
}
