use std::num::NonZeroU32;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio_tungstenite::tungstenite::Message as WsMessage;

/// A raw sensor reading as produced by a sample source.
pub type Reading = Value;

/// Wire tags the client understands, inbound or outbound.
const KNOWN_TYPES: [&str; 4] = ["auth_credentials", "sensor_data_points", "rec_cmd", "client_config"];

/// One timestamped sample. `data` is the reading serialized to a JSON string.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub data: String,
    #[serde(with = "iso8601")]
    pub time_recorded: DateTime<Utc>,
}

impl DataPoint {
    /// Wrap `reading` with the current time as its capture timestamp.
    pub fn capture(reading: &Reading) -> Result<Self, serde_json::Error> {
        Ok(Self {
            data: serde_json::to_string(reading)?,
            time_recorded: Utc::now(),
        })
    }
}

/// A full batch of data points, stamped when it is handed to the socket.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub data_points: Vec<DataPoint>,
    #[serde(with = "iso8601")]
    pub time_sent: DateTime<Utc>,
}

/// Recording commands issued by the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecCommand {
    Start,
    Pause,
    Stop,
}

/// Rates advertised by the server. Either field may be missing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvertisedConfig {
    pub send_rate: Option<NonZeroU32>,
    pub sample_rate_per_send: Option<NonZeroU32>,
}

/// The wire envelope: `{"type": ..., "value": {...}}`, one per text frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Message {
    AuthCredentials {
        admin_password: String,
        participant_label: String,
    },
    SensorDataPoints(Batch),
    RecCmd { cmd: RecCommand },
    ClientConfig(AdvertisedConfig),
}

impl Message {
    /// Serialize into a single websocket text frame.
    pub fn to_frame(&self) -> Result<WsMessage, serde_json::Error> {
        serde_json::to_string(self).map(WsMessage::Text)
    }
}

/// Result of decoding one inbound text frame.
#[derive(Debug, PartialEq)]
pub enum Inbound {
    Message(Message),
    /// Well-formed envelope with a tag this client does not know.
    Unknown(String),
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid JSON: {0}")]
    Json(#[source] serde_json::Error),

    #[error("frame has no string `type` field")]
    MissingType,

    #[error("invalid `{kind}` frame: {source}")]
    InvalidValue {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Decode an inbound frame, separating unknown tags from malformed frames.
pub fn decode_inbound(text: &str) -> Result<Inbound, FrameError> {
    let raw: Value = serde_json::from_str(text).map_err(FrameError::Json)?;
    let kind = raw
        .get("type")
        .and_then(Value::as_str)
        .ok_or(FrameError::MissingType)?
        .to_owned();

    if !KNOWN_TYPES.contains(&kind.as_str()) {
        return Ok(Inbound::Unknown(kind));
    }
    serde_json::from_value(raw)
        .map(Inbound::Message)
        .map_err(|source| FrameError::InvalidValue { kind, source })
}

/// The server's reply to `auth_credentials`. Only `value.status` matters.
#[derive(Debug, Default, Deserialize)]
pub struct AuthReply {
    #[serde(default)]
    pub value: AuthStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthStatus {
    pub status: Option<String>,
    pub err_msg: Option<String>,
}

impl AuthReply {
    pub fn is_success(&self) -> bool {
        self.value.status.as_deref() == Some("success")
    }
}

/// RFC 3339 with microseconds and an explicit `+00:00` offset.
mod iso8601 {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Micros, false))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(de::Error::custom)
    }
}
