//! Shared helpers for unit tests.

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::io::DuplexStream;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::protocol::Role;

use crate::error::SourceError;
use crate::message::Reading;
use crate::source::SampleSource;

pub type TestSocket = WebSocketStream<DuplexStream>;

/// A connected (client, server) websocket pair over an in-memory pipe.
pub async fn ws_pair() -> (TestSocket, TestSocket) {
    let (client, server) = tokio::io::duplex(256 * 1024);
    let client = WebSocketStream::from_raw_socket(client, Role::Client, None).await;
    let server = WebSocketStream::from_raw_socket(server, Role::Server, None).await;
    (client, server)
}

pub fn text(value: Value) -> WsMessage {
    WsMessage::Text(value.to_string())
}

pub fn parse(frame: &WsMessage) -> Value {
    serde_json::from_str(frame.to_text().unwrap()).unwrap()
}

/// Yields `0, 1, 2, ...` up to `len`, then ends (or fails, if `failing`).
pub struct CountingSource {
    next: u64,
    len: u64,
    failing: bool,
}

impl CountingSource {
    pub fn new(len: u64) -> Self {
        Self { next: 0, len, failing: false }
    }

    pub fn unbounded() -> Self {
        Self::new(u64::MAX)
    }

    /// Raise an IO error instead of ending.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }
}

#[async_trait]
impl SampleSource for CountingSource {
    async fn next_reading(&mut self) -> Result<Option<Reading>, SourceError> {
        if self.next == self.len {
            if self.failing {
                return Err(SourceError::Io(std::io::Error::other("device unplugged")));
            }
            return Ok(None);
        }
        self.next += 1;
        Ok(Some(json!(self.next - 1)))
    }

    fn describe(&self) -> String {
        "counter".into()
    }
}

/// The `data` strings of every point in a `sensor_data_points` frame.
pub fn point_values(frame: &Value) -> Vec<String> {
    frame["value"]["data_points"]
        .as_array()
        .map(|points| points.iter().map(|p| p["data"].as_str().unwrap_or_default().to_owned()).collect())
        .unwrap_or_default()
}
