//! In-process collection server for end-to-end session tests.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use warp::Filter;
use warp::ws::{Message as WsMsg, WebSocket};

/// Accepts websocket upgrades on `/ws` and hands each socket to the test.
pub struct MockServer {
    pub url: String,
    sockets: mpsc::UnboundedReceiver<WebSocket>,
}

impl MockServer {
    pub fn start() -> Self {
        let (tx, sockets) = mpsc::unbounded_channel();

        let route = warp::path("ws").and(warp::ws()).map(move |ws: warp::ws::Ws| {
            let tx = tx.clone();
            ws.on_upgrade(move |socket| async move {
                let _ = tx.send(socket);
            })
        });

        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        Self {
            url: format!("ws://{addr}/ws"),
            sockets,
        }
    }

    /// Wait for the next client connection.
    pub async fn accept(&mut self) -> MockPeer {
        let ws = self.sockets.recv().await.expect("mock server stopped");
        MockPeer { ws }
    }
}

/// The server side of one client connection.
pub struct MockPeer {
    ws: WebSocket,
}

impl MockPeer {
    /// Next text frame as JSON; `None` once the client closes or goes away.
    pub async fn recv_json(&mut self) -> Option<Value> {
        while let Some(Ok(msg)) = self.ws.next().await {
            if msg.is_close() {
                return None;
            }
            if let Ok(text) = msg.to_str() {
                return Some(serde_json::from_str(text).expect("client sent invalid JSON"));
            }
        }
        None
    }

    pub async fn send_json(&mut self, value: Value) {
        self.send_raw(&value.to_string()).await;
    }

    pub async fn send_raw(&mut self, text: &str) {
        self.ws.send(WsMsg::text(text)).await.expect("send to client");
    }

    /// Read the credentials frame and answer with `status`.
    pub async fn authenticate(&mut self, status: &str, err_msg: Option<&str>) -> Value {
        let credentials = self.recv_json().await.expect("credentials frame");
        assert_eq!(credentials["type"], "auth_credentials");

        let mut reply = json!({"type": "auth", "value": {"status": status}});
        if let Some(err_msg) = err_msg {
            reply["value"]["err_msg"] = json!(err_msg);
        }
        self.send_json(reply).await;
        credentials
    }

    pub async fn send_config(&mut self, send_rate: u32, sample_rate_per_send: u32) {
        self.send_json(json!({
            "type": "client_config",
            "value": {"send_rate": send_rate, "sample_rate_per_send": sample_rate_per_send}
        }))
        .await;
    }

    pub async fn send_command(&mut self, cmd: &str) {
        self.send_json(json!({"type": "rec_cmd", "value": {"cmd": cmd}})).await;
    }

    /// Every frame the client sends until it closes the connection.
    pub async fn frames_until_close(&mut self) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Some(frame) = self.recv_json().await {
            frames.push(frame);
        }
        frames
    }

    /// Start the closing handshake and wait for the client to finish it.
    pub async fn close(mut self, code: u16, reason: &'static str) {
        let _ = self.ws.send(WsMsg::close_with(code, reason)).await;
        while let Some(Ok(_)) = self.ws.next().await {}
    }
}

/// The `data` strings of every point in a `sensor_data_points` frame.
pub fn point_data(frame: &Value) -> Vec<String> {
    frame["value"]["data_points"]
        .as_array()
        .map(|points| points.iter().filter_map(|p| p["data"].as_str().map(str::to_owned)).collect())
        .unwrap_or_default()
}
