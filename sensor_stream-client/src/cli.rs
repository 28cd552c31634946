use std::num::NonZeroU32;
use std::path::PathBuf;

use clap::Parser;
use sensor_stream_lib::{ConfigError, SessionConfig, SourceSelection};

/// Stream sensor readings to a collection server over a websocket.
#[derive(Debug, Parser)]
#[command(name = "sensor-stream", about)]
pub struct Args {
    /// Label identifying this participant to the server.
    #[arg(default_value = "Alice")]
    pub participant_label: String,

    /// Websocket URL of the collection server.
    #[arg(short, long, env = "SENSOR_STREAM_URL", default_value = "ws://127.0.0.1:8001")]
    pub url: String,

    /// Admin password sent in the auth handshake.
    #[arg(short = 'P', long = "password", env = "SENSOR_STREAM_PASSWORD", hide_env_values = true)]
    pub admin_password: String,

    /// Batches per second; overrides the server's value.
    #[arg(short, long)]
    pub send_rate: Option<NonZeroU32>,

    /// Readings per batch; overrides the server's value.
    #[arg(short = 'r', long)]
    pub sample_rate_per_send: Option<NonZeroU32>,

    /// Stream as soon as the config arrives instead of waiting for a start command.
    #[arg(short, long)]
    pub auto_send: bool,

    /// Replay readings from a CSV file instead of generating them.
    #[arg(short, long, value_name = "PATH", conflicts_with = "live_device")]
    pub file: Option<PathBuf>,

    /// Read live device readings (JSON lines) from stdin.
    #[arg(short = 'b', long)]
    pub live_device: bool,

    /// Default log filter when RUST_LOG is unset (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Validate the arguments into the immutable session config.
    pub fn into_session_config(self) -> Result<SessionConfig, ConfigError> {
        let source = SourceSelection::from_flags(self.file, self.live_device)?;
        Ok(SessionConfig {
            participant_label: self.participant_label,
            url: self.url,
            admin_password: self.admin_password,
            send_rate: self.send_rate,
            sample_rate_per_send: self.sample_rate_per_send,
            auto_send: self.auto_send,
            source,
        })
    }
}
