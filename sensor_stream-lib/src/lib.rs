//! sensor_stream-lib: authenticated websocket streaming of batched sensor readings

pub mod batcher;
pub mod config;
pub mod context;
pub mod error;
pub mod handshake;
pub mod inbound;
pub mod message;
pub mod outbound;
pub mod session;
pub mod source;

#[cfg(test)]
mod testing;

// re-exports for ergonomic imports:
pub use config::{ClientConfig, SessionConfig, SourceSelection};
pub use context::ControlState;
pub use error::{AuthError, ClientError, ConfigError, SourceError};
pub use message::Message;
pub use session::{SessionEnd, Supervisor};
pub use source::{DeviceFeed, SampleSource, feed_json_lines};
