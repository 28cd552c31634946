use futures::{Sink, SinkExt};
use log::debug;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};

use crate::batcher::Batcher;
use crate::context::ControlState;
use crate::error::ClientError;
use crate::message::Message;
use crate::session::SessionEnd;
use crate::source::SampleSource;

/// Stream batches from `source` to the server.
///
/// Waits for the config latch, then loops: wait for the sending gate (unless
/// `auto_send`), build one batch, write it. Returns when the source runs dry;
/// source and write failures come back as errors. Nothing is sent after return.
pub async fn run<K>(
    sink: &mut K,
    state: &ControlState,
    source: &mut dyn SampleSource,
    auto_send: bool,
) -> Result<SessionEnd, ClientError>
where
    K: Sink<WsMessage, Error = WsError> + Unpin,
{
    let config = state.wait_config().await?;
    debug!("Streaming with {config:?}, auto_send={auto_send}");

    let mut batcher = Batcher::new(source, &config);
    // diagnostic only, never transmitted
    let mut sequence: u64 = 0;

    loop {
        if !auto_send {
            state.wait_sending_enabled().await?;
        }

        let Some(batch) = batcher.next_batch().await? else {
            return Ok(SessionEnd::SourceExhausted {
                source: batcher.source_name(),
            });
        };

        debug!(
            "Sending batch #{sequence}: {} points, time_sent={}",
            batch.data_points.len(),
            batch.time_sent
        );
        let frame = Message::SensorDataPoints(batch).to_frame()?;
        sink.send(frame).await?;
        sequence += 1;
    }
}
