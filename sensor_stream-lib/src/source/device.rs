use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

use super::SampleSource;
use crate::error::SourceError;
use crate::message::Reading;

/// Producer end of the live-device hand-off queue. Dropping it ends the stream.
#[derive(Debug)]
pub struct DeviceFeed {
    tx: mpsc::Sender<Reading>,
}

impl DeviceFeed {
    /// Push one reading, waiting while the queue is full.
    /// Returns false once the consuming source is gone.
    pub async fn push(&self, reading: Reading) -> bool {
        self.tx.send(reading).await.is_ok()
    }
}

/// Consumer end: readings pushed by an external capture task.
pub struct DeviceQueueSource {
    rx: mpsc::Receiver<Reading>,
}

/// Bounded single-producer/single-consumer queue between a capture task and its source.
pub fn device_channel(capacity: usize) -> (DeviceFeed, DeviceQueueSource) {
    let (tx, rx) = mpsc::channel(capacity);
    (DeviceFeed { tx }, DeviceQueueSource { rx })
}

#[async_trait]
impl SampleSource for DeviceQueueSource {
    async fn next_reading(&mut self) -> Result<Option<Reading>, SourceError> {
        Ok(self.rx.recv().await)
    }

    fn describe(&self) -> String {
        "live device".into()
    }
}

/// Capture task: forward newline-delimited JSON readings from `reader` into `feed`.
///
/// Lines that are not JSON are skipped. Returns the number of readings forwarded
/// when the reader hits EOF or the source goes away; the feed is dropped on return.
pub async fn feed_json_lines<R>(reader: R, feed: DeviceFeed) -> Result<u64, SourceError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut forwarded = 0u64;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let reading: Reading = match serde_json::from_str(line) {
            Ok(reading) => reading,
            Err(e) => {
                warn!("Skipping unreadable device line {line:?}: {e}");
                continue;
            }
        };
        if !feed.push(reading).await {
            debug!("Device source dropped, stopping feed");
            return Ok(forwarded);
        }
        forwarded += 1;
    }

    info!("Device feed reached end of stream after {forwarded} readings");
    Ok(forwarded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn pulls_in_push_order_then_ends_with_feed() {
        let (feed, mut source) = device_channel(4);
        assert!(feed.push(json!({"heart_rate": 70})).await);
        assert!(feed.push(json!({"heart_rate": 71})).await);
        drop(feed);

        assert_eq!(source.next_reading().await.unwrap(), Some(json!({"heart_rate": 70})));
        assert_eq!(source.next_reading().await.unwrap(), Some(json!({"heart_rate": 71})));
        assert_eq!(source.next_reading().await.unwrap(), None);
    }

    #[tokio::test]
    async fn pull_suspends_until_reading_arrives() {
        let (feed, mut source) = device_channel(1);
        let pull = tokio::spawn(async move { source.next_reading().await });

        tokio::task::yield_now().await;
        assert!(!pull.is_finished());
        feed.push(json!(1)).await;
        assert_eq!(pull.await.unwrap().unwrap(), Some(json!(1)));
    }

    #[tokio::test]
    async fn json_lines_feed_skips_garbage() {
        let input = b"{\"heart_rate\": 64}\nnot json\n\n{\"heart_rate\": 66}\n";
        let (feed, mut source) = device_channel(8);

        let forwarded = feed_json_lines(BufReader::new(&input[..]), feed).await.unwrap();
        assert_eq!(forwarded, 2);

        assert_eq!(source.next_reading().await.unwrap(), Some(json!({"heart_rate": 64})));
        assert_eq!(source.next_reading().await.unwrap(), Some(json!({"heart_rate": 66})));
        assert_eq!(source.next_reading().await.unwrap(), None);
    }
}
