//! Sample sources: pull-based suppliers of raw sensor readings.
//!
//! Every variant answers the same question, "next reading, please", with
//! `Ok(Some(reading))`, `Ok(None)` once the data has run out, or an error.
//! The batcher drives them through `Box<dyn SampleSource>` and never knows
//! which one it holds.

pub mod device;
pub mod replay;
pub mod synthetic;

use async_trait::async_trait;

use crate::config::SourceSelection;
use crate::error::SourceError;
use crate::message::Reading;

pub use device::{DeviceFeed, DeviceQueueSource, device_channel, feed_json_lines};
pub use replay::ReplaySource;
pub use synthetic::SyntheticSource;

/// Capacity of the hand-off queue between a device capture task and its source.
pub const DEVICE_QUEUE_CAPACITY: usize = 256;

#[async_trait]
pub trait SampleSource: Send {
    /// Pull the next reading. `Ok(None)` means end-of-data; callers must not
    /// pull again after it.
    async fn next_reading(&mut self) -> Result<Option<Reading>, SourceError>;

    /// Short human-readable name used in log lines.
    fn describe(&self) -> String;
}

/// Build the source named by `selection`. The live-device variant also returns
/// the feed its capture task must push into.
pub fn open(selection: &SourceSelection) -> Result<(Box<dyn SampleSource>, Option<DeviceFeed>), SourceError> {
    Ok(match selection {
        SourceSelection::Synthetic => (Box::new(SyntheticSource::new()), None),
        SourceSelection::Replay(path) => (Box::new(ReplaySource::open(path)?), None),
        SourceSelection::LiveDevice => {
            let (feed, source) = device_channel(DEVICE_QUEUE_CAPACITY);
            (Box::new(source), Some(feed))
        }
    })
}
