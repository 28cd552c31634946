use std::time::Duration;

use chrono::Utc;
use log::debug;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::message::{Batch, DataPoint};
use crate::source::SampleSource;

/// Largest up-front allocation for a batch; bigger batches grow as they fill.
const MAX_PREALLOCATED_POINTS: usize = 1024;

/// Pulls fixed-size, paced batches out of a sample source.
pub struct Batcher<'a> {
    source: &'a mut dyn SampleSource,
    samples_per_batch: usize,
    pacing: Duration,
}

impl<'a> Batcher<'a> {
    pub fn new(source: &'a mut dyn SampleSource, config: &ClientConfig) -> Self {
        Self {
            source,
            samples_per_batch: config.sample_rate_per_send.get() as usize,
            pacing: config.pacing(),
        }
    }

    pub fn source_name(&self) -> String {
        self.source.describe()
    }

    /// Build one complete batch, sleeping `pacing` after every pull.
    ///
    /// Returns `Ok(None)` when the source runs dry; whatever was collected for
    /// the current batch is dropped, never sent short.
    pub async fn next_batch(&mut self) -> Result<Option<Batch>, ClientError> {
        let mut points = Vec::with_capacity(self.samples_per_batch.min(MAX_PREALLOCATED_POINTS));

        for _ in 0..self.samples_per_batch {
            let Some(reading) = self.source.next_reading().await? else {
                if !points.is_empty() {
                    debug!("Discarding {} points of incomplete batch", points.len());
                }
                return Ok(None);
            };
            points.push(DataPoint::capture(&reading)?);
            tokio::time::sleep(self.pacing).await;
        }

        Ok(Some(Batch {
            data_points: points,
            time_sent: Utc::now(),
        }))
    }
}
