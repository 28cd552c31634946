use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

use super::SampleSource;
use crate::error::SourceError;
use crate::message::Reading;

/// Endless stream of heart-rate shaped readings with a random heart rate.
pub struct SyntheticSource {
    rng: StdRng,
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticSource {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic generator for tests and reproducible runs.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

#[async_trait]
impl SampleSource for SyntheticSource {
    async fn next_reading(&mut self) -> Result<Option<Reading>, SourceError> {
        let heart_rate: u8 = self.rng.gen_range(60..=100);
        Ok(Some(json!({
            "heart_rate": heart_rate,
            "energy_expended": 0,
            "rr_intervals": 0,
        })))
    }

    fn describe(&self) -> String {
        "synthetic generator".into()
    }
}
