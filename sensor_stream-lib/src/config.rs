//! Start-up configuration and the negotiated per-session rates.

use std::fmt;
use std::fs::File;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info, warn};

use crate::error::ConfigError;
use crate::message::AdvertisedConfig;

/// Which sample source feeds the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceSelection {
    Synthetic,
    Replay(PathBuf),
    LiveDevice,
}

impl SourceSelection {
    /// Pick a source from the two start-up flags. They are mutually exclusive,
    /// and a replay file must be a readable regular file.
    pub fn from_flags(file: Option<PathBuf>, live_device: bool) -> Result<Self, ConfigError> {
        match (file, live_device) {
            (Some(_), true) => Err(ConfigError::ConflictingSources),
            (Some(path), false) => {
                check_readable(&path)?;
                Ok(Self::Replay(path))
            }
            (None, true) => Ok(Self::LiveDevice),
            (None, false) => Ok(Self::Synthetic),
        }
    }
}

fn check_readable(path: &Path) -> Result<(), ConfigError> {
    let fail = |reason: String| ConfigError::ReplayFile { path: path.to_path_buf(), reason };

    if !path.is_file() {
        return Err(fail("does not exist or is not a file".into()));
    }
    File::open(path).map_err(|e| fail(format!("cannot be opened for reading: {e}")))?;
    Ok(())
}

/// Immutable session parameters, built once at start-up.
#[derive(Clone)]
pub struct SessionConfig {
    pub participant_label: String,
    pub url: String,
    pub admin_password: String,
    /// Local overrides; win over whatever the server advertises.
    pub send_rate: Option<NonZeroU32>,
    pub sample_rate_per_send: Option<NonZeroU32>,
    /// Skip the recording gate and stream as soon as the config is known.
    pub auto_send: bool,
    pub source: SourceSelection,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("participant_label", &self.participant_label)
            .field("url", &self.url)
            .field("admin_password", &"<redacted>")
            .field("send_rate", &self.send_rate)
            .field("sample_rate_per_send", &self.sample_rate_per_send)
            .field("auto_send", &self.auto_send)
            .field("source", &self.source)
            .finish()
    }
}

/// Fully resolved rates for one session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Batches per second.
    pub send_rate: NonZeroU32,
    /// Samples per batch.
    pub sample_rate_per_send: NonZeroU32,
}

impl ClientConfig {
    /// Delay after each pull so a full batch takes `1 / send_rate` seconds.
    pub fn pacing(&self) -> Duration {
        let samples_per_second = f64::from(self.send_rate.get()) * f64::from(self.sample_rate_per_send.get());
        Duration::from_secs_f64(1.0 / samples_per_second)
    }
}

/// Merges locally supplied rates with `client_config` frames from the server.
///
/// A local value always wins. A field resolved once is never overwritten, and
/// the resolved config is handed out exactly once.
#[derive(Debug)]
pub struct ConfigResolver {
    local_send_rate: Option<NonZeroU32>,
    local_sample_rate: Option<NonZeroU32>,
    send_rate: Option<NonZeroU32>,
    sample_rate_per_send: Option<NonZeroU32>,
    published: bool,
}

impl ConfigResolver {
    pub fn new(send_rate: Option<NonZeroU32>, sample_rate_per_send: Option<NonZeroU32>) -> Self {
        Self {
            local_send_rate: send_rate,
            local_sample_rate: sample_rate_per_send,
            send_rate,
            sample_rate_per_send,
            published: false,
        }
    }

    pub fn from_session(config: &SessionConfig) -> Self {
        Self::new(config.send_rate, config.sample_rate_per_send)
    }

    /// Apply one server advertisement. Returns the config the first time both
    /// fields are resolved, `None` otherwise.
    pub fn apply(&mut self, advertised: AdvertisedConfig) -> Option<ClientConfig> {
        if self.published {
            warn!("Ignoring client_config {advertised:?}: session config is already resolved");
            return None;
        }

        self.send_rate = merge("send rate", self.local_send_rate, self.send_rate, advertised.send_rate);
        self.sample_rate_per_send = merge(
            "sample rate per send",
            self.local_sample_rate,
            self.sample_rate_per_send,
            advertised.sample_rate_per_send,
        );

        match (self.send_rate, self.sample_rate_per_send) {
            (Some(send_rate), Some(sample_rate_per_send)) => {
                self.published = true;
                Some(ClientConfig {
                    send_rate,
                    sample_rate_per_send,
                })
            }
            (send_rate, sample_rate) => {
                debug!("Config incomplete (send_rate={send_rate:?}, sample_rate_per_send={sample_rate:?}), waiting");
                None
            }
        }
    }
}

fn merge(
    field: &str,
    local: Option<NonZeroU32>,
    current: Option<NonZeroU32>,
    server: Option<NonZeroU32>,
) -> Option<NonZeroU32> {
    match (current, server) {
        (None, server) => server,
        (Some(current), Some(server)) if local.is_some() => {
            info!("Overriding {field} {server} from server with {current} from command line");
            Some(current)
        }
        (Some(current), Some(server)) => {
            warn!("Ignoring {field} {server} from server, already resolved to {current}");
            Some(current)
        }
        (Some(current), None) => Some(current),
    }
}
