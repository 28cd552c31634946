use tokio::sync::watch;

use crate::config::ClientConfig;
use crate::error::ClientError;

/// Signals shared by the two halves of a session.
///
/// The inbound handler is the only writer. The outbound handler waits on the
/// config latch once and on the sending gate every cycle.
#[derive(Debug)]
pub struct ControlState {
    config: watch::Sender<Option<ClientConfig>>,
    sending: watch::Sender<bool>,
}

impl Default for ControlState {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlState {
    /// Fresh state: no config, sending disabled.
    pub fn new() -> Self {
        let (config, _) = watch::channel(None);
        let (sending, _) = watch::channel(false);
        Self { config, sending }
    }

    /// Set the one-shot config latch. Returns false if it was already set.
    pub fn publish_config(&self, resolved: ClientConfig) -> bool {
        self.config.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(resolved);
            true
        })
    }

    pub fn config(&self) -> Option<ClientConfig> {
        *self.config.borrow()
    }

    /// Suspend until the config latch is set.
    pub async fn wait_config(&self) -> Result<ClientConfig, ClientError> {
        let mut rx = self.config.subscribe();
        let resolved = rx.wait_for(Option::is_some).await.map_err(|_| ClientError::ControlClosed)?;
        (*resolved).ok_or(ClientError::ControlClosed)
    }

    /// Open or close the sending gate.
    pub fn set_sending(&self, enabled: bool) {
        self.sending.send_if_modified(|current| {
            let changed = *current != enabled;
            *current = enabled;
            changed
        });
    }

    pub fn sending_enabled(&self) -> bool {
        *self.sending.borrow()
    }

    /// Suspend until the sending gate is open.
    pub async fn wait_sending_enabled(&self) -> Result<(), ClientError> {
        let mut rx = self.sending.subscribe();
        rx.wait_for(|enabled| *enabled).await.map_err(|_| ClientError::ControlClosed)?;
        Ok(())
    }
}
