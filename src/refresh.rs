//! Background polling for new channel content
//!
//! Periodically asks the loader whether the active channel has new blocks
//! and reports what it finds over a tokio channel.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::loader::{PaginatedLoader, UpdateCheck};

/// Messages sent from the poller to the app
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshMessage {
    /// New blocks were put in front of the active channel
    NewContent { channel: String, added: usize },
    /// The active channel was reloaded from page 1 after being offline
    Reloaded { channel: String, total: usize },
    /// A poll failed; polling continues
    RefreshError(String),
}

/// Configuration for polling
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Time between checks
    pub interval: Duration,
    /// Whether polling runs at all
    pub enabled: bool,
}

/// Shortest interval the poller accepts
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            enabled: true,
        }
    }
}

/// Handle for a running poller
///
/// Dropping the handle stops the poller.
pub struct PollHandle {
    /// Channel for receiving poll results
    pub receiver: mpsc::Receiver<RefreshMessage>,
    shutdown_tx: mpsc::Sender<()>,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    /// Spawns a poller for whatever channel `loader` has selected on each tick
    ///
    /// Intervals below [`MIN_POLL_INTERVAL`] are raised to it.
    pub fn spawn(loader: PaginatedLoader, config: PollConfig) -> Self {
        let (msg_tx, msg_rx) = mpsc::channel(32);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let task = config.enabled.then(|| {
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(config.interval.max(MIN_POLL_INTERVAL));
                // Skip the first tick (immediate)
                interval.tick().await;

                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            let Some(message) = poll_once(&loader).await else {
                                continue;
                            };
                            if msg_tx.send(message).await.is_err() {
                                break;
                            }
                        }
                        _ = shutdown_rx.recv() => {
                            break;
                        }
                    }
                }
                debug!("poller stopped");
            })
        });

        Self {
            receiver: msg_rx,
            shutdown_tx,
            task,
        }
    }

    /// Whether a poller task was started
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Returns a pending message without waiting
    pub fn try_recv(&mut self) -> Option<RefreshMessage> {
        self.receiver.try_recv().ok()
    }

    /// Waits for the next message
    pub async fn recv(&mut self) -> Option<RefreshMessage> {
        self.receiver.recv().await
    }

    /// Stops the poller and waits for it to finish
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn poll_once(loader: &PaginatedLoader) -> Option<RefreshMessage> {
    let channel = loader.current_channel()?;
    match loader.check_for_updates().await {
        Ok(UpdateCheck::Updated { added, .. }) => {
            Some(RefreshMessage::NewContent { channel, added })
        }
        Ok(UpdateCheck::Reloaded { total, .. }) => {
            Some(RefreshMessage::Reloaded { channel, total })
        }
        Ok(_) => None,
        Err(e) => {
            warn!(channel = %channel, error = %e, "poll failed");
            Some(RefreshMessage::RefreshError(e.user_message().to_string()))
        }
    }
}
