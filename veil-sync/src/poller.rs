//! Single-flight history poller.
//!
//! [`MessagePoller`] keeps one conversation fresh by re-fetching its history
//! on an interval. The next fetch is only scheduled once the previous one has
//! settled, so at most one request per poller is ever in flight.
//!
//! # Example
//! ```rust,no_run
//! use veil_sync::{MessagePoller, PollConfig, PollEvent, Peer, Session, Synchronizer, Encryption};
//! use veil_client::RpcTransport;
//!
//! async fn watch<T: RpcTransport, E: Encryption>(sync: Synchronizer<T, E>, session: Session, peer: Peer) {
//!     let mut poller = MessagePoller::spawn(sync, session, peer, PollConfig::default());
//!     while let Some(event) = poller.next().await {
//!         match event {
//!             PollEvent::Messages(msgs) => println!("{} messages", msgs.len()),
//!             PollEvent::Failed(e)      => eprintln!("poll failed: {e}"),
//!         }
//!     }
//! }
//! ```

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use veil_client::RpcTransport;

use crate::model::{History, Message, Peer};
use crate::overlay::Encryption;
use crate::{Session, SyncError, Synchronizer};

/// Poll settings.
#[derive(Clone, Debug)]
pub struct PollConfig {
    /// Messages fetched per poll.
    pub limit:    i32,
    /// Pause between the end of one fetch and the start of the next.
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { limit: 25, interval: Duration::from_secs(1) }
    }
}

/// What a poll produced.
#[derive(Debug)]
pub enum PollEvent {
    /// The history changed; oldest first, ready for display.
    Messages(Vec<Message>),
    /// The fetch failed. Polling continues unless the session was closed.
    Failed(SyncError),
}

/// Handle to a running poll task. Dropping it stops the task.
pub struct MessagePoller {
    rx:     mpsc::Receiver<PollEvent>,
    cancel: CancellationToken,
    task:   Option<JoinHandle<()>>,
}

impl MessagePoller {
    /// Start polling `peer`. The first fetch happens immediately.
    pub fn spawn<T, E>(sync: Synchronizer<T, E>, session: Session, peer: Peer, config: PollConfig) -> Self
    where
        T: RpcTransport,
        E: Encryption,
    {
        let (tx, rx) = mpsc::channel(16);
        let cancel   = CancellationToken::new();
        let token    = cancel.clone();

        let task = tokio::spawn(async move {
            let mut hash = 0u32;
            loop {
                let fetched = tokio::select! {
                    _ = token.cancelled() => break,
                    r = sync.list_messages(&session, &peer, config.limit, hash) => r,
                };

                let event = match fetched {
                    Ok(History::Unchanged { .. }) => None,
                    Ok(History::Changed { mut messages, hash: new_hash }) => {
                        hash = new_hash;
                        messages.reverse();
                        Some(PollEvent::Messages(messages))
                    }
                    Err(SyncError::SessionClosed) => {
                        tracing::info!("[poller] Session closed, stopping poll of {}", peer.id);
                        let _ = tx.send(PollEvent::Failed(SyncError::SessionClosed)).await;
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("[poller] Fetching {} failed: {e}", peer.id);
                        Some(PollEvent::Failed(e))
                    }
                };
                if let Some(event) = event {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }

                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(config.interval) => {}
                }
            }
            tracing::debug!("[poller] Poll of {} stopped", peer.id);
        });

        Self { rx, cancel, task: Some(task) }
    }

    /// Wait for the next event. Returns `None` once the poller has stopped.
    pub async fn next(&mut self) -> Option<PollEvent> {
        self.rx.recv().await
    }

    /// Stop polling. An in-flight fetch is abandoned and its result dropped.
    pub fn stop(&mut self) {
        self.cancel.cancel();
        self.rx.close();
    }

    /// Stop polling and wait for the task to exit.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for MessagePoller {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
