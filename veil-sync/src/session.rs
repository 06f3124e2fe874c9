//! Authenticated session context.
//!
//! A [`Session`] is handed out by `init` and passed to every synchronizer
//! operation. `destroy` bumps the epoch first, so a session captured before
//! the call is rejected by every check that runs after it started.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;

use crate::errors::SyncError;

/// The local identity resolved for one transport session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    own_id:   String,
    own_name: String,
    epoch:    u64,
}

impl Session {
    /// Transport id of the local user.
    pub fn own_id(&self) -> &str { &self.own_id }

    /// Display name of the local user, empty if the transport did not send one.
    pub fn own_name(&self) -> &str { &self.own_name }
}

#[derive(Default)]
pub(crate) struct SessionSlot {
    current: Mutex<Option<Session>>,
    epoch:   AtomicU64,
}

impl SessionSlot {
    /// Memoized session, or the one `resolve` yields (which is then memoized).
    ///
    /// The slot stays locked while `resolve` runs, so concurrent callers share
    /// one self-lookup.
    pub(crate) async fn get_or_resolve<F, Fut>(&self, resolve: F) -> Option<Session>
    where
        F:   FnOnce() -> Fut,
        Fut: std::future::Future<Output = Option<(String, String)>>,
    {
        let mut current = self.current.lock().await;
        if let Some(s) = current.as_ref() {
            return Some(s.clone());
        }
        let epoch = self.epoch.load(Ordering::SeqCst);
        let (own_id, own_name) = resolve().await?;
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return None;
        }
        let session = Session { own_id, own_name, epoch };
        *current = Some(session.clone());
        Some(session)
    }

    pub(crate) async fn clear(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.current.lock().await.take();
    }

    pub(crate) fn check(&self, session: &Session) -> Result<(), SyncError> {
        if session.epoch == self.epoch.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SyncError::SessionClosed)
        }
    }
}
