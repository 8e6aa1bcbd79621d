//! Session probe: timeout-raced session read with fail-closed semantics.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use uuid::Uuid;

use crate::api::model::Identity;
use crate::api::Backend;
use crate::error::SessionError;

/// Authentication state owned by the probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub authenticated: bool,
    pub loading: bool,
    pub identity: Option<Identity>,
}

impl SessionState {
    fn loading() -> Self {
        Self {
            authenticated: false,
            loading: true,
            identity: None,
        }
    }

    fn unauthenticated() -> Self {
        Self {
            authenticated: false,
            loading: false,
            identity: None,
        }
    }

    fn authenticated(identity: Identity) -> Self {
        Self {
            authenticated: true,
            loading: false,
            identity: Some(identity),
        }
    }
}

/// Wraps the session read in a hard deadline and normalizes every outcome
/// into a binary authenticated/unauthenticated signal.
///
/// Timeout and error are treated identically as unauthenticated: a slow or
/// broken auth service must never grant access. Each fetch is stamped with an
/// epoch; a resolution whose epoch no longer matches the probe's current one
/// lost its race (superseded refetch, sign-out mid-flight) and is discarded.
pub struct SessionProbe {
    backend: Arc<dyn Backend>,
    timeout: Duration,
    tx: watch::Sender<SessionState>,
    epoch: Mutex<u64>,
}

impl SessionProbe {
    /// Create the probe in its initial loading state. Callers issue the
    /// first read with `refetch()`.
    pub fn new(backend: Arc<dyn Backend>, timeout: Duration) -> Self {
        let (tx, _rx) = watch::channel(SessionState::loading());
        Self {
            backend,
            timeout,
            tx,
            epoch: Mutex::new(0),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    /// Id of the authenticated user, if any.
    pub fn user_id(&self) -> Option<Uuid> {
        self.tx.borrow().identity.as_ref().map(|identity| identity.id)
    }

    /// Issue a session read raced against the deadline. Idempotent and
    /// callable any number of times; a later call supersedes an earlier one
    /// still in flight.
    pub async fn refetch(&self) {
        let my_epoch = self.bump_epoch();
        self.tx.send_modify(|state| state.loading = true);

        let outcome = tokio::time::timeout(self.timeout, self.backend.fetch_session()).await;
        let next = match outcome {
            Ok(Ok(Some(payload))) => SessionState::authenticated(payload.identity),
            Ok(Ok(None)) => {
                tracing::debug!("no active session");
                SessionState::unauthenticated()
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "session read failed, treating as unauthenticated");
                SessionState::unauthenticated()
            }
            Err(_) => {
                tracing::warn!(
                    timeout = ?self.timeout,
                    "session read timed out, treating as unauthenticated"
                );
                SessionState::unauthenticated()
            }
        };

        self.commit(my_epoch, next);
    }

    /// Clear local session state immediately, then await the external
    /// sign-out call. The UI never stays authenticated-looking while the
    /// call is pending; a transport failure is reported but the local state
    /// is already cleared.
    pub async fn sign_out(&self) -> Result<(), SessionError> {
        self.bump_epoch();
        self.tx.send_replace(SessionState::unauthenticated());

        match self.backend.sign_out().await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!(error = %e, "sign-out call failed");
                Err(SessionError::SignOutFailed(e.to_string()))
            }
        }
    }

    fn bump_epoch(&self) -> u64 {
        let mut epoch = self.epoch.lock().unwrap();
        *epoch += 1;
        *epoch
    }

    fn commit(&self, my_epoch: u64, next: SessionState) {
        let epoch = self.epoch.lock().unwrap();
        if *epoch != my_epoch {
            tracing::debug!("discarding stale session resolution");
            return;
        }
        self.tx.send_replace(next);
    }
}
