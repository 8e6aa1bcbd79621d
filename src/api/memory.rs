//! In-memory implementation of the `Backend` contract.
//!
//! Serves the demo binary and the test suites. Knobs simulate the failure
//! modes the gate has policies for: rejections, hangs, and absent records.
//! Call counters let tests assert that gated fetches were never dispatched.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::ApiError;

use super::model::{ProfileRecord, SessionPayload, UsageSnapshot};
use super::Backend;

#[derive(Default)]
struct MemoryState {
    session: Option<SessionPayload>,
    usage: HashMap<Uuid, UsageSnapshot>,
    profiles: HashMap<Uuid, ProfileRecord>,
    fail_session: bool,
    fail_usage: bool,
    fail_profile: bool,
    fail_sign_out: bool,
    session_delay: Option<Duration>,
    usage_delay: Option<Duration>,
}

/// In-memory backend with failure and delay knobs.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    session_calls: AtomicU32,
    usage_calls: AtomicU32,
    profile_calls: AtomicU32,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install an active session, as the auth service would after login.
    pub async fn sign_in(&self, payload: SessionPayload) {
        self.state.lock().await.session = Some(payload);
    }

    pub async fn set_usage(&self, user_id: Uuid, usage: UsageSnapshot) {
        self.state.lock().await.usage.insert(user_id, usage);
    }

    pub async fn set_profile(&self, profile: ProfileRecord) {
        self.state
            .lock()
            .await
            .profiles
            .insert(profile.user_id, profile);
    }

    pub async fn remove_profile(&self, user_id: Uuid) {
        self.state.lock().await.profiles.remove(&user_id);
    }

    pub async fn fail_session(&self, fail: bool) {
        self.state.lock().await.fail_session = fail;
    }

    pub async fn fail_usage(&self, fail: bool) {
        self.state.lock().await.fail_usage = fail;
    }

    pub async fn fail_profile(&self, fail: bool) {
        self.state.lock().await.fail_profile = fail;
    }

    pub async fn fail_sign_out(&self, fail: bool) {
        self.state.lock().await.fail_sign_out = fail;
    }

    /// Delay session reads, simulating a slow or hung auth service.
    pub async fn delay_session(&self, delay: Option<Duration>) {
        self.state.lock().await.session_delay = delay;
    }

    /// Delay usage reads.
    pub async fn delay_usage(&self, delay: Option<Duration>) {
        self.state.lock().await.usage_delay = delay;
    }

    pub fn session_call_count(&self) -> u32 {
        self.session_calls.load(Ordering::SeqCst)
    }

    pub fn usage_call_count(&self) -> u32 {
        self.usage_calls.load(Ordering::SeqCst)
    }

    pub fn profile_call_count(&self) -> u32 {
        self.profile_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn fetch_session(&self) -> Result<Option<SessionPayload>, ApiError> {
        self.session_calls.fetch_add(1, Ordering::SeqCst);
        let (delay, fail, session) = {
            let state = self.state.lock().await;
            (
                state.session_delay,
                state.fail_session,
                state.session.clone(),
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(ApiError::Http {
                endpoint: "/api/auth/session".to_string(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(session)
    }

    async fn fetch_usage(&self, user_id: Uuid) -> Result<UsageSnapshot, ApiError> {
        self.usage_calls.fetch_add(1, Ordering::SeqCst);
        let endpoint = format!("/api/users/{user_id}/usage");
        let (delay, fail, usage) = {
            let state = self.state.lock().await;
            (
                state.usage_delay,
                state.fail_usage,
                state.usage.get(&user_id).copied(),
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(ApiError::Http {
                endpoint,
                reason: "connection refused".to_string(),
            });
        }
        Ok(usage.unwrap_or_default())
    }

    async fn fetch_profile(&self, user_id: Uuid) -> Result<Option<ProfileRecord>, ApiError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().await;
        if state.fail_profile {
            return Err(ApiError::Http {
                endpoint: format!("/api/users/{user_id}/profile"),
                reason: "connection refused".to_string(),
            });
        }
        Ok(state.profiles.get(&user_id).cloned())
    }

    async fn sign_out(&self) -> Result<(), ApiError> {
        let mut state = self.state.lock().await;
        let fail = state.fail_sign_out;
        state.session = None;
        if fail {
            return Err(ApiError::Http {
                endpoint: "/api/auth/sign-out".to_string(),
                reason: "connection reset".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use secrecy::SecretString;

    use crate::api::model::{CharacterClass, Identity, SessionMeta};

    use super::*;

    fn payload_for(user_id: Uuid) -> SessionPayload {
        SessionPayload {
            identity: Identity {
                id: user_id,
                name: Some("Tester".to_string()),
                email: None,
            },
            meta: SessionMeta {
                id: Uuid::new_v4(),
                token: SecretString::from("sess_test"),
                expires_at: Utc::now() + chrono::Duration::hours(1),
            },
        }
    }

    #[tokio::test]
    async fn anonymous_backend_has_no_session() {
        let backend = MemoryBackend::new();
        assert!(backend.fetch_session().await.unwrap().is_none());
        assert_eq!(backend.session_call_count(), 1);
    }

    #[tokio::test]
    async fn sign_in_then_sign_out_round_trip() {
        let backend = MemoryBackend::new();
        let user = Uuid::new_v4();
        backend.sign_in(payload_for(user)).await;
        let session = backend.fetch_session().await.unwrap().unwrap();
        assert_eq!(session.identity.id, user);

        backend.sign_out().await.unwrap();
        assert!(backend.fetch_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_sign_out_still_clears_session() {
        let backend = MemoryBackend::new();
        let user = Uuid::new_v4();
        backend.sign_in(payload_for(user)).await;
        backend.fail_sign_out(true).await;

        assert!(backend.sign_out().await.is_err());
        assert!(backend.fetch_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_profile_reads_as_none() {
        let backend = MemoryBackend::new();
        let user = Uuid::new_v4();
        assert!(backend.fetch_profile(user).await.unwrap().is_none());

        backend
            .set_profile(ProfileRecord::new(user, "Wren", CharacterClass::Mage))
            .await;
        let profile = backend.fetch_profile(user).await.unwrap().unwrap();
        assert_eq!(profile.character_name, "Wren");
    }
}
