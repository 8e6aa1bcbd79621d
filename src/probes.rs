//! Probe hub: the dependent fetch chain behind the gate.
//!
//! Owns the session probe and the usage/profile query slots, and runs the
//! supervisor task that drives the enabling predicates: usage dispatches only
//! once the session settles authenticated, profile only once usage reports a
//! generated character. Predicate reversal (sign-out mid-flight) flows the
//! same way, collapsing the chain and suppressing in-flight effects. There is
//! no manual sequential awaiting anywhere in the chain.

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use uuid::Uuid;

use crate::api::model::{ProfileRecord, UsageSnapshot};
use crate::api::Backend;
use crate::cache::{GatedQuery, QueryCache, QueryKey, QueryState};
use crate::config::GateConfig;
use crate::error::ApiError;
use crate::gate::{decide, GateInputs, RouteDecision, TransientBypass};
use crate::session::{SessionProbe, SessionState};

/// Assemble gate inputs from the three probes' committed states.
///
/// An idle slot whose prerequisite already holds reads as loading: the
/// supervisor is about to dispatch it, and reporting it as settled-empty for
/// that instant would flicker the gate through a wrong decision.
fn build_inputs(
    session: &SessionState,
    usage: &QueryState<UsageSnapshot>,
    profile: &QueryState<ProfileRecord>,
    bypass: Option<TransientBypass>,
) -> GateInputs {
    let character_generated = usage
        .data()
        .map(|snapshot| snapshot.character_generated)
        .unwrap_or(false);
    GateInputs {
        auth_loading: session.loading,
        authenticated: session.authenticated,
        usage_loading: session.authenticated && !usage.is_settled(),
        usage_error: usage.error().is_some(),
        character_generated,
        profile_loading: character_generated && !profile.is_settled(),
        profile_error: profile.error().is_some(),
        profile: profile.data().cloned(),
        bypass,
    }
}

/// Session probe plus the two gated queries, wired together.
pub struct ProbeHub {
    session: Arc<SessionProbe>,
    usage: Arc<GatedQuery<UsageSnapshot>>,
    profile: Arc<GatedQuery<ProfileRecord>>,
    cache: Arc<QueryCache>,
    decisions: watch::Receiver<RouteDecision>,
    supervisor: JoinHandle<()>,
}

impl ProbeHub {
    /// Build the chain and start its supervisor. The initial session read is
    /// the caller's move: invoke `session().refetch()` on mount.
    pub fn new(backend: Arc<dyn Backend>, config: &GateConfig) -> Self {
        let session = Arc::new(SessionProbe::new(
            Arc::clone(&backend),
            config.session_timeout,
        ));
        let cache = Arc::new(QueryCache::new());

        let usage = {
            let backend = Arc::clone(&backend);
            let session = Arc::clone(&session);
            Arc::new(GatedQuery::new(
                "usage",
                config.query_timeout,
                move || {
                    let backend = Arc::clone(&backend);
                    let user = session.user_id();
                    async move {
                        match user {
                            Some(user) => backend.fetch_usage(user).await.map(Some),
                            None => Err(ApiError::Unauthenticated {
                                endpoint: "usage".to_string(),
                            }),
                        }
                    }
                    .boxed()
                },
            ))
        };

        let profile = {
            let backend = Arc::clone(&backend);
            let session = Arc::clone(&session);
            Arc::new(GatedQuery::new(
                "profile",
                config.query_timeout,
                move || {
                    let backend = Arc::clone(&backend);
                    let user = session.user_id();
                    async move {
                        match user {
                            Some(user) => backend.fetch_profile(user).await,
                            None => Err(ApiError::Unauthenticated {
                                endpoint: "profile".to_string(),
                            }),
                        }
                    }
                    .boxed()
                },
            ))
        };

        let (decisions_tx, decisions) = watch::channel(RouteDecision::Loading);
        let supervisor = Self::spawn_supervisor(
            Arc::clone(&session),
            Arc::clone(&usage),
            Arc::clone(&profile),
            Arc::clone(&cache),
            decisions_tx,
        );

        Self {
            session,
            usage,
            profile,
            cache,
            decisions,
            supervisor,
        }
    }

    fn spawn_supervisor(
        session: Arc<SessionProbe>,
        usage: Arc<GatedQuery<UsageSnapshot>>,
        profile: Arc<GatedQuery<ProfileRecord>>,
        cache: Arc<QueryCache>,
        decisions_tx: watch::Sender<RouteDecision>,
    ) -> JoinHandle<()> {
        let mut session_rx = session.subscribe();
        let mut usage_rx = usage.subscribe();
        let mut profile_rx = profile.subscribe();

        tokio::spawn(async move {
            let mut registered: Option<Uuid> = None;
            loop {
                let session_state = session_rx.borrow_and_update().clone();

                // Registry maintenance follows the identity, so key-based
                // invalidation always reaches the live slots.
                let user = session_state
                    .identity
                    .as_ref()
                    .filter(|_| session_state.authenticated)
                    .map(|identity| identity.id);
                if user != registered {
                    if let Some(old) = registered {
                        cache.deregister(&QueryKey::Usage(old));
                        cache.deregister(&QueryKey::Profile(old));
                    }
                    if let Some(new) = user {
                        cache.register(
                            QueryKey::Usage(new),
                            Arc::clone(&usage) as Arc<dyn crate::cache::Invalidate>,
                        );
                        cache.register(
                            QueryKey::Profile(new),
                            Arc::clone(&profile) as Arc<dyn crate::cache::Invalidate>,
                        );
                    }
                    registered = user;
                }

                usage.set_enabled(session_state.authenticated);

                let usage_state = usage_rx.borrow_and_update().clone();
                let character_generated = usage_state
                    .data()
                    .map(|snapshot| snapshot.character_generated)
                    .unwrap_or(false);
                profile.set_enabled(session_state.authenticated && character_generated);

                let profile_state = profile_rx.borrow_and_update().clone();
                let decision = decide(&build_inputs(
                    &session_state,
                    &usage_state,
                    &profile_state,
                    None,
                ));
                decisions_tx.send_if_modified(|current| {
                    if *current == decision {
                        false
                    } else {
                        tracing::debug!(?decision, "gate decision changed");
                        *current = decision;
                        true
                    }
                });

                tokio::select! {
                    changed = session_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    changed = usage_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    changed = profile_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        })
    }

    pub fn session(&self) -> &Arc<SessionProbe> {
        &self.session
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn usage_state(&self) -> QueryState<UsageSnapshot> {
        self.usage.snapshot()
    }

    pub fn profile_state(&self) -> QueryState<ProfileRecord> {
        self.profile.snapshot()
    }

    /// Gate inputs from the current committed snapshots, with the bypass
    /// payload of the navigation being rendered, if any.
    pub fn inputs(&self, bypass: Option<TransientBypass>) -> GateInputs {
        build_inputs(
            &self.session.state(),
            &self.usage.snapshot(),
            &self.profile.snapshot(),
            bypass,
        )
    }

    /// Decide for the current snapshots.
    pub fn decision(&self, bypass: Option<TransientBypass>) -> RouteDecision {
        decide(&self.inputs(bypass))
    }

    /// Watch channel of bypass-free decisions, deduplicated so subscribers
    /// never observe a flicker through identical states.
    pub fn decisions(&self) -> watch::Receiver<RouteDecision> {
        self.decisions.clone()
    }

    /// The same channel as a stream, for select-style consumers.
    pub fn decision_stream(&self) -> WatchStream<RouteDecision> {
        WatchStream::new(self.decisions.clone())
    }

    /// Wait until the chain settles on a non-loading decision.
    pub async fn settled_decision(&self) -> RouteDecision {
        let mut rx = self.decisions.clone();
        rx.wait_for(|decision| *decision != RouteDecision::Loading)
            .await
            .map(|decision| decision.clone())
            .unwrap_or(RouteDecision::Loading)
    }

    /// Drop the cached usage and profile reads for `user`, forcing fresh
    /// fetches. Called when the onboarding flow completes and after any
    /// profile-mutating action elsewhere in the app.
    pub fn invalidate_user(&self, user: Uuid) {
        self.cache.invalidate(&QueryKey::Usage(user));
        self.cache.invalidate(&QueryKey::Profile(user));
    }
}

impl Drop for ProbeHub {
    fn drop(&mut self) {
        self.supervisor.abort();
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use secrecy::SecretString;

    use crate::api::model::{CharacterClass, Identity, SessionMeta, SessionPayload};
    use crate::api::MemoryBackend;

    use super::*;

    fn payload_for(user_id: Uuid) -> SessionPayload {
        SessionPayload {
            identity: Identity {
                id: user_id,
                name: None,
                email: None,
            },
            meta: SessionMeta {
                id: Uuid::new_v4(),
                token: SecretString::from("sess_test"),
                expires_at: Utc::now() + chrono::Duration::hours(1),
            },
        }
    }

    async fn settled_hub(backend: Arc<MemoryBackend>) -> ProbeHub {
        let hub = ProbeHub::new(Arc::clone(&backend) as Arc<dyn Backend>, &GateConfig::default());
        hub.session().refetch().await;
        hub
    }

    #[tokio::test]
    async fn usage_is_never_fetched_while_unauthenticated() {
        let backend = Arc::new(MemoryBackend::new());
        let hub = settled_hub(Arc::clone(&backend)).await;

        assert_eq!(hub.settled_decision().await, RouteDecision::Unauthenticated);
        assert_eq!(backend.usage_call_count(), 0);
        assert_eq!(backend.profile_call_count(), 0);
        assert!(hub.usage_state().is_idle());
    }

    #[tokio::test]
    async fn profile_is_not_fetched_until_character_generated() {
        let backend = Arc::new(MemoryBackend::new());
        let user = Uuid::new_v4();
        backend.sign_in(payload_for(user)).await;
        backend
            .set_usage(
                user,
                UsageSnapshot {
                    character_generated: false,
                    ..Default::default()
                },
            )
            .await;

        let hub = settled_hub(Arc::clone(&backend)).await;
        assert_eq!(
            hub.settled_decision().await,
            RouteDecision::OnboardingRequired
        );
        assert_eq!(backend.usage_call_count(), 1);
        assert_eq!(backend.profile_call_count(), 0);
    }

    #[tokio::test]
    async fn settled_chain_reaches_dashboard() {
        let backend = Arc::new(MemoryBackend::new());
        let user = Uuid::new_v4();
        let record = ProfileRecord::new(user, "Aldric", CharacterClass::Warrior);
        backend.sign_in(payload_for(user)).await;
        backend
            .set_usage(
                user,
                UsageSnapshot {
                    character_generated: true,
                    quests_created: 3,
                    ..Default::default()
                },
            )
            .await;
        backend.set_profile(record.clone()).await;

        let hub = settled_hub(Arc::clone(&backend)).await;
        assert_eq!(
            hub.settled_decision().await,
            RouteDecision::Dashboard(record)
        );
    }

    #[tokio::test]
    async fn usage_outage_fails_open_to_onboarding() {
        let backend = Arc::new(MemoryBackend::new());
        let user = Uuid::new_v4();
        backend.sign_in(payload_for(user)).await;
        backend.fail_usage(true).await;

        let hub = settled_hub(Arc::clone(&backend)).await;
        assert_eq!(
            hub.settled_decision().await,
            RouteDecision::OnboardingRequired
        );
        assert_eq!(backend.profile_call_count(), 0);
    }

    #[tokio::test]
    async fn generated_character_without_record_is_an_error() {
        let backend = Arc::new(MemoryBackend::new());
        let user = Uuid::new_v4();
        backend.sign_in(payload_for(user)).await;
        backend
            .set_usage(
                user,
                UsageSnapshot {
                    character_generated: true,
                    ..Default::default()
                },
            )
            .await;

        let hub = settled_hub(Arc::clone(&backend)).await;
        assert_eq!(
            hub.settled_decision().await,
            RouteDecision::Error("profile unavailable".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn sign_out_collapses_the_chain_and_suppresses_usage() {
        let backend = Arc::new(MemoryBackend::new());
        let user = Uuid::new_v4();
        backend.sign_in(payload_for(user)).await;
        backend
            .set_usage(
                user,
                UsageSnapshot {
                    character_generated: true,
                    ..Default::default()
                },
            )
            .await;
        backend.delay_usage(Some(std::time::Duration::from_secs(5))).await;

        let hub = settled_hub(Arc::clone(&backend)).await;
        // Usage fetch is in flight; sign out before it resolves.
        assert!(!hub.usage_state().is_settled());
        hub.session().sign_out().await.unwrap();

        let decision = hub.settled_decision().await;
        assert_eq!(decision, RouteDecision::Unauthenticated);

        // Let the delayed read run out; its resolution must not resurrect
        // the chain.
        tokio::time::sleep(std::time::Duration::from_secs(10)).await;
        assert!(hub.usage_state().is_idle());
        assert_eq!(backend.profile_call_count(), 0);
    }

    #[tokio::test]
    async fn invalidation_by_key_refreshes_the_chain() {
        let backend = Arc::new(MemoryBackend::new());
        let user = Uuid::new_v4();
        backend.sign_in(payload_for(user)).await;
        backend
            .set_usage(
                user,
                UsageSnapshot {
                    character_generated: false,
                    ..Default::default()
                },
            )
            .await;

        let hub = settled_hub(Arc::clone(&backend)).await;
        assert_eq!(
            hub.settled_decision().await,
            RouteDecision::OnboardingRequired
        );

        // Onboarding completes out of band: flag flips, record appears.
        let record = ProfileRecord::new(user, "Wren", CharacterClass::Mage);
        backend
            .set_usage(
                user,
                UsageSnapshot {
                    character_generated: true,
                    ..Default::default()
                },
            )
            .await;
        backend.set_profile(record.clone()).await;
        hub.invalidate_user(user);

        let mut rx = hub.decisions();
        let decision = rx
            .wait_for(|decision| matches!(decision, RouteDecision::Dashboard(_)))
            .await
            .unwrap()
            .clone();
        assert_eq!(decision, RouteDecision::Dashboard(record));
        assert!(backend.usage_call_count() >= 2);
    }
}
