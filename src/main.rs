use std::sync::Arc;

use chrono::Utc;
use secrecy::SecretString;
use uuid::Uuid;

use questlog::api::model::{
    CharacterClass, Identity, ProfileRecord, SessionMeta, SessionPayload, UsageSnapshot,
};
use questlog::api::{Backend, MemoryBackend};
use questlog::config::GateConfig;
use questlog::guard::{GuardOutcome, InMemoryNavigator, Navigator, RouteGuards};
use questlog::probes::ProbeHub;

fn describe(outcome: &GuardOutcome) -> String {
    match outcome {
        GuardOutcome::Render(view) => format!("render {view:?}"),
        GuardOutcome::Redirect(path) => format!("redirect -> {path}"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = GateConfig::from_env();

    eprintln!("⚔️  Questlog client v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   App root: {}", config.app_root);
    eprintln!("   Session timeout: {:?}", config.session_timeout);
    eprintln!("   Query timeout: {:?}\n", config.query_timeout);

    // ── Backend ──────────────────────────────────────────────────────────
    // The demo drives the gate against the in-memory backend; point
    // HttpBackend at a real deployment to run the same flow over REST.
    let backend = Arc::new(MemoryBackend::new());
    let user = Uuid::new_v4();

    // ── Probes and guards ────────────────────────────────────────────────
    let hub = ProbeHub::new(Arc::clone(&backend) as Arc<dyn Backend>, &config);
    let nav = Arc::new(InMemoryNavigator::new("/app/quests"));
    let guards = RouteGuards::new(config.clone(), Arc::clone(&nav) as Arc<dyn Navigator>);

    // ── Anonymous visit to a protected path ─────────────────────────────
    hub.session().refetch().await;
    hub.settled_decision().await;
    let outcome = guards.guard_app(&hub.inputs(nav.current().bypass.clone()));
    tracing::info!(step = "anonymous visit", outcome = %describe(&outcome));

    // ── Login succeeds; the captured return path is honored ─────────────
    backend
        .sign_in(SessionPayload {
            identity: Identity {
                id: user,
                name: Some("Harvey".to_string()),
                email: None,
            },
            meta: SessionMeta {
                id: Uuid::new_v4(),
                token: SecretString::from("sess_demo"),
                expires_at: Utc::now() + chrono::Duration::hours(8),
            },
        })
        .await;
    hub.session().refetch().await;
    let target = guards.after_login();
    tracing::info!(step = "after login", target = %target);

    // ── New user: the gate routes into onboarding ───────────────────────
    hub.settled_decision().await;
    let outcome = guards.guard_app(&hub.inputs(nav.current().bypass.clone()));
    tracing::info!(step = "first app visit", outcome = %describe(&outcome));

    // ── Onboarding completes: character generated, profile created ──────
    let record = ProfileRecord::new(user, "Aldric the Bold", CharacterClass::Warrior);
    backend
        .set_usage(
            user,
            UsageSnapshot {
                character_generated: true,
                logins: 1,
                ..Default::default()
            },
        )
        .await;
    backend.set_profile(record.clone()).await;
    hub.invalidate_user(user);
    guards.complete_onboarding(record);

    // The bypass carries the fresh profile, so this render cannot flicker
    // back into onboarding while the queries refetch.
    let outcome = guards.guard_app(&hub.inputs(nav.current().bypass.clone()));
    tracing::info!(step = "onboarding handoff", outcome = %describe(&outcome));

    // ── Full reload: no bypass, the probes carry the decision ───────────
    nav.reload();
    hub.decisions()
        .wait_for(|decision| matches!(decision, questlog::gate::RouteDecision::Dashboard(_)))
        .await?;
    let outcome = guards.guard_app(&hub.inputs(nav.current().bypass.clone()));
    tracing::info!(step = "after reload", outcome = %describe(&outcome));

    // ── Sign-out collapses the chain ────────────────────────────────────
    hub.session().sign_out().await?;
    hub.decisions()
        .wait_for(|decision| *decision == questlog::gate::RouteDecision::Unauthenticated)
        .await?;
    let outcome = guards.guard_app(&hub.inputs(nav.current().bypass.clone()));
    tracing::info!(step = "after sign-out", outcome = %describe(&outcome));

    eprintln!("\n   History: {}", nav.visited().join(" -> "));

    Ok(())
}
