//! The gate decision function.

use crate::api::model::ProfileRecord;

use super::bypass::TransientBypass;

/// One of the four mutually exclusive render decisions, plus the recoverable
/// error state.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteDecision {
    /// Render a neutral waiting indicator; no further action.
    Loading,
    /// Show or redirect to the login view.
    Unauthenticated,
    /// Show or redirect to the onboarding flow.
    OnboardingRequired,
    /// Render the main application with this profile.
    Dashboard(ProfileRecord),
    /// Render a recoverable error message; never auto-redirect.
    Error(String),
}

/// Settled probe state consumed by the gate.
#[derive(Debug, Clone, Default)]
pub struct GateInputs {
    pub auth_loading: bool,
    pub authenticated: bool,
    pub usage_loading: bool,
    pub usage_error: bool,
    pub character_generated: bool,
    pub profile_loading: bool,
    pub profile_error: bool,
    pub profile: Option<ProfileRecord>,
    pub bypass: Option<TransientBypass>,
}

/// Decide which view the client may render.
///
/// Evaluated strictly in order; the first matching rule wins. The order
/// encodes priority, not just filtering:
///
/// 1. A bypass carrying a profile wins over everything, including probe
///    values that still reflect stale pre-onboarding data.
/// 2. Auth pending blocks everything below it.
/// 3. Unauthenticated fails closed to the login view (a broken auth service
///    must not grant access).
/// 4. Usage pending blocks the onboarding check.
/// 5. A usage service error fails open to onboarding: an outage must not
///    brick the signup funnel, and the worst case is re-entering onboarding
///    input.
/// 6. No character yet means onboarding.
/// 7. Profile pending blocks the dashboard.
/// 8. A profile error, or a missing record despite a generated character,
///    fails closed to an explicit error: the dashboard cannot render without
///    the concrete record, so guessing is unsafe.
/// 9. Everything settled: dashboard.
pub fn decide(inputs: &GateInputs) -> RouteDecision {
    if let Some(ref bypass) = inputs.bypass
        && bypass.grants_dashboard()
        && let Some(ref profile) = bypass.profile
    {
        return RouteDecision::Dashboard(profile.clone());
    }
    if inputs.auth_loading {
        return RouteDecision::Loading;
    }
    if !inputs.authenticated {
        return RouteDecision::Unauthenticated;
    }
    if inputs.usage_loading {
        return RouteDecision::Loading;
    }
    if inputs.usage_error {
        return RouteDecision::OnboardingRequired;
    }
    if !inputs.character_generated {
        return RouteDecision::OnboardingRequired;
    }
    if inputs.profile_loading {
        return RouteDecision::Loading;
    }
    match inputs.profile {
        Some(ref profile) if !inputs.profile_error => RouteDecision::Dashboard(profile.clone()),
        _ => RouteDecision::Error("profile unavailable".to_string()),
    }
}
