//! Guard components: gate decisions applied to navigation.

use std::sync::Arc;

use crate::api::model::ProfileRecord;
use crate::config::GateConfig;
use crate::gate::{decide, GateInputs, RouteDecision, TransientBypass};
use crate::routing::{login_redirect, return_url_from_search, split_path_query, validate_return_path};

use super::navigator::Navigator;

/// The view a guard ends up rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum View {
    Loading,
    Login,
    Onboarding,
    Dashboard(ProfileRecord),
    Error(String),
}

/// Outcome of running a guard: render in place, or a redirect that was
/// already applied to the navigator.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardOutcome {
    Render(View),
    Redirect(String),
}

/// Thin consumers of the gate decision, one per route family.
pub struct RouteGuards {
    config: GateConfig,
    nav: Arc<dyn Navigator>,
}

impl RouteGuards {
    pub fn new(config: GateConfig, nav: Arc<dyn Navigator>) -> Self {
        Self { config, nav }
    }

    /// Guard for the protected application routes.
    ///
    /// `Error` renders in place, never redirects: the user keeps the URL and
    /// can retry.
    pub fn guard_app(&self, inputs: &GateInputs) -> GuardOutcome {
        match decide(inputs) {
            RouteDecision::Loading => GuardOutcome::Render(View::Loading),
            RouteDecision::Unauthenticated => {
                let target = self.nav.current().path;
                let redirect = login_redirect(&self.config.login_path, &target);
                self.nav.redirect(&redirect);
                GuardOutcome::Redirect(redirect)
            }
            RouteDecision::OnboardingRequired => {
                self.nav.redirect(&self.config.onboarding_path);
                GuardOutcome::Redirect(self.config.onboarding_path.clone())
            }
            RouteDecision::Dashboard(profile) => GuardOutcome::Render(View::Dashboard(profile)),
            RouteDecision::Error(message) => GuardOutcome::Render(View::Error(message)),
        }
    }

    /// Inverse guard for the onboarding route: a fully onboarded user is
    /// sent to the dashboard, every other decision lets onboarding render.
    pub fn guard_onboarding(&self, inputs: &GateInputs) -> GuardOutcome {
        match decide(inputs) {
            RouteDecision::Dashboard(_) => {
                self.nav.redirect(&self.config.app_root);
                GuardOutcome::Redirect(self.config.app_root.clone())
            }
            _ => GuardOutcome::Render(View::Onboarding),
        }
    }

    /// Guard for the login route: an already-resolved dashboard user is sent
    /// straight to their return target.
    pub fn guard_login(&self, inputs: &GateInputs) -> GuardOutcome {
        match decide(inputs) {
            RouteDecision::Dashboard(_) => {
                let redirect = self.return_target();
                self.nav.redirect(&redirect);
                GuardOutcome::Redirect(redirect)
            }
            _ => GuardOutcome::Render(View::Login),
        }
    }

    /// Navigate to the validated return target after a successful login
    /// call. Callers refetch the session probe first.
    pub fn after_login(&self) -> String {
        let redirect = self.return_target();
        self.nav.redirect(&redirect);
        redirect
    }

    /// Hand control back from the completed onboarding flow, attaching the
    /// one-shot bypass so the first dashboard render cannot flicker back
    /// into onboarding on stale probe data.
    pub fn complete_onboarding(&self, profile: ProfileRecord) {
        self.nav
            .redirect_with_bypass(&self.config.app_root, TransientBypass::completed(profile));
    }

    fn return_target(&self) -> String {
        let current = self.nav.current();
        let candidate = return_url_from_search(current.search());
        let (pathname, search) = match candidate {
            Some(ref raw) => {
                let (path, query) = split_path_query(raw);
                (Some(path.to_string()), query.to_string())
            }
            None => (None, String::new()),
        };
        validate_return_path(&self.config.app_root, pathname.as_deref(), &search)
    }
}
