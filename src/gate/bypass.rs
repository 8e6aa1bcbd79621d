//! One-shot bypass payload carried on a single navigation.

use crate::api::model::ProfileRecord;

/// Payload attached to the navigation that hands control back from the
/// onboarding flow to the main application.
///
/// Right after onboarding completes, the usage and profile slots may still
/// hold stale pre-completion data; the bypass carries the freshly created
/// profile so the first dashboard render does not flicker back into
/// onboarding. It lives on exactly one history entry and is never persisted,
/// so a full reload or direct URL visit falls through to the probes.
#[derive(Debug, Clone, PartialEq)]
pub struct TransientBypass {
    pub from_onboarding: bool,
    pub profile: Option<ProfileRecord>,
}

impl TransientBypass {
    /// Bypass created at the moment the onboarding flow completes.
    pub fn completed(profile: ProfileRecord) -> Self {
        Self {
            from_onboarding: true,
            profile: Some(profile),
        }
    }

    /// Whether this bypass short-circuits the gate.
    pub fn grants_dashboard(&self) -> bool {
        self.from_onboarding && self.profile.is_some()
    }
}
