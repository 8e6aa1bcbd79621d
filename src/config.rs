//! Configuration types.

use std::time::Duration;

/// Gate configuration.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Hard deadline for the session read. Timeout is treated as
    /// unauthenticated.
    pub session_timeout: Duration,
    /// Deadline for the usage and profile reads. `None` leaves them
    /// unbounded; a timeout surfaces as the probe's error state.
    pub query_timeout: Option<Duration>,
    /// Root of the authenticated application's path namespace.
    pub app_root: String,
    /// Login view path.
    pub login_path: String,
    /// Onboarding flow path.
    pub onboarding_path: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            session_timeout: Duration::from_secs(12),
            query_timeout: Some(Duration::from_secs(30)),
            app_root: "/app".to_string(),
            login_path: "/login".to_string(),
            onboarding_path: "/onboarding".to_string(),
        }
    }
}

impl GateConfig {
    /// Build a config from environment variables, falling back to defaults.
    ///
    /// * `QUESTLOG_SESSION_TIMEOUT_SECS` - session read deadline
    /// * `QUESTLOG_QUERY_TIMEOUT_SECS` - usage/profile read deadline
    ///   (`0` disables the deadline)
    /// * `QUESTLOG_APP_ROOT` - authenticated path namespace root
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(secs) = std::env::var("QUESTLOG_SESSION_TIMEOUT_SECS")
            && let Ok(secs) = secs.parse::<u64>()
            && secs > 0
        {
            config.session_timeout = Duration::from_secs(secs);
        }

        if let Ok(secs) = std::env::var("QUESTLOG_QUERY_TIMEOUT_SECS")
            && let Ok(secs) = secs.parse::<u64>()
        {
            config.query_timeout = if secs == 0 {
                None
            } else {
                Some(Duration::from_secs(secs))
            };
        }

        if let Ok(root) = std::env::var("QUESTLOG_APP_ROOT")
            && root.starts_with('/')
        {
            config.app_root = root;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_carries_reference_constants() {
        let config = GateConfig::default();
        assert_eq!(config.session_timeout, Duration::from_secs(12));
        assert_eq!(config.query_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.app_root, "/app");
        assert_eq!(config.login_path, "/login");
        assert_eq!(config.onboarding_path, "/onboarding");
    }
}
