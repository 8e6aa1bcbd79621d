//! Return-path validation and login redirect helpers.
//!
//! The post-login destination comes from a query parameter the user (or an
//! attacker) controls. `validate_return_path` is the open-redirect defense:
//! only paths inside the authenticated application's namespace survive,
//! everything else falls back to the app root. Total function; any input,
//! however malformed, yields a path.

/// Query parameter carrying the post-login destination.
pub const RETURN_URL_PARAM: &str = "returnUrl";

/// Validate a candidate post-login destination.
///
/// Accepts only `pathname == app_root` or `pathname` starting with
/// `app_root` followed by `/`. A pathname that merely shares the root as a
/// string prefix (`/app` vs `/appetizer`) is rejected. On acceptance the
/// query string is preserved unchanged; on rejection the app root is
/// returned.
pub fn validate_return_path(app_root: &str, pathname: Option<&str>, search: &str) -> String {
    let Some(pathname) = pathname else {
        return app_root.to_string();
    };

    if !is_in_app_namespace(app_root, pathname) {
        return app_root.to_string();
    }

    format!("{pathname}{search}")
}

fn is_in_app_namespace(app_root: &str, pathname: &str) -> bool {
    // Absolute in-origin paths only: rejects empty input, cross-origin
    // absolute URLs, scheme-relative `//host`, and backslash variants some
    // user agents normalize into them.
    if !pathname.starts_with('/')
        || pathname.starts_with("//")
        || pathname.contains("://")
        || pathname.contains('\\')
    {
        return false;
    }

    pathname == app_root
        || pathname
            .strip_prefix(app_root)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Split a location string into pathname and search parts.
/// `"/app/quests?x=1"` becomes `("/app/quests", "?x=1")`.
pub fn split_path_query(location: &str) -> (&str, &str) {
    match location.find('?') {
        Some(at) => location.split_at(at),
        None => (location, ""),
    }
}

/// Build the login redirect for a protected target, e.g.
/// `/login?returnUrl=%2Fapp%2Fquests`.
pub fn login_redirect(login_path: &str, target: &str) -> String {
    format!(
        "{login_path}?{RETURN_URL_PARAM}={}",
        urlencoding::encode(target)
    )
}

/// Extract the decoded `returnUrl` value from a search string, if present.
pub fn return_url_from_search(search: &str) -> Option<String> {
    let query = search.strip_prefix('?').unwrap_or(search);
    for pair in query.split('&') {
        let mut parts = pair.splitn(2, '=');
        if parts.next() == Some(RETURN_URL_PARAM) {
            let raw = parts.next().unwrap_or("");
            return Some(
                urlencoding::decode(raw)
                    .map(|decoded| decoded.into_owned())
                    .unwrap_or_else(|_| raw.to_string()),
            );
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: &str = "/app";

    #[test]
    fn app_root_itself_is_accepted() {
        assert_eq!(validate_return_path(ROOT, Some("/app"), ""), "/app");
    }

    #[test]
    fn nested_path_keeps_its_query_string() {
        assert_eq!(
            validate_return_path(ROOT, Some("/app/quests"), "?x=1"),
            "/app/quests?x=1"
        );
    }

    #[test]
    fn bare_root_falls_back() {
        assert_eq!(validate_return_path(ROOT, Some("/"), ""), "/app");
    }

    #[test]
    fn shared_prefix_without_separator_is_rejected() {
        assert_eq!(validate_return_path(ROOT, Some("/appetizer"), ""), "/app");
    }

    #[test]
    fn missing_and_empty_input_fall_back() {
        assert_eq!(validate_return_path(ROOT, None, ""), "/app");
        assert_eq!(validate_return_path(ROOT, Some(""), "?x=1"), "/app");
    }

    #[test]
    fn cross_origin_and_scheme_relative_are_rejected() {
        assert_eq!(
            validate_return_path(ROOT, Some("https://evil.example/app"), ""),
            "/app"
        );
        assert_eq!(validate_return_path(ROOT, Some("//evil.example/app"), ""), "/app");
        assert_eq!(validate_return_path(ROOT, Some("/\\evil.example"), ""), "/app");
        assert_eq!(validate_return_path(ROOT, Some("app/quests"), ""), "/app");
    }

    #[test]
    fn validation_is_idempotent_for_valid_input() {
        let once = validate_return_path(ROOT, Some("/app/quests"), "?x=1");
        let (path, search) = split_path_query(&once);
        assert_eq!(validate_return_path(ROOT, Some(path), search), once);
    }

    #[test]
    fn login_redirect_encodes_the_target() {
        assert_eq!(
            login_redirect("/login", "/app/quests"),
            "/login?returnUrl=%2Fapp%2Fquests"
        );
    }

    #[test]
    fn return_url_round_trips_through_the_search_string() {
        let redirect = login_redirect("/login", "/app/quests?x=1");
        let (_, search) = split_path_query(&redirect);
        assert_eq!(
            return_url_from_search(search).as_deref(),
            Some("/app/quests?x=1")
        );
    }

    #[test]
    fn absent_return_url_reads_as_none() {
        assert_eq!(return_url_from_search("?foo=bar"), None);
        assert_eq!(return_url_from_search(""), None);
    }
}
