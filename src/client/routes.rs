//! Which pages need a session.

/// Where a dead session is sent.
pub const LOGIN_PATH: &str = "/login";
pub const SIGNUP_PATH: &str = "/signup";

/// Page prefixes that are useless without a session.
pub const PROTECTED_PREFIXES: &[&str] = &[
    "/account",
    "/company/register",
    "/company/edit",
    "/my-listings",
    "/admin",
];

/// Drop any query string or fragment.
fn path_only(path: &str) -> &str {
    path.split(['?', '#']).next().unwrap_or("")
}

/// `prefix` matches `path` itself or any page below it, never a sibling that
/// merely shares characters (`/admin` does not cover `/administrators`).
fn under(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Login and signup pages. No refresh is attempted while one is shown.
pub fn is_auth_page(path: &str) -> bool {
    let path = path_only(path);
    under(path, LOGIN_PATH) || under(path, SIGNUP_PATH)
}

pub fn is_protected(path: &str) -> bool {
    let path = path_only(path);
    PROTECTED_PREFIXES.iter().any(|prefix| under(path, prefix))
}
