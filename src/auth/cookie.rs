//! Session cookie reading and writing.

use axum::http::{HeaderMap, HeaderName, header};

use crate::jwt::IssuedToken;

/// Cookie name for the access token (short-lived, 15 minutes).
pub const ACCESS_COOKIE_NAME: &str = "access_token";

/// Cookie name for the refresh token (long-lived, 7 or 30 days).
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}

/// Reads and writes the two session cookies. Holds no state beyond whether
/// cookies get the `Secure` attribute.
#[derive(Debug, Clone, Copy)]
pub struct SessionCookies {
    secure: bool,
}

impl SessionCookies {
    pub fn new(secure: bool) -> Self {
        Self { secure }
    }

    pub fn access_token<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        get_cookie(headers, ACCESS_COOKIE_NAME).filter(|v| !v.is_empty())
    }

    pub fn refresh_token<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        get_cookie(headers, REFRESH_COOKIE_NAME).filter(|v| !v.is_empty())
    }

    fn cookie(&self, name: &str, value: &str, max_age: u64) -> String {
        let secure = if self.secure { "; Secure" } else { "" };
        format!(
            "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}{}",
            name, value, max_age, secure
        )
    }

    /// `Set-Cookie` headers storing a new token pair. Use with `AppendHeaders`.
    pub fn set_pair(
        &self,
        access: &IssuedToken,
        refresh: &IssuedToken,
    ) -> [(HeaderName, String); 2] {
        [
            (
                header::SET_COOKIE,
                self.cookie(ACCESS_COOKIE_NAME, &access.token, access.duration),
            ),
            (
                header::SET_COOKIE,
                self.cookie(REFRESH_COOKIE_NAME, &refresh.token, refresh.duration),
            ),
        ]
    }

    /// `Set-Cookie` headers deleting both tokens.
    pub fn clear(&self) -> [(HeaderName, String); 2] {
        [
            (header::SET_COOKIE, self.cookie(ACCESS_COOKIE_NAME, "", 0)),
            (header::SET_COOKIE, self.cookie(REFRESH_COOKIE_NAME, "", 0)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn issued(token: &str, duration: u64) -> IssuedToken {
        IssuedToken {
            token: token.to_string(),
            issued_at: 0,
            expires_at: duration,
            duration,
        }
    }

    #[test]
    fn test_get_cookie_multiple() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("foo=bar; access_token=abc123; refresh_token=xyz789"),
        );

        assert_eq!(get_cookie(&headers, "access_token"), Some("abc123"));
        assert_eq!(get_cookie(&headers, "refresh_token"), Some("xyz789"));
        assert_eq!(get_cookie(&headers, "foo"), Some("bar"));
        assert_eq!(get_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_get_cookie_no_header() {
        let headers = HeaderMap::new();
        assert_eq!(get_cookie(&headers, "access_token"), None);
    }

    #[test]
    fn test_get_cookie_with_spaces() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("  access_token = abc123  ; foo=bar"),
        );

        assert_eq!(get_cookie(&headers, "access_token"), Some("abc123"));
    }

    #[test]
    fn test_empty_token_is_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("access_token=; refresh_token=r"),
        );
        let cookies = SessionCookies::new(false);

        assert_eq!(cookies.access_token(&headers), None);
        assert_eq!(cookies.refresh_token(&headers), Some("r"));
    }

    #[test]
    fn test_set_pair_attributes() {
        let cookies = SessionCookies::new(false);
        let [(_, access), (_, refresh)] =
            cookies.set_pair(&issued("aaa", 900), &issued("rrr", 604800));

        assert_eq!(
            access,
            "access_token=aaa; HttpOnly; SameSite=Lax; Path=/; Max-Age=900"
        );
        assert_eq!(
            refresh,
            "refresh_token=rrr; HttpOnly; SameSite=Lax; Path=/; Max-Age=604800"
        );
    }

    #[test]
    fn test_secure_and_clear() {
        let cookies = SessionCookies::new(true);
        let [(_, access), (_, refresh)] = cookies.clear();

        assert_eq!(
            access,
            "access_token=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0; Secure"
        );
        assert!(refresh.starts_with("refresh_token=;"));
        assert!(refresh.contains("Max-Age=0"));
    }
}
