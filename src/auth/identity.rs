//! Access token to identity resolution.

use super::types::Identity;
use crate::jwt::TokenCodec;

/// Resolve the identity carried by a raw access token.
///
/// Performs signature and expiry checks only, no store lookup. An absent or
/// invalid token resolves to `None`, which callers must treat as
/// unauthenticated, never as a guest.
pub fn resolve_identity(codec: &TokenCodec, access_token: Option<&str>) -> Option<Identity> {
    access_token
        .and_then(|token| codec.verify_access(token))
        .map(Identity::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Grade, User, UserStatus};
    use crate::jwt::{RefreshLifetime, TokenCodec};

    fn codec() -> TokenCodec {
        TokenCodec::new(b"access-secret", b"refresh-secret")
    }

    #[test]
    fn test_resolves_valid_token() {
        let codec = codec();
        let user = User {
            id: "uuid-1".to_string(),
            email: "a@example.com".to_string(),
            password_hash: String::new(),
            name: "Ann".to_string(),
            phone: None,
            status: UserStatus::Active,
            grade: Grade::EnterpriseTrial,
            is_admin: true,
            trial_ends_at: None,
        };
        let token = codec.issue_access(&user).unwrap().token;

        let identity = resolve_identity(&codec, Some(&token)).unwrap();
        assert_eq!(
            identity,
            Identity {
                user_id: "uuid-1".to_string(),
                email: "a@example.com".to_string(),
                name: "Ann".to_string(),
                grade: Grade::EnterpriseTrial,
                is_admin: true,
            }
        );
    }

    #[test]
    fn test_missing_or_invalid_token_is_none() {
        let codec = codec();
        assert!(resolve_identity(&codec, None).is_none());
        assert!(resolve_identity(&codec, Some("garbage")).is_none());

        let refresh = codec
            .issue_refresh("uuid-1", "a@example.com", RefreshLifetime::Default)
            .unwrap();
        assert!(resolve_identity(&codec, Some(&refresh.token)).is_none());
    }
}
