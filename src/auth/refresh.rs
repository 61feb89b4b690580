//! Session issuance and refresh token rotation.
//!
//! Rotation is stateless: the only inputs are the presented refresh token and
//! the current user row. Privileges always come from the row, never from the
//! old token. Superseded tokens stay cryptographically valid until their own
//! expiry; there is no server-side revocation list.

use chrono::Utc;

use crate::db::{Database, User};
use crate::entitlements::{TrialPolicy, effective_grade};
use crate::jwt::{IssuedToken, RefreshLifetime, TokenCodec, TokenError};

/// A freshly minted access + refresh pair for a user.
#[derive(Debug, Clone)]
pub struct SessionPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
    pub user: User,
}

/// Why a refresh was refused. Every variant is terminal for that call.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("no refresh token presented")]
    NoSession,
    #[error("refresh token invalid or expired")]
    InvalidSession,
    #[error("user no longer exists")]
    UserNotFound,
    #[error("account suspended")]
    AccountSuspended,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("token error: {0}")]
    Token(#[from] TokenError),
}

/// Mint a new session for a user whose row was just read from the store.
/// The access token carries the grade limits are evaluated against, so a
/// lapsed trial under [`TrialPolicy::Downgrade`] is minted as basic.
pub fn issue_session(
    codec: &TokenCodec,
    user: User,
    lifetime: RefreshLifetime,
    policy: TrialPolicy,
) -> Result<SessionPair, TokenError> {
    let grade = effective_grade(user.grade, user.trial_ends_at, Utc::now(), policy);
    let access = codec.issue_access_as(&user, grade)?;
    let refresh = codec.issue_refresh(&user.id, &user.email, lifetime)?;
    Ok(SessionPair {
        access,
        refresh,
        user,
    })
}

/// Exchange a refresh token for a new pair built from the current user row.
/// The new refresh token keeps the lifetime class of the presented one.
pub async fn rotate_session(
    codec: &TokenCodec,
    db: &Database,
    refresh_token: Option<&str>,
    policy: TrialPolicy,
) -> Result<SessionPair, RefreshError> {
    let token = refresh_token.ok_or(RefreshError::NoSession)?;
    let claims = codec
        .verify_refresh(token)
        .ok_or(RefreshError::InvalidSession)?;

    let user = db
        .users()
        .get_by_id(&claims.sub)
        .await?
        .ok_or(RefreshError::UserNotFound)?;

    if user.is_suspended() {
        return Err(RefreshError::AccountSuspended);
    }

    Ok(issue_session(
        codec,
        user,
        RefreshLifetime::of(&claims),
        policy,
    )?)
}
