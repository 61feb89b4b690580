//! Axum extractors for authentication.
//!
//! Identity is resolved once per request here and handed to the handler as a
//! value. `Auth` trusts the access token alone; `ActiveUser` and `AdminUser`
//! additionally re-read the user row, so suspension and demotion take effect
//! on the very next privileged request.

use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::Utc;

use super::cookie::{ACCESS_COOKIE_NAME, get_cookie};
use super::errors::{ApiAuthError, AuthErrorKind};
use super::identity::resolve_identity;
use super::state::HasAuthBackend;
use super::types::{AuthenticatedUser, Identity};
use crate::entitlements;

fn identity_from_parts<S: HasAuthBackend>(parts: &Parts, state: &S) -> Option<Identity> {
    let token = get_cookie(&parts.headers, ACCESS_COOKIE_NAME).filter(|t| !t.is_empty());
    resolve_identity(state.codec(), token)
}

/// Re-check an identity against the store.
async fn load_active_user<S>(state: &S, identity: Identity) -> Result<AuthenticatedUser, AuthErrorKind>
where
    S: HasAuthBackend + Send + Sync,
{
    let user = state
        .db()
        .users()
        .get_by_id(&identity.user_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to get user: {}", e);
            AuthErrorKind::DatabaseError
        })?
        .ok_or(AuthErrorKind::UserNotFound)?;

    if user.is_suspended() {
        tracing::info!(user_id = %user.id, "Rejected privileged request from suspended account");
        return Err(AuthErrorKind::AccountSuspended);
    }

    let entitlements = entitlements::for_user(&user, Utc::now(), state.trial_policy());

    Ok(AuthenticatedUser {
        identity,
        user,
        entitlements,
    })
}

/// Extractor for endpoints that require a valid access token.
/// No store lookup; staleness is bounded by the access token lifetime.
pub struct Auth(pub Identity);

impl<S> FromRequestParts<S> for Auth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        identity_from_parts(parts, state)
            .map(Auth)
            .ok_or_else(|| ApiAuthError::new(AuthErrorKind::NotAuthenticated))
    }
}

/// Optional authentication extractor - never fails.
/// For public pages that render differently for signed-in users.
pub struct OptionalAuth(pub Option<Identity>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(identity_from_parts(parts, state)))
    }
}

/// Extractor for privileged operations: valid access token, existing user,
/// account not suspended. Carries the entitlements of the stored grade.
pub struct ActiveUser(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for ActiveUser
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Auth(identity) = Auth::from_request_parts(parts, state).await?;
        load_active_user(state, identity)
            .await
            .map(ActiveUser)
            .map_err(ApiAuthError::from)
    }
}

/// Extractor for admin operations. The token's admin claim is only a
/// pre-check; the stored admin flag decides.
pub struct AdminUser(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for AdminUser
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Auth(identity) = Auth::from_request_parts(parts, state).await?;
        if !identity.is_admin {
            return Err(ApiAuthError::new(AuthErrorKind::InsufficientRole));
        }

        let user = load_active_user(state, identity).await?;
        if !user.is_admin() {
            tracing::info!(user_id = %user.id(), "Admin claim no longer backed by stored flag");
            return Err(ApiAuthError::new(AuthErrorKind::InsufficientRole));
        }

        Ok(AdminUser(user))
    }
}
