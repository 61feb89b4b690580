//! Session API endpoints.
//!
//! - POST `/signup` - Create a basic account and start a session
//! - POST `/login` - Check credentials and start a session
//! - POST `/refresh` - Exchange the refresh cookie for a new token pair
//! - POST `/logout` - Clear both cookies
//! - GET `/me` - Identity and limits carried by the access token

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware,
    response::{AppendHeaders, IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::account::UserProfile;
use super::error::{ApiError, ResultExt};
use crate::auth::{
    Auth, Identity, RefreshError, SessionCookies, SessionPair, issue_session, rotate_session,
};
use crate::db::{Database, NewUser};
use crate::entitlements::{self, EntitlementSet, TrialPolicy, evaluate};
use crate::impl_has_auth_backend;
use crate::jwt::{RefreshLifetime, TokenCodec};
use crate::password::{MIN_PASSWORD_LENGTH, hash_password, verify_password};
use crate::rate_limit::{RateLimitConfig, rate_limit_login, rate_limit_signup};

const MAX_EMAIL_LENGTH: usize = 254;
const MAX_NAME_LENGTH: usize = 100;

const INVALID_CREDENTIALS: &str = "Invalid email or password";
const SESSION_EXPIRED: &str = "Session expired, please log in again";
const ACCOUNT_UNAVAILABLE: &str = "Account unavailable";

#[derive(Clone)]
pub struct AuthState {
    pub db: Database,
    pub codec: Arc<TokenCodec>,
    pub trial_policy: TrialPolicy,
    pub cookies: SessionCookies,
    pub password_cost: u32,
    pub no_signup: bool,
    pub rate_limit_config: Arc<RateLimitConfig>,
}

impl_has_auth_backend!(AuthState);

pub fn router(state: AuthState) -> Router {
    let session_router = Router::new()
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .with_state(state.clone());

    let login_router = Router::new()
        .route("/login", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_login,
        ));

    let router = Router::new().merge(session_router).merge(login_router);

    if state.no_signup {
        router
    } else {
        let signup_router = Router::new()
            .route("/signup", post(signup))
            .with_state(state.clone())
            .layer(middleware::from_fn_with_state(
                state.rate_limit_config,
                rate_limit_signup,
            ));
        router.merge(signup_router)
    }
}

#[derive(Serialize)]
struct SessionResponse {
    user: UserProfile,
    entitlements: EntitlementSet,
}

impl AuthState {
    /// Response for a freshly minted session: both cookies plus the profile.
    fn session_response(&self, session: SessionPair, status: StatusCode) -> Response {
        let entitlements = entitlements::for_user(&session.user, Utc::now(), self.trial_policy);
        (
            status,
            AppendHeaders(self.cookies.set_pair(&session.access, &session.refresh)),
            Json(SessionResponse {
                user: UserProfile::from(&session.user),
                entitlements,
            }),
        )
            .into_response()
    }
}

#[derive(Deserialize)]
struct SignupRequest {
    email: String,
    password: String,
    name: String,
    #[serde(default)]
    phone: Option<String>,
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    if email.is_empty() {
        return Err(ApiError::bad_request("Email cannot be empty"));
    }
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ApiError::bad_request("Email is too long"));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ApiError::bad_request("Invalid email address")),
    }
}

async fn signup(
    State(state): State<AuthState>,
    Json(payload): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = payload.email.trim();
    let name = payload.name.trim();
    let phone = payload
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty());

    validate_email(email)?;
    if name.is_empty() {
        return Err(ApiError::bad_request("Name cannot be empty"));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ApiError::bad_request("Name is too long"));
    }
    if payload.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    let existing = state
        .db
        .users()
        .get_by_email(email)
        .await
        .db_err("Failed to check email")?;
    if existing.is_some() {
        return Err(ApiError::conflict("Email is already registered"));
    }

    let password_hash = hash_password(payload.password, state.password_cost)
        .await
        .internal_err("Failed to hash password")?;

    let id = uuid::Uuid::new_v4().to_string();
    let created = state
        .db
        .users()
        .create(&NewUser {
            id: &id,
            email,
            password_hash: &password_hash,
            name,
            phone,
            is_admin: false,
        })
        .await;
    match created {
        Ok(()) => {}
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(ApiError::conflict("Email is already registered"));
        }
        Err(e) => return Err(ApiError::db_error("Failed to create user", e)),
    }

    let user = state
        .db
        .users()
        .get_by_id(&id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::internal("User vanished after signup"))?;

    let session = issue_session(
        &state.codec,
        user,
        RefreshLifetime::Default,
        state.trial_policy,
    )
    .internal_err("Failed to generate token")?;

    info!(user_id = %id, "User signed up");
    Ok(state.session_response(session, StatusCode::CREATED))
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
    #[serde(default)]
    remember: bool,
}

async fn login(
    State(state): State<AuthState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .users()
        .get_by_email(payload.email.trim())
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::unauthorized(INVALID_CREDENTIALS))?;

    let valid = verify_password(payload.password, user.password_hash.clone())
        .await
        .internal_err("Failed to verify password")?;
    if !valid {
        debug!(user_id = %user.id, "Login with wrong password");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    }

    if user.is_suspended() {
        info!(user_id = %user.id, "Login refused for suspended account");
        return Err(ApiError::forbidden(ACCOUNT_UNAVAILABLE));
    }

    let user_id = user.id.clone();
    let session = issue_session(
        &state.codec,
        user,
        RefreshLifetime::from_remember(payload.remember),
        state.trial_policy,
    )
    .internal_err("Failed to generate token")?;

    info!(user_id = %user_id, remember = payload.remember, "User logged in");
    Ok(state.session_response(session, StatusCode::OK))
}

/// Rotate the token pair. Failure reasons are logged; the client only learns
/// whether to log in again (401) or that the account is unavailable (403).
async fn refresh(
    State(state): State<AuthState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = state.cookies.refresh_token(&headers);

    match rotate_session(&state.codec, &state.db, token, state.trial_policy).await {
        Ok(session) => {
            debug!(user_id = %session.user.id, "Session refreshed");
            Ok(state.session_response(session, StatusCode::OK))
        }
        Err(e @ (RefreshError::NoSession | RefreshError::InvalidSession)) => {
            debug!(reason = %e, "Refresh refused");
            Err(ApiError::unauthorized(SESSION_EXPIRED))
        }
        Err(e @ RefreshError::UserNotFound) => {
            warn!(reason = %e, "Refresh refused");
            Err(ApiError::unauthorized(SESSION_EXPIRED))
        }
        Err(e @ RefreshError::AccountSuspended) => {
            warn!(reason = %e, "Refresh refused");
            Err(ApiError::forbidden(ACCOUNT_UNAVAILABLE))
        }
        Err(RefreshError::Database(e)) => Err(ApiError::db_error("Failed to refresh session", e)),
        Err(RefreshError::Token(e)) => {
            error!("Failed to generate token: {}", e);
            Err(ApiError::internal("Failed to generate token"))
        }
    }
}

/// Clear both cookies. Needs no valid session, so a client can always log out.
async fn logout(State(state): State<AuthState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        AppendHeaders(state.cookies.clear()),
        Json(serde_json::json!({ "success": true })),
    )
}

#[derive(Serialize)]
struct MeResponse {
    user: Identity,
    entitlements: EntitlementSet,
}

/// Identity as carried by the access token, without a store lookup.
async fn me(Auth(identity): Auth) -> impl IntoResponse {
    let entitlements = evaluate(identity.grade, identity.is_admin);
    Json(MeResponse {
        user: identity,
        entitlements,
    })
}
