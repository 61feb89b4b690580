//! Account endpoints for the signed-in user.
//!
//! - GET `/` - Stored profile and current limits
//! - POST `/survey` - One-time survey that starts the enterprise trial

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, ResultExt};
use crate::auth::ActiveUser;
use crate::db::{Database, Grade, User, UserStatus};
use crate::entitlements::{self, EntitlementSet, TrialPolicy, trial_end};
use crate::impl_has_auth_backend;
use crate::jwt::TokenCodec;

#[derive(Clone)]
pub struct AccountState {
    pub db: Database,
    pub codec: Arc<TokenCodec>,
    pub trial_policy: TrialPolicy,
}

impl_has_auth_backend!(AccountState);

pub fn router(state: AccountState) -> Router {
    Router::new()
        .route("/", get(get_account))
        .route("/survey", post(submit_survey))
        .with_state(state)
}

/// Public view of a user row. Never exposes the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub status: UserStatus,
    pub grade: Grade,
    pub is_admin: bool,
    pub trial_ends_at: Option<DateTime<Utc>>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            phone: user.phone.clone(),
            status: user.status,
            grade: user.grade,
            is_admin: user.is_admin,
            trial_ends_at: user.trial_ends_at,
        }
    }
}

#[derive(Serialize)]
struct AccountResponse {
    user: UserProfile,
    entitlements: EntitlementSet,
    /// Whether the trial survey can still be submitted
    trial_available: bool,
}

impl AccountResponse {
    fn new(user: &User, entitlements: EntitlementSet) -> Self {
        Self {
            user: UserProfile::from(user),
            entitlements,
            trial_available: user.grade == Grade::Basic && user.trial_ends_at.is_none(),
        }
    }
}

async fn get_account(ActiveUser(auth): ActiveUser) -> impl IntoResponse {
    Json(AccountResponse::new(&auth.user, auth.entitlements))
}

#[derive(Debug, Deserialize)]
struct SurveyRequest {
    #[serde(default)]
    industry: Option<String>,
    #[serde(default)]
    company_size: Option<String>,
    #[serde(default)]
    interests: Vec<String>,
}

/// Start the enterprise trial. Only a basic user who never had a trial qualifies.
async fn submit_survey(
    State(state): State<AccountState>,
    ActiveUser(auth): ActiveUser,
    Json(survey): Json<SurveyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();
    let started = state
        .db
        .users()
        .start_trial(auth.id(), trial_end(now))
        .await
        .db_err("Failed to start trial")?;

    if !started {
        return Err(ApiError::conflict("Trial is not available for this account"));
    }

    info!(
        user_id = %auth.id(),
        industry = survey.industry.as_deref().unwrap_or(""),
        company_size = survey.company_size.as_deref().unwrap_or(""),
        interests = survey.interests.len(),
        "Trial started from survey"
    );

    let user = state
        .db
        .users()
        .get_by_id(auth.id())
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let entitlements = entitlements::for_user(&user, now, state.trial_policy);
    Ok(Json(AccountResponse::new(&user, entitlements)))
}
