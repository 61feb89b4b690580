//! Admin API endpoints.
//!
//! All endpoints require the stored admin flag.

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, put},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::account::UserProfile;
use super::error::{ApiError, ResultExt, validate_uuid};
use super::owner_entitlements;
use crate::auth::AdminUser;
use crate::db::{Database, Grade, UserStatus};
use crate::entitlements::TrialPolicy;
use crate::impl_has_auth_backend;
use crate::jwt::TokenCodec;

/// State for admin endpoints.
#[derive(Clone)]
pub struct AdminState {
    pub db: Database,
    pub codec: Arc<TokenCodec>,
    pub trial_policy: TrialPolicy,
}

impl_has_auth_backend!(AdminState);

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{id}/grade", put(set_grade))
        .route("/users/{id}/status", put(set_status))
        .route("/companies/{id}/featured", put(set_featured))
        .with_state(state)
}

async fn list_users(
    State(state): State<AdminState>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, ApiError> {
    let users = state
        .db
        .users()
        .list()
        .await
        .db_err("Failed to list users")?;

    Ok(Json(users))
}

async fn load_profile(db: &Database, id: &str) -> Result<UserProfile, ApiError> {
    db.users()
        .get_by_id(id)
        .await
        .db_err("Failed to get user")?
        .map(|user| UserProfile::from(&user))
        .ok_or_else(|| ApiError::not_found("User not found"))
}

#[derive(Deserialize)]
struct SetGradeRequest {
    grade: Grade,
}

/// Takes effect on the user's next refresh; already issued access tokens keep
/// the old grade until they expire.
async fn set_grade(
    State(state): State<AdminState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    Json(payload): Json<SetGradeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&id)?;
    let updated = state
        .db
        .users()
        .set_grade(&id, payload.grade)
        .await
        .db_err("Failed to set grade")?;
    if !updated {
        return Err(ApiError::not_found("User not found"));
    }

    info!(user_id = %id, grade = payload.grade.as_str(), by = %admin.id(), "Grade changed");
    Ok(Json(load_profile(&state.db, &id).await?))
}

#[derive(Deserialize)]
struct SetStatusRequest {
    status: UserStatus,
}

async fn set_status(
    State(state): State<AdminState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    Json(payload): Json<SetStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&id)?;
    if id == admin.id() {
        return Err(ApiError::bad_request("Cannot change your own status"));
    }

    let updated = state
        .db
        .users()
        .set_status(&id, payload.status)
        .await
        .db_err("Failed to set status")?;
    if !updated {
        return Err(ApiError::not_found("User not found"));
    }

    info!(user_id = %id, status = payload.status.as_str(), by = %admin.id(), "Status changed");
    Ok(Json(load_profile(&state.db, &id).await?))
}

#[derive(Deserialize)]
struct SetFeaturedRequest {
    featured: bool,
}

#[derive(Serialize)]
struct FeaturedResponse {
    id: String,
    featured: bool,
}

/// Spotlight a listing. Only listings whose owner's plan includes featuring
/// can be turned on; turning off is always allowed.
async fn set_featured(
    State(state): State<AdminState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    Json(payload): Json<SetFeaturedRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&id)?;
    let company = state
        .db
        .companies()
        .get(&id)
        .await
        .db_err("Failed to get company")?
        .ok_or_else(|| ApiError::not_found("Company not found"))?;

    if payload.featured {
        owner_entitlements(&state.db, state.trial_policy, &company.owner_id)
            .await?
            .check_featured()?;
    }

    state
        .db
        .companies()
        .set_featured(&id, payload.featured)
        .await
        .db_err("Failed to set featured")?;

    info!(company_id = %id, featured = payload.featured, by = %admin.id(), "Featured flag changed");
    Ok(Json(FeaturedResponse {
        id,
        featured: payload.featured,
    }))
}
