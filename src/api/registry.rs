//! Raw registration number lookup, used by the registration form before a
//! listing exists.

use axum::{Json, Router, extract::State, response::IntoResponse, routing::post};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use super::error::ApiError;
use crate::auth::ActiveUser;
use crate::db::Database;
use crate::entitlements::TrialPolicy;
use crate::impl_has_auth_backend;
use crate::jwt::TokenCodec;
use crate::registry::{Applicant, BusinessNumber, RegistryVerifier};

#[derive(Clone)]
pub struct RegistryState {
    pub db: Database,
    pub codec: Arc<TokenCodec>,
    pub trial_policy: TrialPolicy,
    pub registry: Option<Arc<dyn RegistryVerifier>>,
}

impl_has_auth_backend!(RegistryState);

pub fn router(state: RegistryState) -> Router {
    Router::new()
        .route("/verify", post(verify_number))
        .with_state(state)
}

#[derive(Deserialize)]
struct VerifyRequest {
    registration_number: String,
    #[serde(flatten)]
    applicant: Applicant,
}

async fn verify_number(
    State(state): State<RegistryState>,
    ActiveUser(auth): ActiveUser,
    Json(payload): Json<VerifyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let number = BusinessNumber::parse(&payload.registration_number)?;
    let registry = state
        .registry
        .as_ref()
        .ok_or_else(|| ApiError::ServiceUnavailable("Registry is not configured".into()))?;

    let verification = registry.verify(&number, &payload.applicant).await?;
    debug!(user_id = %auth.id(), valid = verification.is_valid, "Registry lookup");
    Ok(Json(verification))
}
