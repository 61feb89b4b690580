//! Company directory endpoints.
//!
//! - GET `/` - Public directory, featured listings first
//! - POST `/` - Create a listing (plan-gated)
//! - GET `/mine` - Listings owned by the caller
//! - GET `/{id}` - One listing
//! - PUT `/{id}` - Update a listing (owner or admin, plan-gated)
//! - DELETE `/{id}` - Delete a listing (owner or admin)
//! - POST `/{id}/verify` - Check the registration number with the registry

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, ResultExt, validate_uuid};
use super::owner_entitlements;
use crate::auth::{ActiveUser, AuthenticatedUser, OptionalAuth};
use crate::db::{Company, CompanyFields, Database};
use crate::entitlements::{EntitlementSet, TrialPolicy};
use crate::impl_has_auth_backend;
use crate::jwt::TokenCodec;
use crate::registry::{Applicant, BusinessNumber, RegistryVerifier, Verification};

const MAX_COMPANY_NAME_LENGTH: usize = 200;
const MAX_DESCRIPTION_LENGTH: usize = 5000;

#[derive(Clone)]
pub struct CompaniesState {
    pub db: Database,
    pub codec: Arc<TokenCodec>,
    pub trial_policy: TrialPolicy,
    pub registry: Option<Arc<dyn RegistryVerifier>>,
}

impl_has_auth_backend!(CompaniesState);

pub fn router(state: CompaniesState) -> Router {
    Router::new()
        .route("/", get(list_companies).post(create_company))
        .route("/mine", get(list_mine))
        .route(
            "/{id}",
            get(get_company).put(update_company).delete(delete_company),
        )
        .route("/{id}/verify", post(verify_company))
        .with_state(state)
}

#[derive(Serialize)]
struct CompanyView {
    #[serde(flatten)]
    company: Company,
    is_owner: bool,
}

async fn list_companies(
    State(state): State<CompaniesState>,
    OptionalAuth(viewer): OptionalAuth,
) -> Result<impl IntoResponse, ApiError> {
    let companies = state
        .db
        .companies()
        .list_public()
        .await
        .db_err("Failed to list companies")?;

    let viewer_id = viewer.map(|identity| identity.user_id);
    let views: Vec<CompanyView> = companies
        .into_iter()
        .map(|company| CompanyView {
            is_owner: viewer_id.as_deref() == Some(company.owner_id.as_str()),
            company,
        })
        .collect();

    Ok(Json(views))
}

async fn list_mine(
    State(state): State<CompaniesState>,
    ActiveUser(auth): ActiveUser,
) -> Result<impl IntoResponse, ApiError> {
    let companies = state
        .db
        .companies()
        .list_by_owner(auth.id())
        .await
        .db_err("Failed to list companies")?;

    Ok(Json(companies))
}

async fn get_company(
    State(state): State<CompaniesState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&id)?;
    let company = load_company(&state.db, &id).await?;
    Ok(Json(company))
}

/// Trim and validate submitted fields, normalizing the registration number.
fn normalize_fields(mut fields: CompanyFields) -> Result<CompanyFields, ApiError> {
    fields.name = fields.name.trim().to_string();
    if fields.name.is_empty() {
        return Err(ApiError::bad_request("Company name cannot be empty"));
    }
    if fields.name.chars().count() > MAX_COMPANY_NAME_LENGTH {
        return Err(ApiError::bad_request("Company name is too long"));
    }
    if fields.description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(ApiError::bad_request("Description is too long"));
    }

    fields.registration_number = BusinessNumber::parse(&fields.registration_number)?
        .as_str()
        .to_string();

    fields.category_tags = fields
        .category_tags
        .into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect();
    fields.detail_images.retain(|url| !url.trim().is_empty());
    fields.brand_color = fields.brand_color.filter(|c| !c.trim().is_empty());
    fields.video_url = fields.video_url.filter(|v| !v.trim().is_empty());

    if let Some(color) = &fields.brand_color {
        let hex = color.strip_prefix('#').unwrap_or("");
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ApiError::bad_request("Brand color must look like #1a2b3c"));
        }
    }

    Ok(fields)
}

async fn create_company(
    State(state): State<CompaniesState>,
    ActiveUser(auth): ActiveUser,
    Json(fields): Json<CompanyFields>,
) -> Result<impl IntoResponse, ApiError> {
    let fields = normalize_fields(fields)?;
    auth.entitlements.check_profile(&fields.usage())?;

    let id = uuid::Uuid::new_v4().to_string();
    state
        .db
        .companies()
        .create(&id, auth.id(), &fields)
        .await
        .db_err("Failed to create company")?;

    let company = load_company(&state.db, &id).await?;
    info!(company_id = %id, owner_id = %auth.id(), "Company created");
    Ok((StatusCode::CREATED, Json(company)))
}

async fn update_company(
    State(state): State<CompaniesState>,
    ActiveUser(auth): ActiveUser,
    Path(id): Path<String>,
    Json(fields): Json<CompanyFields>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&id)?;
    let company = load_company(&state.db, &id).await?;
    require_owner_or_admin(&auth, &company)?;

    let fields = normalize_fields(fields)?;
    let entitlements = listing_entitlements(&state, &auth, &company).await?;
    entitlements.check_profile(&fields.usage())?;

    state
        .db
        .companies()
        .update(&id, &fields)
        .await
        .db_err("Failed to update company")?;

    let company = load_company(&state.db, &id).await?;
    Ok(Json(company))
}

async fn delete_company(
    State(state): State<CompaniesState>,
    ActiveUser(auth): ActiveUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&id)?;
    let company = load_company(&state.db, &id).await?;
    require_owner_or_admin(&auth, &company)?;

    let deleted = state
        .db
        .companies()
        .delete(&id)
        .await
        .db_err("Failed to delete company")?;
    if !deleted {
        return Err(ApiError::not_found("Company not found"));
    }

    info!(company_id = %id, by = %auth.id(), "Company deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
struct VerifyResponse {
    verification: Verification,
    company: Company,
}

async fn verify_company(
    State(state): State<CompaniesState>,
    ActiveUser(auth): ActiveUser,
    Path(id): Path<String>,
    Json(applicant): Json<Applicant>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&id)?;
    let company = load_company(&state.db, &id).await?;
    require_owner_or_admin(&auth, &company)?;

    let registry = state
        .registry
        .as_ref()
        .ok_or_else(|| ApiError::ServiceUnavailable("Registry is not configured".into()))?;

    let number = BusinessNumber::parse(&company.registration_number)?;
    let verification = registry.verify(&number, &applicant).await?;

    state
        .db
        .companies()
        .set_verified(&id, verification.is_valid)
        .await
        .db_err("Failed to update company")?;

    info!(company_id = %id, valid = verification.is_valid, "Registration number checked");

    let company = load_company(&state.db, &id).await?;
    Ok(Json(VerifyResponse {
        verification,
        company,
    }))
}

async fn load_company(db: &Database, id: &str) -> Result<Company, ApiError> {
    db.companies()
        .get(id)
        .await
        .db_err("Failed to get company")?
        .ok_or_else(|| ApiError::not_found("Company not found"))
}

fn require_owner_or_admin(auth: &AuthenticatedUser, company: &Company) -> Result<(), ApiError> {
    if company.owner_id == auth.id() || auth.is_admin() {
        Ok(())
    } else {
        Err(ApiError::forbidden("You can only manage your own listings"))
    }
}

/// Limits a listing is checked against: the owner's plan.
async fn listing_entitlements(
    state: &CompaniesState,
    auth: &AuthenticatedUser,
    company: &Company,
) -> Result<EntitlementSet, ApiError> {
    if company.owner_id == auth.id() {
        Ok(auth.entitlements)
    } else {
        owner_entitlements(&state.db, state.trial_policy, &company.owner_id).await
    }
}
