mod account;
mod admin;
mod auth;
mod companies;
mod error;
mod registry;

use axum::Router;
use chrono::Utc;
use std::sync::Arc;

use crate::auth::SessionCookies;
use crate::db::Database;
use crate::entitlements::{self, EntitlementSet, TrialPolicy};
use crate::jwt::TokenCodec;
use crate::rate_limit::RateLimitConfig;
use crate::registry::RegistryVerifier;

pub use account::UserProfile;
pub use error::{ApiError, ResultExt};

/// Shared handles every API router is built from.
#[derive(Clone)]
pub struct ApiContext {
    pub db: Database,
    pub codec: Arc<TokenCodec>,
    pub cookies: SessionCookies,
    pub trial_policy: TrialPolicy,
    pub password_cost: u32,
    pub no_signup: bool,
    pub rate_limit_config: Arc<RateLimitConfig>,
    pub registry: Option<Arc<dyn RegistryVerifier>>,
}

/// Create the API router.
pub fn create_api_router(ctx: ApiContext) -> Router {
    let auth_state = auth::AuthState {
        db: ctx.db.clone(),
        codec: ctx.codec.clone(),
        trial_policy: ctx.trial_policy,
        cookies: ctx.cookies,
        password_cost: ctx.password_cost,
        no_signup: ctx.no_signup,
        rate_limit_config: ctx.rate_limit_config.clone(),
    };

    let account_state = account::AccountState {
        db: ctx.db.clone(),
        codec: ctx.codec.clone(),
        trial_policy: ctx.trial_policy,
    };

    let companies_state = companies::CompaniesState {
        db: ctx.db.clone(),
        codec: ctx.codec.clone(),
        trial_policy: ctx.trial_policy,
        registry: ctx.registry.clone(),
    };

    let registry_state = registry::RegistryState {
        db: ctx.db.clone(),
        codec: ctx.codec.clone(),
        trial_policy: ctx.trial_policy,
        registry: ctx.registry,
    };

    let admin_state = admin::AdminState {
        db: ctx.db,
        codec: ctx.codec,
        trial_policy: ctx.trial_policy,
    };

    Router::new()
        .nest("/auth", auth::router(auth_state))
        .nest("/account", account::router(account_state))
        .nest("/companies", companies::router(companies_state))
        .nest("/registry", registry::router(registry_state))
        .nest("/admin", admin::router(admin_state))
}

/// Limits of the user who owns a listing, read from the store.
/// Listing features follow the owner's plan even when an admin acts on them.
async fn owner_entitlements(
    db: &Database,
    trial_policy: TrialPolicy,
    owner_id: &str,
) -> Result<EntitlementSet, ApiError> {
    let owner = db
        .users()
        .get_by_id(owner_id)
        .await
        .db_err("Failed to get listing owner")?
        .ok_or_else(|| ApiError::not_found("Listing owner not found"))?;

    Ok(entitlements::for_user(&owner, Utc::now(), trial_policy))
}
