pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod client;
pub mod db;
pub mod entitlements;
pub mod jwt;
pub mod password;
pub mod rate_limit;
pub mod registry;

use api::{ApiContext, create_api_router};
use auth::SessionCookies;
use axum::Router;
use db::Database;
use entitlements::TrialPolicy;
use jwt::TokenCodec;
use rate_limit::{RateLimitConfig, RateLimits};
use registry::RegistryVerifier;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// HMAC key for access tokens
    pub access_secret: Vec<u8>,
    /// HMAC key for refresh tokens, distinct from the access key
    pub refresh_secret: Vec<u8>,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// Whether new user signups are disabled
    pub no_signup: bool,
    /// What happens to lapsed enterprise trials
    pub trial_policy: TrialPolicy,
    /// bcrypt cost for new password hashes
    pub password_cost: u32,
    /// IP extraction strategy (requires running behind a proxy)
    pub ip_header: Option<cli::ClientIpHeader>,
    /// Bucket sizes for the login and signup limiters
    pub rate_limits: RateLimits,
    /// Business registry client, if configured
    pub registry: Option<Arc<dyn RegistryVerifier>>,
}

/// Per-IP limiters for the credential endpoints. Build once and share
/// between the router and the maintenance task that prunes them.
pub fn rate_limiters(config: &ServerConfig) -> Arc<RateLimitConfig> {
    Arc::new(RateLimitConfig::new(config.rate_limits, config.ip_header))
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    create_app_with_limiters(config, rate_limiters(config))
}

/// Create the application router around existing rate limiters.
pub fn create_app_with_limiters(config: &ServerConfig, limiters: Arc<RateLimitConfig>) -> Router {
    let codec = Arc::new(TokenCodec::new(
        &config.access_secret,
        &config.refresh_secret,
    ));

    let api_router = create_api_router(ApiContext {
        db: config.db.clone(),
        codec,
        cookies: SessionCookies::new(config.secure_cookies),
        trial_policy: config.trial_policy,
        password_cost: config.password_cost,
        no_signup: config.no_signup,
        rate_limit_config: limiters,
        registry: config.registry.clone(),
    });

    Router::new().nest("/api", api_router)
}

/// Run maintenance once and spawn the background scheduler.
pub async fn init_cleanup(
    db: &Database,
    trial_policy: TrialPolicy,
    limiters: Arc<RateLimitConfig>,
) {
    cleanup::run_cleanup(db, trial_policy, &limiters).await;
    cleanup::spawn_cleanup_scheduler(db.clone(), trial_policy, limiters);
}

/// Run maintenance, then serve on the given listener until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let limiters = rate_limiters(&config);
    init_cleanup(&config.db, config.trial_policy, limiters.clone()).await;

    let app = create_app_with_limiters(&config, limiters);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
