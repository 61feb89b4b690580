//! CLI argument parsing, validation, and startup helpers.

use std::sync::Arc;

use crate::ServerConfig;
use crate::db::{Database, NewUser};
use crate::entitlements::TrialPolicy;
use crate::password::{DEFAULT_PASSWORD_COST, hash_password};
use crate::rate_limit::RateLimits;
use crate::registry::{HttpRegistryVerifier, RegistryVerifier};
use clap::Parser;
use rand::Rng;
use tracing::{error, info, warn};
use url::Url;
use uuid::Uuid;

const MIN_TOKEN_SECRET_LENGTH: usize = 32;
const GENERATED_PASSWORD_LENGTH: usize = 20;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

/// Proxy header carrying the original client IP.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientIpHeader {
    XForwardedFor,
    XRealIp,
}

impl ClientIpHeader {
    pub fn header_name(self) -> &'static str {
        match self {
            ClientIpHeader::XForwardedFor => "x-forwarded-for",
            ClientIpHeader::XRealIp => "x-real-ip",
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "bizdir",
    about = "Company directory with cookie sessions and plan-based limits"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "7291")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "bizdir.db")]
    pub database: String,

    /// Public origin of the site (e.g. "https://example.com"). HTTPS enables Secure cookies
    #[arg(long, default_value = "http://localhost:7291")]
    pub public_origin: String,

    /// File containing the access token secret. Prefer the ACCESS_TOKEN_SECRET env var
    #[arg(long)]
    pub access_secret_file: Option<String>,

    /// File containing the refresh token secret. Prefer the REFRESH_TOKEN_SECRET env var
    #[arg(long)]
    pub refresh_secret_file: Option<String>,

    /// Create (or promote) an admin account with this email on startup
    #[arg(long, value_name = "EMAIL")]
    pub create_admin: Option<String>,

    /// Disable new user signups
    #[arg(long)]
    pub no_signup: bool,

    /// What happens to enterprise trials after their end date
    #[arg(long, value_enum, default_value = "honor")]
    pub trial_policy: TrialPolicy,

    /// Business registry endpoint used for registration number checks
    #[arg(long, env = "REGISTRY_URL")]
    pub registry_url: Option<String>,

    /// Bearer key for the business registry
    #[arg(long, env = "REGISTRY_API_KEY", hide_env_values = true)]
    pub registry_api_key: Option<String>,

    /// Take the client IP from this proxy header instead of the socket address
    #[arg(long, value_enum)]
    pub ip_header: Option<ClientIpHeader>,

    /// bcrypt cost for new password hashes
    #[arg(long, default_value_t = DEFAULT_PASSWORD_COST, value_parser = clap::value_parser!(u32).range(4..=31))]
    pub password_cost: u32,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load a token secret from an environment variable or a file.
/// Returns None and logs an error if the secret cannot be loaded.
fn load_secret(env_var: &str, file: Option<&str>, flag: &str) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var(env_var) {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var(env_var) };
        secret
    } else if let Some(path) = file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read secret file");
                return None;
            }
        }
    } else {
        error!(
            "{} is required. Set the environment variable (recommended) or use {}",
            env_var, flag
        );
        return None;
    };

    if secret.len() < MIN_TOKEN_SECRET_LENGTH {
        error!(
            "{} is shorter than {} characters. Use a longer secret",
            env_var, MIN_TOKEN_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Load both token secrets. They must differ so a refresh token can never
/// verify as an access token.
pub fn load_token_secrets(
    access_secret_file: Option<&str>,
    refresh_secret_file: Option<&str>,
) -> Option<(String, String)> {
    let access = load_secret(
        "ACCESS_TOKEN_SECRET",
        access_secret_file,
        "--access-secret-file",
    )?;
    let refresh = load_secret(
        "REFRESH_TOKEN_SECRET",
        refresh_secret_file,
        "--refresh-secret-file",
    )?;

    if access == refresh {
        error!("Access and refresh token secrets must be different");
        return None;
    }

    Some((access, refresh))
}

/// Parse and validate the public origin URL.
/// Returns None and logs an error if validation fails.
pub fn validate_public_origin(public_origin: &str) -> Option<Url> {
    let url = match Url::parse(public_origin) {
        Ok(url) => url,
        Err(e) => {
            error!(origin = %public_origin, error = %e, "Invalid public-origin URL");
            return None;
        }
    };

    let is_https = url.scheme() == "https";
    let is_localhost = url.host_str() == Some("localhost");

    if !is_https && !is_localhost {
        error!("public-origin must use HTTPS for non-localhost deployments");
        return None;
    }

    Some(url)
}

/// Build the registry client when a URL is configured.
/// Returns `Some(None)` when no registry is configured, and None (after
/// logging) when the configuration is invalid.
pub fn build_registry(
    registry_url: Option<&str>,
    api_key: Option<String>,
) -> Option<Option<Arc<dyn RegistryVerifier>>> {
    let Some(raw) = registry_url else {
        warn!("No registry URL configured; registration number checks are disabled");
        return Some(None);
    };

    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(e) => {
            error!(url = %raw, error = %e, "Invalid registry URL");
            return None;
        }
    };

    match HttpRegistryVerifier::new(url, api_key) {
        Ok(verifier) => {
            info!(url = %raw, "Registry checks enabled");
            let verifier: Arc<dyn RegistryVerifier> = Arc::new(verifier);
            Some(Some(verifier))
        }
        Err(e) => {
            error!(error = %e, "Failed to build registry client");
            None
        }
    }
}

fn generate_password() -> String {
    rand::rng()
        .sample_iter(rand::distr::Alphanumeric)
        .take(GENERATED_PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}

/// Handle the --create-admin flag: promote an existing account or create a
/// new admin with a generated password.
pub async fn handle_create_admin(db: &Database, email: &str, password_cost: u32) {
    match db.users().get_by_email(email).await {
        Ok(Some(existing)) => {
            if existing.is_admin {
                println!();
                println!("Admin already exists: {}", existing.email);
                println!();
                return;
            }
            if let Err(e) = db.users().set_admin(&existing.id, true).await {
                error!(error = %e, "Failed to promote user to admin");
                std::process::exit(1);
            }
            println!();
            println!("Promoted to admin: {}", existing.email);
            println!();
        }
        Ok(None) => {
            let password = generate_password();
            let password_hash = match hash_password(password.clone(), password_cost).await {
                Ok(hash) => hash,
                Err(e) => {
                    error!(error = %e, "Failed to hash admin password");
                    std::process::exit(1);
                }
            };
            let id = Uuid::new_v4().to_string();
            let created = db
                .users()
                .create(&NewUser {
                    id: &id,
                    email,
                    password_hash: &password_hash,
                    name: "Administrator",
                    phone: None,
                    is_admin: true,
                })
                .await;

            match created {
                Ok(()) => {
                    println!();
                    println!("Admin user created: {}", email);
                    println!("Password: {}", password);
                    println!();
                }
                Err(e) => {
                    error!(error = %e, "Failed to create admin user");
                    std::process::exit(1);
                }
            }
        }
        Err(e) => {
            error!(error = %e, "Failed to check for existing admin");
            std::process::exit(1);
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    args: &Args,
    db: Database,
    public_origin: Url,
    access_secret: String,
    refresh_secret: String,
    registry: Option<Arc<dyn RegistryVerifier>>,
) -> ServerConfig {
    let secure_cookies = public_origin.scheme() == "https";

    ServerConfig {
        db,
        access_secret: access_secret.into_bytes(),
        refresh_secret: refresh_secret.into_bytes(),
        secure_cookies,
        no_signup: args.no_signup,
        trial_policy: args.trial_policy,
        password_cost: args.password_cost,
        ip_header: args.ip_header,
        rate_limits: RateLimits::default(),
        registry,
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
