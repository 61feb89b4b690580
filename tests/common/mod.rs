#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::ConnectInfo,
    http::{Request, Response, header},
};
use bizdir::{
    ServerConfig, create_app,
    db::{Database, NewUser, User},
    entitlements::TrialPolicy,
    jwt::TokenCodec,
    rate_limit::RateLimits,
    registry::RegistryVerifier,
};
use tower::ServiceExt;

pub const ACCESS_SECRET: &[u8] = b"test-access-secret-0123456789abcdef";
pub const REFRESH_SECRET: &[u8] = b"test-refresh-secret-0123456789abcdef";
pub const PASSWORD: &str = "correct-horse-battery";

/// Lowest bcrypt cost, keeps tests fast.
pub const TEST_PASSWORD_COST: u32 = 4;

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub codec: TokenCodec,
}

pub fn test_config(db: Database) -> ServerConfig {
    ServerConfig {
        db,
        access_secret: ACCESS_SECRET.to_vec(),
        refresh_secret: REFRESH_SECRET.to_vec(),
        secure_cookies: false,
        no_signup: false,
        trial_policy: TrialPolicy::Honor,
        password_cost: TEST_PASSWORD_COST,
        ip_header: None,
        rate_limits: RateLimits::permissive(),
        registry: None,
    }
}

pub async fn test_app() -> TestApp {
    test_app_with(|_| {}).await
}

/// Build an app after adjusting the default test configuration.
pub async fn test_app_with(adjust: impl FnOnce(&mut ServerConfig)) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let mut config = test_config(db.clone());
    adjust(&mut config);
    TestApp {
        app: create_app(&config),
        db,
        codec: TokenCodec::new(ACCESS_SECRET, REFRESH_SECRET),
    }
}

pub fn with_registry(registry: Arc<dyn RegistryVerifier>) -> impl FnOnce(&mut ServerConfig) {
    move |config: &mut ServerConfig| config.registry = Some(registry)
}

fn client_addr() -> ConnectInfo<SocketAddr> {
    ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 40000)))
}

/// Request with a JSON body, an optional Cookie header, and a client address.
pub fn json_request(
    method: &str,
    uri: &str,
    body: serde_json::Value,
    cookies: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookies) = cookies {
        builder = builder.header(header::COOKIE, cookies);
    }
    let mut request = builder.body(Body::from(body.to_string())).unwrap();
    request.extensions_mut().insert(client_addr());
    request
}

/// Bodiless request with an optional Cookie header.
pub fn request(method: &str, uri: &str, cookies: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookies) = cookies {
        builder = builder.header(header::COOKIE, cookies);
    }
    let mut request = builder.body(Body::empty()).unwrap();
    request.extensions_mut().insert(client_addr());
    request
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// Full Set-Cookie line for a cookie name.
pub fn find_cookie<'a>(cookies: &'a [String], name: &str) -> Option<&'a str> {
    let prefix = format!("{}=", name);
    cookies
        .iter()
        .find(|c| c.starts_with(&prefix))
        .map(String::as_str)
}

/// Value part of a Set-Cookie line.
pub fn cookie_value(cookies: &[String], name: &str) -> Option<String> {
    let line = find_cookie(cookies, name)?;
    let (pair, _) = line.split_once(';').unwrap_or((line, ""));
    pair.split_once('=').map(|(_, v)| v.to_string())
}

/// Access and refresh tokens held by a test client.
#[derive(Debug, Clone)]
pub struct Session {
    pub access: String,
    pub refresh: String,
}

impl Session {
    pub fn from_response(response: &Response<Body>) -> Self {
        let cookies = set_cookies(response);
        Self {
            access: cookie_value(&cookies, "access_token").expect("no access cookie"),
            refresh: cookie_value(&cookies, "refresh_token").expect("no refresh cookie"),
        }
    }

    pub fn cookies(&self) -> String {
        format!("access_token={}; refresh_token={}", self.access, self.refresh)
    }

    pub fn access_only(&self) -> String {
        format!("access_token={}", self.access)
    }

    pub fn refresh_only(&self) -> String {
        format!("refresh_token={}", self.refresh)
    }
}

/// Insert a user directly into the store with [`PASSWORD`].
pub async fn create_user(db: &Database, email: &str, is_admin: bool) -> User {
    let id = uuid::Uuid::new_v4().to_string();
    let hash = bcrypt::hash(PASSWORD, TEST_PASSWORD_COST).unwrap();
    db.users()
        .create(&NewUser {
            id: &id,
            email,
            password_hash: &hash,
            name: "Test User",
            phone: None,
            is_admin,
        })
        .await
        .unwrap();
    db.users().get_by_id(&id).await.unwrap().unwrap()
}

pub async fn login(app: &Router, email: &str, remember: bool) -> Session {
    let response = send(
        app,
        json_request(
            "POST",
            "/api/auth/login",
            serde_json::json!({ "email": email, "password": PASSWORD, "remember": remember }),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), 200, "login failed for {}", email);
    Session::from_response(&response)
}

/// Minimal valid listing body.
pub fn listing(name: &str) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "registration_number": "123-45-67890",
        "description": "A test company",
        "category_tags": ["food"],
        "detail_images": ["https://img.example.com/1.png"],
    })
}
