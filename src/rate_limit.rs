//! Rate limiting for credential endpoints.
//!
//! Uses a token bucket algorithm with per-IP tracking to slow down password
//! guessing and signup spam.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc};

use crate::auth::extract_client_ip;
use crate::cli::ClientIpHeader;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Bucket sizes. Zero is treated as one.
#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    /// Sustained login attempts per second per IP
    pub login_per_sec: u32,
    /// Login attempts allowed in a burst
    pub login_burst: u32,
    /// Signups per minute per IP
    pub signup_per_min: u32,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            login_per_sec: 1,
            login_burst: 5,
            signup_per_min: 3,
        }
    }
}

impl RateLimits {
    /// Limits high enough to never trigger in tests.
    pub fn permissive() -> Self {
        Self {
            login_per_sec: 1000,
            login_burst: 1000,
            signup_per_min: 1000,
        }
    }
}

fn non_zero(n: u32) -> NonZeroU32 {
    NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN)
}

/// Rate limiting configuration for credential endpoints.
pub struct RateLimitConfig {
    /// Login: 5 attempts, refilled one per second
    pub login: IpLimiter,
    /// User creation: 3 per minute
    pub signup: IpLimiter,
    /// Where the client IP comes from
    pub ip_header: Option<ClientIpHeader>,
}

impl RateLimitConfig {
    pub fn new(limits: RateLimits, ip_header: Option<ClientIpHeader>) -> Self {
        Self {
            login: RateLimiter::keyed(
                Quota::per_second(non_zero(limits.login_per_sec))
                    .allow_burst(non_zero(limits.login_burst)),
            ),
            signup: RateLimiter::keyed(Quota::per_minute(non_zero(limits.signup_per_min))),
            ip_header,
        }
    }

    /// Drop buckets that have refilled completely. Without this the key map
    /// grows with every client IP ever seen.
    pub fn retain_recent(&self) {
        self.login.retain_recent();
        self.signup.retain_recent();
        self.login.shrink_to_fit();
        self.signup.shrink_to_fit();
    }

    /// Number of client IPs currently tracked across both limiters.
    pub fn tracked_clients(&self) -> usize {
        self.login.len() + self.signup.len()
    }
}

fn check(limiter: &IpLimiter, config: &RateLimitConfig, request: &Request) -> Result<(), Response> {
    let ip = extract_client_ip(request, config.ip_header).map_err(|e| {
        tracing::warn!(reason = e, "Unable to determine client IP");
        (StatusCode::FORBIDDEN, "Unable to determine client IP.").into_response()
    })?;

    limiter.check_key(&ip).map_err(|_| {
        tracing::info!(ip = %ip, "Rate limit hit");
        (
            StatusCode::TOO_MANY_REQUESTS,
            "Too many attempts. Please wait before trying again.",
        )
            .into_response()
    })
}

/// Middleware for rate limiting login.
pub async fn rate_limit_login(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    match check(&config.login, &config, &request) {
        Ok(()) => next.run(request).await,
        Err(response) => response,
    }
}

/// Middleware for rate limiting user creation.
pub async fn rate_limit_signup(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    match check(&config.signup, &config, &request) {
        Ok(()) => next.run(request).await,
        Err(response) => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_from(ip: &str) -> Request {
        axum::http::Request::builder()
            .header("x-real-ip", ip)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_login_burst_then_limited() {
        let config = RateLimitConfig::new(RateLimits::default(), Some(ClientIpHeader::XRealIp));
        let request = request_from("203.0.113.9");

        for _ in 0..5 {
            assert!(check(&config.login, &config, &request).is_ok());
        }
        assert!(check(&config.login, &config, &request).is_err());

        // Other clients have their own bucket.
        assert!(check(&config.login, &config, &request_from("203.0.113.10")).is_ok());
    }

    #[test]
    fn test_unknown_ip_is_refused() {
        let config = RateLimitConfig::new(RateLimits::permissive(), None);
        let request = request_from("203.0.113.9");
        let response = check(&config.login, &config, &request).unwrap_err();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_retain_recent_drops_refilled_buckets() {
        let limits = RateLimits {
            login_per_sec: 1000,
            login_burst: 1,
            signup_per_min: 6000,
        };
        let config = RateLimitConfig::new(limits, Some(ClientIpHeader::XRealIp));
        let request = request_from("203.0.113.9");
        assert!(check(&config.login, &config, &request).is_ok());
        assert!(check(&config.signup, &config, &request).is_ok());
        assert_eq!(config.tracked_clients(), 2);

        // Both buckets refill within 10ms.
        std::thread::sleep(std::time::Duration::from_millis(50));
        config.retain_recent();
        assert_eq!(config.tracked_clients(), 0);
    }

    #[test]
    fn test_retain_recent_keeps_limited_clients() {
        let config = RateLimitConfig::new(RateLimits::default(), Some(ClientIpHeader::XRealIp));
        let request = request_from("203.0.113.9");
        assert!(check(&config.signup, &config, &request).is_ok());

        config.retain_recent();
        assert_eq!(config.tracked_clients(), 1);
    }
}
