//! Access and refresh token issuance and verification.
//!
//! Two token classes, each signed with its own HS256 secret:
//! - Access tokens: 15 minutes, carry the identity and privileges
//! - Refresh tokens: 7 days (30 with "remember me"), carry only subject and email
//!
//! Verification fails closed: anything that is not a well-formed, correctly
//! signed, unexpired token of the requested class yields `None`.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::db::{Grade, User};

/// Token class. Also selects the signing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims for access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user UUID)
    pub sub: String,
    pub email: String,
    /// Display name
    pub name: String,
    pub grade: Grade,
    pub admin: bool,
    /// Unique token ID, so two tokens minted in the same second still differ
    pub jti: String,
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// JWT claims for refresh tokens. Privileges are deliberately absent and are
/// re-read from the store on every rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// Subject (user UUID)
    pub sub: String,
    pub email: String,
    pub jti: String,
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    pub iat: u64,
    pub exp: u64,
}

/// Access token duration: 15 minutes
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 15 * 60;

/// Refresh token duration: 7 days
pub const REFRESH_TOKEN_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// Refresh token duration when "remember me" was requested: 30 days
pub const REMEMBER_REFRESH_TOKEN_DURATION_SECS: u64 = 30 * 24 * 60 * 60;

/// Lifetime class of a refresh token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshLifetime {
    Default,
    Remember,
}

impl RefreshLifetime {
    pub fn from_remember(remember: bool) -> Self {
        if remember { Self::Remember } else { Self::Default }
    }

    pub fn duration(self) -> u64 {
        match self {
            Self::Default => REFRESH_TOKEN_DURATION_SECS,
            Self::Remember => REMEMBER_REFRESH_TOKEN_DURATION_SECS,
        }
    }

    /// Recover the lifetime class a refresh token was issued with.
    pub fn of(claims: &RefreshClaims) -> Self {
        if claims.exp.saturating_sub(claims.iat) > REFRESH_TOKEN_DURATION_SECS {
            Self::Remember
        } else {
            Self::Default
        }
    }
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The JWT token string
    pub token: String,
    /// Issued at timestamp (Unix seconds)
    pub issued_at: u64,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
    /// Token duration in seconds, used as the cookie Max-Age
    pub duration: u64,
}

/// Claims returned by [`TokenCodec::verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifiedClaims {
    Access(AccessClaims),
    Refresh(RefreshClaims),
}

trait TypedClaims: DeserializeOwned {
    fn token_type(&self) -> TokenType;
}

impl TypedClaims for AccessClaims {
    fn token_type(&self) -> TokenType {
        self.token_type
    }
}

impl TypedClaims for RefreshClaims {
    fn token_type(&self) -> TokenType {
        self.token_type
    }
}

#[derive(Clone)]
struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// Signs and verifies both token classes.
#[derive(Clone)]
pub struct TokenCodec {
    access: KeyPair,
    refresh: KeyPair,
}

impl TokenCodec {
    /// Create a codec from the two class secrets. They must differ so a leaked
    /// refresh secret cannot mint access tokens and vice versa.
    pub fn new(access_secret: &[u8], refresh_secret: &[u8]) -> Self {
        Self {
            access: KeyPair::from_secret(access_secret),
            refresh: KeyPair::from_secret(refresh_secret),
        }
    }

    fn keys(&self, class: TokenType) -> &KeyPair {
        match class {
            TokenType::Access => &self.access,
            TokenType::Refresh => &self.refresh,
        }
    }

    /// Issue an access token carrying the user's stored privileges.
    pub fn issue_access(&self, user: &User) -> Result<IssuedToken, TokenError> {
        self.issue_access_as(user, user.grade)
    }

    /// Issue an access token whose grade claim is `grade` rather than the
    /// stored one, e.g. a lapsed trial evaluated as basic.
    pub fn issue_access_as(&self, user: &User, grade: Grade) -> Result<IssuedToken, TokenError> {
        self.mint_access(user, grade, now_secs()?)
    }

    /// Issue an access token with an explicit issued-at time.
    pub fn issue_access_at(&self, user: &User, now: u64) -> Result<IssuedToken, TokenError> {
        self.mint_access(user, user.grade, now)
    }

    fn mint_access(&self, user: &User, grade: Grade, now: u64) -> Result<IssuedToken, TokenError> {
        let exp = now + ACCESS_TOKEN_DURATION_SECS;
        let claims = AccessClaims {
            sub: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            grade,
            admin: user.is_admin,
            jti: Uuid::new_v4().to_string(),
            token_type: TokenType::Access,
            iat: now,
            exp,
        };

        Ok(IssuedToken {
            token: self.sign(TokenType::Access, &claims)?,
            issued_at: now,
            expires_at: exp,
            duration: ACCESS_TOKEN_DURATION_SECS,
        })
    }

    /// Issue a refresh token for a subject.
    pub fn issue_refresh(
        &self,
        user_id: &str,
        email: &str,
        lifetime: RefreshLifetime,
    ) -> Result<IssuedToken, TokenError> {
        self.issue_refresh_at(user_id, email, lifetime, now_secs()?)
    }

    /// Issue a refresh token with an explicit issued-at time.
    pub fn issue_refresh_at(
        &self,
        user_id: &str,
        email: &str,
        lifetime: RefreshLifetime,
        now: u64,
    ) -> Result<IssuedToken, TokenError> {
        let duration = lifetime.duration();
        let exp = now + duration;
        let claims = RefreshClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            jti: Uuid::new_v4().to_string(),
            token_type: TokenType::Refresh,
            iat: now,
            exp,
        };

        Ok(IssuedToken {
            token: self.sign(TokenType::Refresh, &claims)?,
            issued_at: now,
            expires_at: exp,
            duration,
        })
    }

    fn sign<C: Serialize>(&self, class: TokenType, claims: &C) -> Result<String, TokenError> {
        jsonwebtoken::encode(&Header::default(), claims, &self.keys(class).encoding)
            .map_err(TokenError::Encoding)
    }

    fn decode<C: TypedClaims>(&self, token: &str, class: TokenType) -> Result<C, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = jsonwebtoken::decode::<C>(token, &self.keys(class).decoding, &validation)
            .map_err(TokenError::Decoding)?;

        if data.claims.token_type() != class {
            return Err(TokenError::WrongTokenType);
        }

        Ok(data.claims)
    }

    /// Verify an access token.
    pub fn verify_access(&self, token: &str) -> Option<AccessClaims> {
        self.decode(token, TokenType::Access)
            .inspect_err(|e| tracing::debug!(error = %e, "Rejected access token"))
            .ok()
    }

    /// Verify a refresh token.
    pub fn verify_refresh(&self, token: &str) -> Option<RefreshClaims> {
        self.decode(token, TokenType::Refresh)
            .inspect_err(|e| tracing::debug!(error = %e, "Rejected refresh token"))
            .ok()
    }

    /// Verify a token against the given class.
    pub fn verify(&self, token: &str, class: TokenType) -> Option<VerifiedClaims> {
        match class {
            TokenType::Access => self.verify_access(token).map(VerifiedClaims::Access),
            TokenType::Refresh => self.verify_refresh(token).map(VerifiedClaims::Refresh),
        }
    }
}

/// Current Unix time in seconds.
pub fn now_secs() -> Result<u64, TokenError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| TokenError::TimeError)
}

/// Errors that can occur during token operations.
#[derive(Debug)]
pub enum TokenError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Error decoding the token
    Decoding(jsonwebtoken::errors::Error),
    /// System time error
    TimeError,
    /// Token of the other class (e.g. refresh token presented as access token)
    WrongTokenType,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            TokenError::Decoding(e) => write!(f, "Failed to decode token: {}", e),
            TokenError::TimeError => write!(f, "System time error"),
            TokenError::WrongTokenType => write!(f, "Wrong token type"),
        }
    }
}

impl std::error::Error for TokenError {}
