//! Authentication user types.

use serde::{Deserialize, Serialize};

use crate::db::{Grade, User};
use crate::entitlements::EntitlementSet;
use crate::jwt::AccessClaims;

/// Verified identity carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub grade: Grade,
    pub is_admin: bool,
}

impl From<AccessClaims> for Identity {
    fn from(claims: AccessClaims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            name: claims.name,
            grade: claims.grade,
            is_admin: claims.admin,
        }
    }
}

/// Identity re-checked against the store: the user exists and is not suspended.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub identity: Identity,
    /// Current user row
    pub user: User,
    /// Limits derived from the stored grade for this request only
    pub entitlements: EntitlementSet,
}

impl AuthenticatedUser {
    pub fn id(&self) -> &str {
        &self.user.id
    }

    pub fn is_admin(&self) -> bool {
        self.user.is_admin
    }
}
