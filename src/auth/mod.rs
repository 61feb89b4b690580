//! Cookie-based dual-token authentication.
//!
//! Short-lived access tokens (15 min) are verified statelessly on every
//! request. Long-lived refresh tokens (7 or 30 days) are exchanged for a new
//! pair at `/api/auth/refresh`, re-reading the user row each time.

mod cookie;
mod errors;
mod extractors;
mod identity;
mod ip;
mod refresh;
mod state;
mod types;

pub use cookie::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, SessionCookies, get_cookie};
pub use errors::{ApiAuthError, AuthErrorKind};
pub use extractors::{ActiveUser, AdminUser, Auth, OptionalAuth};
pub use identity::resolve_identity;
pub use ip::{HasHeadersAndExtensions, extract_client_ip};
pub use refresh::{RefreshError, SessionPair, issue_session, rotate_session};
pub use state::HasAuthBackend;
pub use types::{AuthenticatedUser, Identity};
