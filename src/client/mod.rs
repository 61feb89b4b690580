//! Client-side session keeping: a refresh loop that renews the cookie pair
//! before the access token expires and tears the session down when it is dead.

mod http;
mod routes;
mod scheduler;
mod transport;

pub use http::{HttpSessionClient, Session, WhoAmI};
pub use routes::{LOGIN_PATH, PROTECTED_PREFIXES, SIGNUP_PATH, is_auth_page, is_protected};
pub use scheduler::{
    AttemptOutcome, DEBOUNCE, REFRESH_INTERVAL, RefreshScheduler, SchedulerHandle, SkipReason,
    Trigger, spawn,
};
pub use transport::{Navigator, SessionTransport, TransportError};
