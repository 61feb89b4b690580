//! Authentication state traits and macro.

use crate::db::Database;
use crate::entitlements::TrialPolicy;
use crate::jwt::TokenCodec;

/// Trait for state types that provide the store and token codec for authentication.
pub trait HasAuthBackend {
    fn codec(&self) -> &TokenCodec;
    fn db(&self) -> &Database;
    fn trial_policy(&self) -> TrialPolicy;
}

/// Macro to implement `HasAuthBackend` for state structs with the standard fields.
///
/// The struct must have these fields:
/// - `codec: Arc<TokenCodec>`
/// - `db: Database`
/// - `trial_policy: TrialPolicy`
///
/// # Example
/// ```ignore
/// use crate::impl_has_auth_backend;
///
/// #[derive(Clone)]
/// pub struct MyState {
///     pub db: Database,
///     pub codec: Arc<TokenCodec>,
///     pub trial_policy: TrialPolicy,
///     // ... other fields
/// }
///
/// impl_has_auth_backend!(MyState);
/// ```
#[macro_export]
macro_rules! impl_has_auth_backend {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthBackend for $state_type {
            fn codec(&self) -> &$crate::jwt::TokenCodec {
                &self.codec
            }
            fn db(&self) -> &$crate::db::Database {
                &self.db
            }
            fn trial_policy(&self) -> $crate::entitlements::TrialPolicy {
                self.trial_policy
            }
        }
    };
}
