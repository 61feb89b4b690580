//! Seams between the refresh scheduler and the outside world.

use futures::future::BoxFuture;

/// Why a session call failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("session rejected (401)")]
    Unauthorized,
    #[error("account unavailable (403)")]
    Forbidden,
    #[error("network error: {0}")]
    Network(String),
    #[error("server answered with status {0}")]
    Status(u16),
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl TransportError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => TransportError::Unauthorized,
            403 => TransportError::Forbidden,
            other => TransportError::Status(other),
        }
    }

    /// Whether the session should be considered over. Anything else is
    /// transient and left for the next tick.
    pub fn is_session_dead(&self) -> bool {
        matches!(
            self,
            TransportError::Unauthorized | TransportError::Forbidden | TransportError::Network(_)
        )
    }
}

/// Calls to the session endpoints. The implementation owns the cookies.
pub trait SessionTransport: Send + Sync {
    fn refresh(&self) -> BoxFuture<'_, Result<(), TransportError>>;
    fn logout(&self) -> BoxFuture<'_, Result<(), TransportError>>;
}

/// The page the user is on, and the way off it.
pub trait Navigator: Send + Sync {
    fn current_path(&self) -> String;
    fn redirect_to_login(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(TransportError::from_status(401), TransportError::Unauthorized);
        assert_eq!(TransportError::from_status(403), TransportError::Forbidden);
        assert_eq!(TransportError::from_status(500), TransportError::Status(500));

        assert!(TransportError::Unauthorized.is_session_dead());
        assert!(TransportError::Forbidden.is_session_dead());
        assert!(TransportError::Network("reset".into()).is_session_dead());
        assert!(!TransportError::Status(500).is_session_dead());
        assert!(!TransportError::Status(429).is_session_dead());
        assert!(!TransportError::Decode("eof".into()).is_session_dead());
    }
}
