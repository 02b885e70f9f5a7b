//! Adapter error taxonomy.

use thiserror::Error;

/// Errors surfaced by backend adapters.
///
/// The engine recovers locally from everything except the kinds flagged by
/// [`AdapterError::is_fatal`]: authentication failures, a missing container,
/// and persistent unavailability terminate the loader with status `failed`.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Credentials were rejected by the backend.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The addressed container does not exist.
    #[error("container missing: {0}")]
    ContainerMissing(String),

    /// The backend cannot be reached.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// An insert collided with an existing primary key.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// An update addressed a key that no longer exists.
    #[error("no record with key: {0}")]
    KeyNotFound(String),

    /// Any other backend RPC failure; treated as transient.
    #[error("{0}")]
    Backend(String),
}

impl AdapterError {
    /// Whether this error must halt the loader instead of being skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AdapterError::Auth(_) | AdapterError::ContainerMissing(_) | AdapterError::Unavailable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(AdapterError::Auth("denied".into()).is_fatal());
        assert!(AdapterError::ContainerMissing("hotels".into()).is_fatal());
        assert!(AdapterError::Unavailable("refused".into()).is_fatal());
        assert!(!AdapterError::DuplicateKey("k".into()).is_fatal());
        assert!(!AdapterError::KeyNotFound("k".into()).is_fatal());
        assert!(!AdapterError::Backend("oops".into()).is_fatal());
    }
}
