//! Error types for the RBAC module.

use thiserror::Error;

/// Errors that can occur when using the RBAC API.
///
/// These represent infrastructure/transport failures only.
/// A denial is expressed via `authorized == false`, never as an error
/// variant, so callers cannot tell which decision stage rejected them.
#[derive(Debug, Error)]
pub enum RbacError {
    /// The identity or policy store is unreachable. Retryable.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RbacError {
    /// Whether the caller may retry the request.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable(_))
    }
}

/// Errors reported by a [`crate::TokenIntrospector`].
#[derive(Debug, Error)]
pub enum IntrospectionError {
    /// The token is malformed, expired, inactive or fails verification.
    #[error("token rejected: {0}")]
    Rejected(String),

    /// The introspection endpoint or key set could not be reached.
    #[error("introspection unavailable: {0}")]
    Unavailable(String),
}

/// Errors reported by a [`crate::DirectorySource`].
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to fetch directory: {0}")]
    Fetch(String),

    #[error("failed to decode directory: {0}")]
    Decode(String),

    #[error("inconsistent directory: {0}")]
    Inconsistent(String),
}
