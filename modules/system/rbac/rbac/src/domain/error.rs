//! Domain errors for the RBAC module.

use rbac_sdk::{IntrospectionError, RbacError};

/// Why a request did not produce an authorization.
///
/// Only [`DomainError::UpstreamUnavailable`] leaves the domain as an error;
/// every other variant collapses into the empty denial at the assembler.
#[derive(thiserror::Error, Debug)]
pub enum DomainError {
    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("unknown identity: {0}")]
    UnknownIdentity(String),

    #[error("policy denied: {0}")]
    PolicyDenied(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
}

impl DomainError {
    /// Whether the error is a decision rather than an infrastructure fault.
    #[must_use]
    pub fn is_denial(&self) -> bool {
        !matches!(self, Self::UpstreamUnavailable(_))
    }

    /// Decision stage that produced the error, for logging.
    #[must_use]
    pub fn stage(&self) -> &'static str {
        match self {
            Self::InvalidToken(_) => "validate",
            Self::UnknownIdentity(_) => "resolve",
            Self::PolicyDenied(_) => "match",
            Self::UpstreamUnavailable(_) => "upstream",
        }
    }
}

impl From<IntrospectionError> for DomainError {
    fn from(e: IntrospectionError) -> Self {
        match e {
            IntrospectionError::Rejected(msg) => Self::InvalidToken(msg),
            IntrospectionError::Unavailable(msg) => Self::UpstreamUnavailable(msg),
        }
    }
}

impl From<DomainError> for RbacError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::UpstreamUnavailable(msg) => Self::ServiceUnavailable(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}
