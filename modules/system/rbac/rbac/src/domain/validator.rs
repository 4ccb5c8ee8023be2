//! Token validation.
//!
//! A token is classified by what it turns out to be, never by the endpoint
//! it was presented to. Classes are tried in order: cluster registration
//! key, API key secret, identity-provider token.

use std::sync::Arc;

use rbac_sdk::TokenIntrospector;
use secrecy::{ExposeSecret, SecretString};
use time::OffsetDateTime;

use super::directory::DirectoryIndex;
use super::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    User,
    Worker,
}

/// Scope an API key was minted for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyBinding {
    pub id: String,
    pub organization_id: String,
    pub project_id: String,
    pub role: String,
}

/// Outcome of a successful validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedToken {
    /// User id for user tokens, cluster id for worker tokens.
    pub subject: String,
    /// Issuing tenant. `None` only for identity-provider tokens that carry
    /// no tenant claim; the user's home tenant applies then.
    pub tenant_id: Option<String>,
    pub kind: TokenKind,
    pub expires_at: Option<OffsetDateTime>,
    pub api_key: Option<ApiKeyBinding>,
}

pub struct TokenValidator {
    introspector: Option<Arc<dyn TokenIntrospector>>,
}

impl TokenValidator {
    /// Without an introspector only directory-backed secrets are accepted.
    #[must_use]
    pub fn new(introspector: Option<Arc<dyn TokenIntrospector>>) -> Self {
        Self { introspector }
    }

    /// # Errors
    ///
    /// - [`DomainError::InvalidToken`] if the token is empty, unknown,
    ///   expired or fails verification
    /// - [`DomainError::UpstreamUnavailable`] if the introspection backend
    ///   cannot be reached
    pub async fn validate(
        &self,
        directory: &DirectoryIndex,
        token: &SecretString,
        now: OffsetDateTime,
    ) -> Result<ValidatedToken, DomainError> {
        if token.expose_secret().trim().is_empty() {
            return Err(DomainError::InvalidToken("empty token".to_owned()));
        }

        if let Some(cluster) = directory.cluster_by_registration_key(token) {
            return Ok(ValidatedToken {
                subject: cluster.id.clone(),
                tenant_id: Some(cluster.tenant_id.clone()),
                kind: TokenKind::Worker,
                expires_at: None,
                api_key: None,
            });
        }

        if let Some(key) = directory.api_key_by_secret(token) {
            check_expiry(key.expires_at, now)?;
            return Ok(ValidatedToken {
                subject: key.user_id.clone(),
                tenant_id: Some(key.tenant_id.clone()),
                kind: TokenKind::User,
                expires_at: key.expires_at,
                api_key: Some(ApiKeyBinding {
                    id: key.id.clone(),
                    organization_id: key.organization_id.clone(),
                    project_id: key.project_id.clone(),
                    role: key.role.clone(),
                }),
            });
        }

        let Some(introspector) = &self.introspector else {
            return Err(DomainError::InvalidToken("unrecognised token".to_owned()));
        };
        let claims = introspector.introspect(token).await?;
        check_expiry(claims.expires_at, now)?;
        if claims.subject.is_empty() {
            return Err(DomainError::InvalidToken("token has no subject".to_owned()));
        }

        Ok(ValidatedToken {
            subject: claims.subject,
            tenant_id: claims.tenant_id,
            kind: TokenKind::User,
            expires_at: claims.expires_at,
            api_key: None,
        })
    }
}

fn check_expiry(expires_at: Option<OffsetDateTime>, now: OffsetDateTime) -> Result<(), DomainError> {
    match expires_at {
        Some(at) if at <= now => Err(DomainError::InvalidToken("token expired".to_owned())),
        _ => Ok(()),
    }
}
