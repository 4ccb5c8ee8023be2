//! Configuration for the RBAC module.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use thiserror::Error;

fn default_delegated_resource_prefixes() -> Vec<String> {
    vec!["api.organizations".to_owned()]
}

/// Configuration the module refuses to start with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("token: jwks and dex_server_addr are mutually exclusive")]
    ConflictingTokenBackends,

    #[error("token: dex_server_addr must not be empty")]
    EmptyDexAddr,

    #[error("token: jwks.{field} {reason}")]
    Jwks {
        field: &'static str,
        reason: &'static str,
    },

    #[error("cache: sync_interval must be greater than 0")]
    ZeroSyncInterval,

    #[error("cache: source.{0} must be set")]
    MissingSource(&'static str),

    #[error("role_scopes_map: role name must not be empty")]
    EmptyRole,

    #[error("role_scopes_map: role {role} has an empty scope")]
    EmptyScope { role: String },

    #[error("delegated_resource_prefixes: prefix must not be empty")]
    EmptyPrefix,
}

/// RBAC module configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RbacConfig {
    /// Identity-provider token verification.
    #[serde(default)]
    pub token: TokenConfig,

    /// Identity directory cache.
    pub cache: CacheConfig,

    /// Maps a role name to the scopes (`<resource>.<capability>`) it grants.
    #[serde(default)]
    pub role_scopes_map: HashMap<String, Vec<String>>,

    /// Resources that are tenant-scoped: no organization/project resolution
    /// is performed and any resolved user of the tenant is granted.
    #[serde(default = "default_delegated_resource_prefixes")]
    pub delegated_resource_prefixes: Vec<String>,

    /// Callers exempt from rate limiting once authorized.
    #[serde(default)]
    pub rate_limit_exemptions: RateLimitExemptionsConfig,
}

impl RbacConfig {
    /// Reject configurations the module cannot start with.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.token.validate()?;
        self.cache.validate()?;
        for (role, scopes) in &self.role_scopes_map {
            if role.is_empty() {
                return Err(ConfigError::EmptyRole);
            }
            if scopes.iter().any(String::is_empty) {
                return Err(ConfigError::EmptyScope { role: role.clone() });
            }
        }
        if self.delegated_resource_prefixes.iter().any(String::is_empty) {
            return Err(ConfigError::EmptyPrefix);
        }
        Ok(())
    }
}

/// How identity-provider tokens are verified. At most one backend may be set;
/// with neither, only API keys and cluster registration keys are accepted.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TokenConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks: Option<JwksConfig>,

    /// Address (`host:port`) of a Dex server used for token introspection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dex_server_addr: Option<String>,
}

impl TokenConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        match (&self.jwks, &self.dex_server_addr) {
            (Some(_), Some(_)) => Err(ConfigError::ConflictingTokenBackends),
            (Some(jwks), None) => jwks.validate(),
            (None, Some(addr)) if addr.is_empty() => Err(ConfigError::EmptyDexAddr),
            _ => Ok(()),
        }
    }
}

fn default_jwks_refresh_interval() -> Duration {
    Duration::from_secs(3600)
}

fn default_allowed_algorithms() -> Vec<Algorithm> {
    vec![Algorithm::RS256]
}

fn default_leeway() -> Duration {
    Duration::from_secs(60)
}

/// JWT verification against a JWKS document.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct JwksConfig {
    pub url: String,

    #[serde(with = "duration", default = "default_jwks_refresh_interval")]
    pub refresh_interval: Duration,

    /// Accepted `alg` header values. Anything else is rejected before
    /// signature verification.
    #[serde(default = "default_allowed_algorithms")]
    pub allowed_algorithms: Vec<Algorithm>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,

    /// Clock skew tolerated on `exp`/`nbf`.
    #[serde(with = "duration", default = "default_leeway")]
    pub leeway: Duration,
}

impl JwksConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason| Err(ConfigError::Jwks { field, reason });
        if self.url.is_empty() {
            return invalid("url", "must be set");
        }
        if self.refresh_interval.is_zero() {
            return invalid("refresh_interval", "must be greater than 0");
        }
        if self.allowed_algorithms.is_empty() {
            return invalid("allowed_algorithms", "must not be empty");
        }
        Ok(())
    }
}

fn default_sync_interval() -> Duration {
    Duration::from_secs(30)
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(with = "duration", default = "default_sync_interval")]
    pub sync_interval: Duration,

    pub source: DirectorySourceConfig,
}

impl CacheConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.sync_interval.is_zero() {
            return Err(ConfigError::ZeroSyncInterval);
        }
        match &self.source {
            DirectorySourceConfig::File { path } if path.as_os_str().is_empty() => {
                Err(ConfigError::MissingSource("path"))
            }
            DirectorySourceConfig::Http { url } if url.is_empty() => {
                Err(ConfigError::MissingSource("url"))
            }
            _ => Ok(()),
        }
    }
}

/// Where directory snapshots are read from.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum DirectorySourceConfig {
    /// YAML (or `.json`) document on the local filesystem, re-read on every sync.
    File { path: PathBuf },
    /// JSON document served by the identity store's export endpoint.
    Http { url: String },
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct RateLimitExemptionsConfig {
    pub user_ids: Vec<String>,
    pub api_key_ids: Vec<String>,
    /// Scopes (`<resource>.<capability>`) that are never rate limited.
    pub scopes: Vec<String>,
}

/// Serde adapter for humantime durations (`30s`, `1h 30m`).
pub mod duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    /// # Errors
    ///
    /// Propagates the serializer's error.
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    /// # Errors
    ///
    /// Fails when the value is not a valid humantime duration.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
