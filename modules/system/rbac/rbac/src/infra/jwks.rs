//! JWT verification against a JWKS document.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use rbac_sdk::{Introspection, IntrospectionError, TokenIntrospector};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use time::OffsetDateTime;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::JwksConfig;

/// Claims read from a verified token.
#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    uid: Option<String>,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    tenant_id: Option<String>,
    #[serde(default)]
    exp: Option<i64>,
}

struct VerificationKey {
    kid: Option<String>,
    key: DecodingKey,
}

/// Verifies JWTs with keys published at a JWKS URL.
///
/// Keys are swapped in whole on every refresh. A token is accepted only if
/// its `alg` is allowlisted, its signature verifies under a key with a
/// matching `kid` (or any key when either side has no `kid`) and `exp` lies
/// in the future.
pub struct JwksValidator {
    http: reqwest::Client,
    url: String,
    allowed_algorithms: Vec<Algorithm>,
    issuer: Option<String>,
    audience: Option<String>,
    leeway: Duration,
    keys: ArcSwap<Vec<VerificationKey>>,
}

impl JwksValidator {
    /// Validator with no keys loaded; call [`JwksValidator::refresh`] before use.
    #[must_use]
    pub fn new(http: reqwest::Client, cfg: &JwksConfig) -> Self {
        Self {
            http,
            url: cfg.url.clone(),
            allowed_algorithms: cfg.allowed_algorithms.clone(),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            leeway: cfg.leeway,
            keys: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Replace the key set with `keys`, given as `(kid, key)` pairs.
    pub fn set_keys(&self, keys: Vec<(Option<String>, DecodingKey)>) {
        let keys = keys
            .into_iter()
            .map(|(kid, key)| VerificationKey { kid, key })
            .collect();
        self.keys.store(Arc::new(keys));
    }

    /// Fetch the JWKS document and swap in its keys.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the document cannot be fetched or holds no
    /// usable key. The previous key set stays in place.
    pub async fn refresh(&self) -> Result<usize, IntrospectionError> {
        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| IntrospectionError::Unavailable(format!("jwks fetch failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(IntrospectionError::Unavailable(format!(
                "jwks endpoint returned {}",
                resp.status()
            )));
        }
        let set: JwkSet = resp
            .json()
            .await
            .map_err(|e| IntrospectionError::Unavailable(format!("invalid jwks document: {e}")))?;

        let mut keys = Vec::with_capacity(set.keys.len());
        for jwk in &set.keys {
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => keys.push((jwk.common.key_id.clone(), key)),
                Err(e) => warn!(kid = jwk.common.key_id.as_deref(), error = %e, "skipping unusable jwk"),
            }
        }
        if keys.is_empty() {
            return Err(IntrospectionError::Unavailable(
                "jwks document holds no usable key".to_owned(),
            ));
        }

        let count = keys.len();
        self.set_keys(keys);
        debug!(keys = count, "jwks refreshed");
        Ok(count)
    }

    /// Refresh every `interval` until `cancel` fires.
    pub async fn run_refresh(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("jwks refresh stopped");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh().await {
                        warn!(error = %e, "jwks refresh failed; keeping previous keys");
                    }
                }
            }
        }
    }

    fn validation(&self, alg: Algorithm) -> Validation {
        let mut validation = Validation::new(alg);
        validation.leeway = self.leeway.as_secs();
        validation.set_required_spec_claims(&["exp"]);
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        validation
    }
}

#[async_trait]
impl TokenIntrospector for JwksValidator {
    async fn introspect(&self, token: &SecretString) -> Result<Introspection, IntrospectionError> {
        let raw = token.expose_secret();
        let header = decode_header(raw)
            .map_err(|e| IntrospectionError::Rejected(format!("malformed token: {e}")))?;
        if !self.allowed_algorithms.contains(&header.alg) {
            return Err(IntrospectionError::Rejected(
                "token algorithm is not allowed".to_owned(),
            ));
        }

        let keys = self.keys.load();
        if keys.is_empty() {
            return Err(IntrospectionError::Unavailable(
                "no verification keys loaded".to_owned(),
            ));
        }

        let validation = self.validation(header.alg);
        let mut last_error = None;
        let candidates = keys.iter().filter(|k| match (&header.kid, &k.kid) {
            (Some(wanted), Some(kid)) => wanted == kid,
            _ => true,
        });
        for candidate in candidates {
            match decode::<Claims>(raw, &candidate.key, &validation) {
                Ok(data) => return into_introspection(data.claims),
                Err(e) => last_error = Some(e),
            }
        }

        Err(IntrospectionError::Rejected(last_error.map_or_else(
            || "no key matches the token kid".to_owned(),
            |e| e.to_string(),
        )))
    }
}

fn into_introspection(claims: Claims) -> Result<Introspection, IntrospectionError> {
    let subject = claims
        .uid
        .filter(|s| !s.is_empty())
        .or(claims.sub)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| IntrospectionError::Rejected("token has no subject".to_owned()))?;
    Ok(Introspection {
        subject,
        tenant_id: claims.tenant_id.filter(|t| !t.is_empty()),
        expires_at: claims
            .exp
            .and_then(|exp| OffsetDateTime::from_unix_timestamp(exp).ok()),
    })
}
