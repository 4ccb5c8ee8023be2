//! Token introspection against a Dex server.

use async_trait::async_trait;
use rbac_sdk::{Introspection, IntrospectionError, TokenIntrospector};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct IntrospectionResponse {
    #[serde(default)]
    active: bool,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    ext: Extra,
}

#[derive(Debug, Default, Deserialize)]
struct Extra {
    #[serde(default)]
    email: Option<String>,
}

/// Introspects opaque tokens via `POST /v1/dex/token/introspect`.
#[derive(Debug, Clone)]
pub struct DexIntrospector {
    http: reqwest::Client,
    endpoint: String,
}

impl DexIntrospector {
    /// `server_addr` is `host:port`; the endpoint is always plain HTTP.
    #[must_use]
    pub fn new(http: reqwest::Client, server_addr: &str) -> Self {
        Self {
            http,
            endpoint: format!("http://{server_addr}/v1/dex/token/introspect"),
        }
    }
}

/// User ids derived from email are compared trimmed and lowercased.
fn normalize_user_id(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl TokenIntrospector for DexIntrospector {
    async fn introspect(&self, token: &SecretString) -> Result<Introspection, IntrospectionError> {
        let resp = self
            .http
            .post(&self.endpoint)
            .form(&[("token", token.expose_secret())])
            .send()
            .await
            .map_err(|e| IntrospectionError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if status.is_server_error() {
            return Err(IntrospectionError::Unavailable(format!(
                "introspection endpoint returned {status}"
            )));
        }
        if status != StatusCode::OK {
            return Err(IntrospectionError::Rejected(format!(
                "introspection endpoint returned {status}"
            )));
        }

        let body: IntrospectionResponse = resp
            .json()
            .await
            .map_err(|e| IntrospectionError::Unavailable(format!("invalid introspection response: {e}")))?;
        if !body.active {
            return Err(IntrospectionError::Rejected("token is not active".to_owned()));
        }

        let subject = body
            .ext
            .email
            .as_deref()
            .map(normalize_user_id)
            .filter(|s| !s.is_empty())
            .or(body.sub)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| IntrospectionError::Rejected("token has no subject".to_owned()))?;

        Ok(Introspection {
            subject,
            tenant_id: None,
            expires_at: None,
        })
    }
}
