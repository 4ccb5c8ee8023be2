//! Helpers for services that enforce RBAC decisions on their own requests.
//!
//! A PEP extracts the bearer token and the optional organization/project
//! scope from incoming headers, derives the capability from the request
//! method, and asks the RBAC service for a decision.

use http::{HeaderMap, Method, header};

use crate::models::AuthorizeRequest;

/// Header carrying the organization scope.
pub const ORGANIZATION_HEADER: &str = "openai-organization";
/// Header carrying the project scope.
pub const PROJECT_HEADER: &str = "openai-project";

pub const CAPABILITY_READ: &str = "read";
pub const CAPABILITY_WRITE: &str = "write";

/// `read` for safe methods, `write` for everything else.
#[must_use]
pub fn capability_for_method(method: &Method) -> &'static str {
    if method == Method::GET || method == Method::HEAD {
        CAPABILITY_READ
    } else {
        CAPABILITY_WRITE
    }
}

/// Extract the bearer token from the `Authorization` header.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToOwned::to_owned)
}

/// Build the authorization request for an incoming HTTP request.
///
/// Returns `None` when no bearer token is present.
#[must_use]
pub fn access_request(
    method: &Method,
    headers: &HeaderMap,
    access_resource: &str,
) -> Option<AuthorizeRequest> {
    let token = bearer_token(headers)?;
    let mut req = AuthorizeRequest::new(token, access_resource, capability_for_method(method));
    req.organization_id = header_value(headers, ORGANIZATION_HEADER);
    req.project_id = header_value(headers, PROJECT_HEADER);
    Some(req)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn capability_follows_method() {
        assert_eq!(capability_for_method(&Method::GET), "read");
        assert_eq!(capability_for_method(&Method::HEAD), "read");
        assert_eq!(capability_for_method(&Method::POST), "write");
        assert_eq!(capability_for_method(&Method::DELETE), "write");
    }

    #[test]
    fn access_request_reads_scope_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer tok"));
        headers.insert(ORGANIZATION_HEADER, HeaderValue::from_static("o1"));
        headers.insert(PROJECT_HEADER, HeaderValue::from_static("p1"));

        let req = access_request(&Method::POST, &headers, "api.chat.completions").unwrap();

        assert_eq!(req.token.as_deref(), Some("tok"));
        assert_eq!(req.capability.as_deref(), Some("write"));
        assert_eq!(req.organization_id.as_deref(), Some("o1"));
        assert_eq!(req.project_id.as_deref(), Some("p1"));
    }

    #[test]
    fn missing_or_blank_token_yields_no_request() {
        let mut headers = HeaderMap::new();
        assert!(access_request(&Method::GET, &headers, "api.models").is_none());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert!(access_request(&Method::GET, &headers, "api.models").is_none());
    }
}
