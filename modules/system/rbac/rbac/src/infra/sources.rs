//! Directory sources.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rbac_sdk::{Directory, DirectorySource, SourceError};

/// Reads the directory from a local document.
///
/// Files ending in `.json` are parsed as JSON, everything else as YAML.
#[derive(Debug, Clone)]
pub struct FileDirectorySource {
    path: PathBuf,
}

impl FileDirectorySource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DirectorySource for FileDirectorySource {
    async fn fetch(&self) -> Result<Directory, SourceError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| SourceError::Fetch(format!("{}: {e}", self.path.display())))?;
        parse_document(&self.path, &raw)
    }
}

fn parse_document(path: &Path, raw: &str) -> Result<Directory, SourceError> {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(raw).map_err(|e| SourceError::Decode(e.to_string()))
    } else {
        serde_saphyr::from_str(raw).map_err(|e| SourceError::Decode(e.to_string()))
    }
}

/// Fetches the directory as JSON from an export endpoint.
#[derive(Debug, Clone)]
pub struct HttpDirectorySource {
    http: reqwest::Client,
    url: String,
}

impl HttpDirectorySource {
    #[must_use]
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl DirectorySource for HttpDirectorySource {
    async fn fetch(&self) -> Result<Directory, SourceError> {
        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| SourceError::Fetch(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(SourceError::Fetch(format!(
                "{} returned {}",
                self.url,
                resp.status()
            )));
        }
        resp.json::<Directory>()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::io::Write;

    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    const YAML: &str = r"
users:
  - id: u1
    tenantId: t1
organizations:
  - id: o1
    title: Org One
    tenantId: t1
organizationUsers:
  - userId: u1
    organizationId: o1
    role: owner
clusters:
  - id: c1
    name: east
    tenantId: t1
    registrationKey: reg-c1
";

    #[tokio::test]
    async fn yaml_file_is_parsed() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(YAML.as_bytes()).unwrap();

        let dir = FileDirectorySource::new(file.path()).fetch().await.unwrap();

        assert_eq!(dir.users.len(), 1);
        assert_eq!(dir.organization_users[0].role, rbac_sdk::OrganizationRole::Owner);
        assert_eq!(dir.clusters[0].name.as_deref(), Some("east"));
    }

    #[tokio::test]
    async fn json_file_is_parsed_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(br#"{"users":[{"id":"u1","tenantId":"t1"}]}"#)
            .unwrap();

        let dir = FileDirectorySource::new(file.path()).fetch().await.unwrap();
        assert_eq!(dir.users[0].id, "u1");
    }

    #[tokio::test]
    async fn missing_file_is_a_fetch_error() {
        let err = FileDirectorySource::new("/nonexistent/directory.yaml")
            .fetch()
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Fetch(_)));
    }

    #[tokio::test]
    async fn malformed_yaml_is_a_decode_error() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(b"users: [ { id: u1 ").unwrap();

        let err = FileDirectorySource::new(file.path()).fetch().await.unwrap_err();
        assert!(matches!(err, SourceError::Decode(_)));
    }

    #[tokio::test]
    async fn http_source_reads_json_export() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/directory");
                then.status(200).json_body(json!({
                    "users": [{ "id": "u1", "tenantId": "t1" }],
                }));
            })
            .await;

        let source = HttpDirectorySource::new(reqwest::Client::new(), server.url("/directory"));
        let dir = source.fetch().await.unwrap();

        assert_eq!(dir.users[0].id, "u1");
    }

    #[tokio::test]
    async fn http_error_status_is_a_fetch_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/directory");
                then.status(500);
            })
            .await;

        let source = HttpDirectorySource::new(reqwest::Client::new(), server.url("/directory"));
        assert!(matches!(
            source.fetch().await.unwrap_err(),
            SourceError::Fetch(_)
        ));
    }
}
