//! Server configuration: a YAML file overlaid with `RBAC__`-prefixed
//! environment variables (`RBAC__SERVER__BIND_ADDR=0.0.0.0:9000`).

use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use rbac::RbacConfig;
use serde::{Deserialize, Serialize};

pub const ENV_PREFIX: &str = "RBAC__";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub rbac: RbacConfig,
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8082))
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Upper bound on a single decision, including upstream lookups.
    #[serde(default = "default_request_timeout", with = "rbac::config::duration")]
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            request_timeout: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn default_level() -> String {
    "info".to_owned()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence when set.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

/// Load configuration from `path` (if any) and the environment.
///
/// # Errors
///
/// Fails if the file is missing, a value does not parse or the RBAC
/// section is invalid.
pub fn load(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let mut figment = Figment::new();
    if let Some(path) = path {
        if !path.is_file() {
            bail!("config file {} not found", path.display());
        }
        figment = figment.merge(Yaml::file(path));
    }
    extract(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
}

fn extract(figment: Figment) -> anyhow::Result<AppConfig> {
    let cfg: AppConfig = figment.extract().context("failed to load configuration")?;
    cfg.rbac.validate().context("invalid rbac configuration")?;
    Ok(cfg)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::io::Write;

    use super::*;

    const MINIMAL: &str = "
rbac:
  cache:
    source:
      type: file
      path: /etc/rbac/directory.yaml
";

    #[test]
    fn defaults_fill_server_and_logging() {
        let cfg = extract(Figment::from(Yaml::string(MINIMAL))).unwrap();

        assert_eq!(cfg.server.bind_addr, default_bind_addr());
        assert_eq!(cfg.server.request_timeout, Duration::from_secs(10));
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.logging.format, LogFormat::Text);
    }

    #[test]
    fn full_file_is_loaded() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(
            br#"
server:
  bind_addr: "127.0.0.1:9000"
  request_timeout: 2s
logging:
  level: debug
  format: json
rbac:
  token:
    dex_server_addr: "dex-server-http:5556"
  cache:
    sync_interval: 10s
    source:
      type: http
      url: http://user-manager/directory
  role_scopes_map:
    organizationOwner: [api.models.read, api.models.write]
"#,
        )
        .unwrap();

        let cfg = load(Some(file.path())).unwrap();

        assert_eq!(cfg.server.bind_addr.port(), 9000);
        assert_eq!(cfg.server.request_timeout, Duration::from_secs(2));
        assert_eq!(cfg.logging.format, LogFormat::Json);
        assert_eq!(cfg.rbac.role_scopes_map["organizationOwner"].len(), 2);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load(Some(Path::new("/nonexistent/rbac-server.yaml"))).is_err());
    }

    #[test]
    fn unknown_sections_are_rejected() {
        let yaml = format!("{MINIMAL}\nmetrics:\n  enabled: true\n");
        assert!(extract(Figment::from(Yaml::string(&yaml))).is_err());
    }

    #[test]
    fn invalid_rbac_section_is_rejected() {
        let yaml = "
rbac:
  token:
    dex_server_addr: dex:5556
    jwks:
      url: https://idp/keys
  cache:
    source:
      type: file
      path: /etc/rbac/directory.yaml
";
        let err = extract(Figment::from(Yaml::string(yaml))).unwrap_err();
        assert!(err.to_string().contains("invalid rbac configuration"));
        assert_eq!(
            err.downcast_ref::<rbac::ConfigError>(),
            Some(&rbac::ConfigError::ConflictingTokenBackends)
        );
    }
}
