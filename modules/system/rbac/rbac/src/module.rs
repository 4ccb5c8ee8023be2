use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rbac_sdk::{DirectorySource, RbacClient, TokenIntrospector};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{DirectorySourceConfig, RbacConfig, TokenConfig};
use crate::domain::matcher::CapabilityMatcher;
use crate::domain::resolver::IdentityResolver;
use crate::domain::validator::TokenValidator;
use crate::domain::{RbacLocalClient, Service};
use crate::infra::{
    ConfiguredExemptions, DexIntrospector, DirectoryCache, DirectorySync, FileDirectorySource,
    HttpDirectorySource, JwksValidator, StaticPolicyStore, SyncMetrics,
};

/// Timeout for outbound calls to the IdP, JWKS endpoint and directory export.
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

/// Wired RBAC module: decision service plus its background refreshers.
pub struct RbacModule {
    service: Arc<Service>,
    metrics: Arc<SyncMetrics>,
    sync: Option<DirectorySync>,
    jwks: Option<(Arc<JwksValidator>, Duration)>,
}

impl RbacModule {
    /// Build the module from configuration.
    ///
    /// The first directory sync and, when configured, the first JWKS fetch
    /// must succeed; the module refuses to start without them.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or an initial load
    /// from an upstream fails.
    pub async fn init(cfg: &RbacConfig) -> anyhow::Result<Self> {
        info!("Initializing rbac module");
        cfg.validate().context("invalid rbac config")?;

        let http = reqwest::Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .build()
            .context("failed to build http client")?;

        let (introspector, jwks) = build_introspector(&http, &cfg.token).await?;

        let source: Arc<dyn DirectorySource> = match &cfg.cache.source {
            DirectorySourceConfig::File { path } => Arc::new(FileDirectorySource::new(path.clone())),
            DirectorySourceConfig::Http { url } => {
                Arc::new(HttpDirectorySource::new(http.clone(), url.clone()))
            }
        };
        let cache = Arc::new(DirectoryCache::new());
        let sync = DirectorySync::new(Arc::clone(&cache), source, cfg.cache.sync_interval);
        let counts = sync
            .sync_once()
            .await
            .context("initial directory sync failed")?;
        info!(
            users = counts.users,
            organizations = counts.organizations,
            projects = counts.projects,
            clusters = counts.clusters,
            api_keys = counts.api_keys,
            "directory loaded"
        );

        let metrics = Arc::new(
            SyncMetrics::new(cache.clone()).context("failed to register metrics")?,
        );

        let policy = Arc::new(StaticPolicyStore::from_role_scopes(&cfg.role_scopes_map));
        let exemptions = Arc::new(ConfiguredExemptions::new(&cfg.rate_limit_exemptions));
        let service = Arc::new(Service::new(
            cache,
            policy,
            TokenValidator::new(introspector),
            IdentityResolver::new(cfg.delegated_resource_prefixes.clone()),
            CapabilityMatcher::new(exemptions),
        ));

        info!("rbac module initialized");
        Ok(Self {
            service,
            metrics,
            sync: Some(sync),
            jwks,
        })
    }

    #[must_use]
    pub fn service(&self) -> Arc<Service> {
        Arc::clone(&self.service)
    }

    /// In-process client for other modules.
    #[must_use]
    pub fn client(&self) -> Arc<dyn RbacClient> {
        Arc::new(RbacLocalClient::new(self.service()))
    }

    #[must_use]
    pub fn router(&self, request_timeout: Duration) -> axum::Router {
        crate::api::rest::router(self.service(), Arc::clone(&self.metrics), request_timeout)
    }

    /// Start directory resync and JWKS refresh loops. Calling this a second
    /// time starts nothing.
    pub fn spawn_background(&mut self, cancel: &CancellationToken) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        if let Some(sync) = self.sync.take() {
            handles.push(tokio::spawn(sync.run(cancel.clone())));
        }
        if let Some((validator, interval)) = self.jwks.take() {
            handles.push(tokio::spawn(validator.run_refresh(interval, cancel.clone())));
        }
        handles
    }
}

type Introspector = (
    Option<Arc<dyn TokenIntrospector>>,
    Option<(Arc<JwksValidator>, Duration)>,
);

async fn build_introspector(http: &reqwest::Client, cfg: &TokenConfig) -> anyhow::Result<Introspector> {
    if let Some(jwks_cfg) = &cfg.jwks {
        let validator = Arc::new(JwksValidator::new(http.clone(), jwks_cfg));
        let keys = validator
            .refresh()
            .await
            .with_context(|| format!("initial jwks fetch from {} failed", jwks_cfg.url))?;
        info!(keys, url = %jwks_cfg.url, "jwks loaded");

        let introspector: Arc<dyn TokenIntrospector> = validator.clone();
        return Ok((
            Some(introspector),
            Some((validator, jwks_cfg.refresh_interval)),
        ));
    }

    if let Some(addr) = &cfg.dex_server_addr {
        info!(addr = %addr, "using dex token introspection");
        let introspector: Arc<dyn TokenIntrospector> =
            Arc::new(DexIntrospector::new(http.clone(), addr));
        return Ok((Some(introspector), None));
    }

    warn!("no token introspection backend configured; only API keys and cluster registration keys are accepted");
    Ok((None, None))
}
