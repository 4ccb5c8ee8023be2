//! Infrastructure adapters: directory cache and sources, token
//! introspection backends, configured policy, metrics.

pub mod dex;
pub mod directory_cache;
pub mod jwks;
pub mod metrics;
pub mod policy;
pub mod sources;

pub use dex::DexIntrospector;
pub use directory_cache::{DirectoryCache, DirectorySync};
pub use jwks::JwksValidator;
pub use metrics::SyncMetrics;
pub use policy::{ConfiguredExemptions, StaticPolicyStore};
pub use sources::{FileDirectorySource, HttpDirectorySource};
