//! RBAC Module
//!
//! Renders authorize/deny decisions for bearer tokens. A request flows
//! through the token validator, the identity resolver, the capability
//! matcher (user path only) and the decision assembler; the first failing
//! stage short-circuits to a denial that carries no identity.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod api;
pub mod config;
pub mod domain;
pub mod infra;
pub mod module;

pub use config::{ConfigError, RbacConfig};
pub use module::RbacModule;
