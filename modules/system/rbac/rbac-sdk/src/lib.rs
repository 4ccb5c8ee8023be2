#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! RBAC SDK
//!
//! This crate provides the public contract of the `rbac` module:
//!
//! - [`RbacClient`] - Public API trait for consumers
//! - [`AuthorizeRequest`], [`AuthorizeResponse`] - User-path decision models
//! - [`AuthorizeWorkerRequest`], [`AuthorizeWorkerResponse`] - Worker-path decision models
//! - [`Directory`] - Identity directory snapshot consumed by the decision core
//! - [`TokenIntrospector`], [`DirectorySource`], [`PolicyStore`],
//!   [`RateLimitExemption`] - Collaborator traits
//! - [`RbacError`] - Infrastructure error type
//! - [`HttpRbacClient`] - Client for the HTTP/JSON wire surface
//! - [`pep`] - Helpers for callers enforcing decisions on their own requests
//!
//! ## Usage
//!
//! ```ignore
//! use rbac_sdk::{AuthorizeRequest, HttpRbacClient, RbacClient};
//!
//! let client = HttpRbacClient::new("http://rbac-server:8082")?;
//! let decision = client
//!     .authorize(AuthorizeRequest::new(token, "api.models", "read"))
//!     .await?;
//! if !decision.authorized {
//!     return Err(PermissionDenied);
//! }
//! ```

pub mod api;
pub mod client;
pub mod directory;
pub mod error;
pub mod models;
pub mod pep;
pub mod plugin_api;

// Re-export main types at crate root
pub use api::RbacClient;
pub use client::HttpRbacClient;
pub use directory::{
    ApiKeyRecord, ClusterRecord, Directory, OrganizationMembership, OrganizationRecord,
    OrganizationRole, ProjectMembership, ProjectRecord, ProjectRole, UserRecord,
};
pub use error::{IntrospectionError, RbacError, SourceError};
pub use models::{
    AssignedKubernetesEnv, AuthorizeRequest, AuthorizeResponse, AuthorizeWorkerRequest,
    AuthorizeWorkerResponse, Cluster, Organization, Project, User, paths,
};
pub use plugin_api::{
    DirectorySource, Introspection, PolicySnapshot, PolicyStore, RateLimitExemption,
    RateLimitSubject, TokenIntrospector,
};
