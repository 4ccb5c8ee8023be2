//! Domain layer for the RBAC module.

pub mod directory;
pub mod error;
pub mod local_client;
pub mod matcher;
pub mod resolver;
pub mod service;
pub mod validator;

#[cfg(test)]
mod service_test;
#[cfg(test)]
pub(crate) mod test_support;

pub use directory::{DirectoryIndex, DirectoryProvider};
pub use error::DomainError;
pub use local_client::RbacLocalClient;
pub use service::Service;
