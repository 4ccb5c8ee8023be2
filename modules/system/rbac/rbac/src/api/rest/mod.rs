//! HTTP transport for the RBAC decision service.

pub mod error;
pub mod handlers;
pub mod routes;

pub use error::Problem;
pub use routes::router;
