//! HTTP surface for the Strata object substrate.
//!
//! Exposes streaming batched upload, streaming subtree and id-list
//! download, and present/missing diff over axum, with a pluggable
//! per-stream permission seam.

pub mod auth;
pub mod config;
pub mod error;
pub mod gzip;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use auth::{AllowAll, DenyAll, Permit, StreamPermissions};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use router::build_router;
pub use server::StrataServer;
pub use state::AppState;
