//! # optio_core
//!
//! Core domain logic for Optio: credentials, access and refresh tokens,
//! and invite-code session rooms.

pub mod auth;
pub mod migrate;
pub mod models;
pub mod sessions;
pub mod store;
pub mod uuid;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
