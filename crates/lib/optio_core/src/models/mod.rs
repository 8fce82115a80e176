//! Domain models shared by the services and storage implementations.

pub mod auth;
pub mod session;
