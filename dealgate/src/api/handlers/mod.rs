//! Axum route handlers, organized by resource.
//!
//! - [`auth`]: registration, the OAuth2 token endpoint, session revocation
//! - [`clients`]: admin-only OAuth client management
//! - [`health`]: liveness probe
//!
//! Handlers return [`crate::errors::Error`], which converts to the right
//! HTTP status code and a JSON error body.

pub mod auth;
pub mod clients;
pub mod health;
