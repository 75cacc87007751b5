//! API request and response models.
//!
//! These define the public wire contract and are kept separate from the
//! storage records so the two can evolve independently. All of them carry
//! `utoipa` annotations for the generated OpenAPI document.

pub mod auth;
pub mod clients;
pub mod users;
