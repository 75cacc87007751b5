//! Request/response bodies for registration and the token endpoint.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::store::TokenRecord;

/// Body of `POST /api/v1/users`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    /// Client the new account intends to sign in with; must be registered.
    pub client_id: String,
}

/// Form body of `POST /api/v1/oauth/token`.
///
/// All fields are optional at the wire level; which are required depends on
/// `grant_type`, and the handler reports what is missing.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TokenRequest {
    pub grant_type: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
}

/// Token pair in standard OAuth2 shape.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub refresh_token: String,
}

impl TokenResponse {
    pub fn from_record(record: &TokenRecord, access_ttl: chrono::Duration) -> Self {
        Self {
            access_token: record.access_token.clone(),
            token_type: "Bearer".to_string(),
            expires_in: access_ttl.num_seconds(),
            refresh_token: record.refresh_token.clone(),
        }
    }
}
