//! OAuth client models for the admin API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::store::ClientRecord;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ClientCreateRequest {
    pub id: String,
    /// Empty for public clients; confidential clients must present it at
    /// the token endpoint.
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub domain: String,
}

/// Client as returned by the admin API. The secret is never echoed back.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClientResponse {
    pub id: String,
    pub domain: String,
    pub confidential: bool,
    pub created_at: DateTime<Utc>,
}

impl From<ClientRecord> for ClientResponse {
    fn from(record: ClientRecord) -> Self {
        Self {
            id: record.id,
            domain: record.domain,
            confidential: !record.secret.is_empty(),
            created_at: record.created_at,
        }
    }
}
