//! Admin-only OAuth client management.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;

use crate::{
    AppState,
    api::models::clients::{ClientCreateRequest, ClientResponse},
    errors::{Error, Result},
    store::{ClientRecord, StoreError},
};

/// List registered OAuth clients
#[utoipa::path(
    get,
    path = "/admin/clients",
    tag = "clients",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Registered clients", body = Vec<ClientResponse>),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not an admin"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_clients(State(state): State<AppState>) -> Result<Json<Vec<ClientResponse>>> {
    let clients = state.clients.list_all().await?;
    Ok(Json(clients.into_iter().map(ClientResponse::from).collect()))
}

/// Register a new OAuth client
#[utoipa::path(
    post,
    path = "/admin/clients",
    request_body = ClientCreateRequest,
    tag = "clients",
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Client registered", body = ClientResponse),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Client ID already registered"),
    )
)]
#[tracing::instrument(skip_all, fields(client_id = %request.id))]
pub async fn create_client(State(state): State<AppState>, Json(request): Json<ClientCreateRequest>) -> Result<(StatusCode, Json<ClientResponse>)> {
    if request.id.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "client id must not be empty".to_string(),
        });
    }

    let record = ClientRecord {
        id: request.id,
        secret: request.secret,
        domain: request.domain,
        created_at: Utc::now(),
    };
    state.clients.create_client(&record).await.map_err(|e| match e {
        StoreError::UniqueViolation { .. } => Error::Conflict {
            message: format!("client '{}' is already registered", record.id),
        },
        other => other.into(),
    })?;

    Ok((StatusCode::CREATED, Json(record.into())))
}

/// Revoke an OAuth client
///
/// Tokens already issued through the client stay valid until they expire;
/// revocation blocks new sign-ins and refresh rotations.
#[utoipa::path(
    delete,
    path = "/admin/clients/{id}",
    tag = "clients",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Client ID")),
    responses(
        (status = 204, description = "Client revoked"),
        (status = 404, description = "Client not found"),
    )
)]
#[tracing::instrument(skip_all, fields(client_id = %id))]
pub async fn delete_client(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode> {
    if !state.clients.delete_by_id(&id).await? {
        return Err(Error::NotFound {
            resource: "client".to_string(),
            id,
        });
    }
    Ok(StatusCode::NO_CONTENT)
}
