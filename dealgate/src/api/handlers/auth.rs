use axum::{
    Form, Json,
    extract::State,
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::{
        auth::{RegisterRequest, TokenRequest, TokenResponse},
        users::{CurrentUser, UserResponse},
    },
    auth::AccessToken,
    errors::{Error, Result},
};

fn require_field<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(Error::BadRequest {
            message: format!("missing required field: {name}"),
        }),
    }
}

/// Register a new user account
#[utoipa::path(
    post,
    path = "/users",
    request_body = RegisterRequest,
    tag = "authentication",
    responses(
        (status = 201, description = "User registered", body = UserResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unknown client"),
        (status = 409, description = "Username already taken"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn register(State(state): State<AppState>, Json(request): Json<RegisterRequest>) -> Result<(StatusCode, Json<UserResponse>)> {
    if request.username.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "username must not be empty".to_string(),
        });
    }
    let min_length = state.config.auth.password_min_length;
    if request.password.len() < min_length {
        return Err(Error::BadRequest {
            message: format!("password must be at least {min_length} characters"),
        });
    }

    // Registration is only open to known clients
    if state.clients.get_by_id(&request.client_id).await?.is_none() {
        return Err(Error::UnknownClient { id: request.client_id });
    }

    let user = state.auth.register(&request.username, &request.password).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// OAuth2 token endpoint supporting the password and refresh_token grants
#[utoipa::path(
    post,
    path = "/oauth/token",
    tag = "authentication",
    responses(
        (status = 200, description = "Token pair issued", body = TokenResponse),
        (status = 400, description = "Unsupported grant type or missing fields"),
        (status = 401, description = "Invalid credentials or refresh token"),
    )
)]
#[tracing::instrument(skip_all, fields(grant_type = %request.grant_type))]
pub async fn token(State(state): State<AppState>, Form(request): Form<TokenRequest>) -> Result<Json<TokenResponse>> {
    let record = match request.grant_type.as_str() {
        "password" => {
            let username = require_field(&request.username, "username")?;
            let password = require_field(&request.password, "password")?;
            let client_id = require_field(&request.client_id, "client_id")?;

            let client = state
                .clients
                .get_by_id(client_id)
                .await?
                .ok_or_else(|| Error::UnknownClient {
                    id: client_id.to_string(),
                })?;
            // Confidential clients must present their secret
            if !client.secret.is_empty() && request.client_secret.as_deref() != Some(client.secret.as_str()) {
                return Err(Error::Unauthenticated {
                    message: Some("invalid client credentials".to_string()),
                });
            }

            let user = state.auth.login(username, password).await?;
            state.tokens.issue(user.id, client_id).await?
        }
        "refresh_token" => {
            let refresh_token = require_field(&request.refresh_token, "refresh_token")?;
            state.tokens.refresh(refresh_token).await?
        }
        other => {
            return Err(Error::BadRequest {
                message: format!("unsupported grant type: {other}"),
            });
        }
    };

    Ok(Json(TokenResponse::from_record(&record, state.tokens.access_ttl())))
}

/// Revoke the access token presented on this request
#[utoipa::path(
    delete,
    path = "/oauth/sessions",
    tag = "authentication",
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Session revoked"),
        (status = 401, description = "Not authenticated"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, AccessToken(token): AccessToken) -> Result<StatusCode> {
    state.tokens.revoke(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Return the authenticated user's profile
#[utoipa::path(
    get,
    path = "/users/me",
    tag = "users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Current user", body = CurrentUser),
        (status = 401, description = "Not authenticated"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn me(current_user: CurrentUser) -> Json<CurrentUser> {
    Json(current_user)
}
