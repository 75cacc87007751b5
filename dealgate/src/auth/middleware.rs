//! Request authorization middleware.
//!
//! `require_auth` turns a Bearer access token into a live [`CurrentUser`]
//! loaded from the user directory (never from data cached at issuance, so
//! role changes and deletions take effect on the next request). Handlers
//! behind it pick the user up via the [`CurrentUser`] extractor;
//! `require_admin` layers a role gate on top.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use tracing::{debug, instrument, trace};

use crate::{
    AppState,
    api::models::users::{CurrentUser, Role},
    errors::{Error, Result},
};

/// The raw access token a request authenticated with. Inserted alongside
/// [`CurrentUser`] so logout can revoke exactly the credential presented.
#[derive(Clone, Debug)]
pub struct AccessToken(pub String);

/// Pull the token out of an `Authorization: Bearer <token>` header.
///
/// The scheme comparison is case-insensitive and the token must be
/// non-empty; anything else is a uniform [`Error::Unauthenticated`].
pub(crate) fn bearer_token(parts: &Parts) -> Result<&str> {
    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(Error::Unauthenticated {
            message: Some("missing authorization header".to_string()),
        })?;

    let value = header.to_str().map_err(|_| Error::Unauthenticated {
        message: Some("malformed authorization header".to_string()),
    })?;

    let (scheme, token) = value.split_once(' ').ok_or(Error::Unauthenticated {
        message: Some("malformed authorization header".to_string()),
    })?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(Error::Unauthenticated {
            message: Some("malformed authorization header".to_string()),
        });
    }
    Ok(token)
}

/// Authentication middleware: Bearer token -> token record -> live user.
///
/// On success the request carries [`CurrentUser`] and [`AccessToken`]
/// extensions for downstream handlers. A token whose user has since been
/// deleted fails the same way as an invalid token.
#[instrument(skip_all)]
pub async fn require_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Result<Response> {
    let (parts, body) = request.into_parts();
    let token = bearer_token(&parts)?.to_string();

    let user_id = state.tokens.resolve_access(&token).await?;
    let user = state
        .users
        .get_by_id(user_id)
        .await?
        .ok_or(Error::InvalidOrExpiredToken)?;
    trace!(user_id = %user.id, "authenticated request");

    request = Request::from_parts(parts, body);
    request.extensions_mut().insert(CurrentUser::from(user));
    request.extensions_mut().insert(AccessToken(token));
    Ok(next.run(request).await)
}

/// Role gate for admin-only routes. Must be layered inside `require_auth`;
/// a request that reaches it without a [`CurrentUser`] extension is a
/// router wiring bug and surfaces as a 500.
#[instrument(skip_all)]
pub async fn require_admin(request: Request, next: Next) -> Result<Response> {
    let user = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or(Error::Internal {
            operation: "admin gate reached without authenticated user".to_string(),
        })?;

    if user.role != Role::Admin {
        debug!(user_id = %user.id, "non-admin denied access to admin route");
        return Err(Error::InsufficientPermissions {
            resource: "admin API".to_string(),
        });
    }
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(Error::Internal {
                operation: "CurrentUser extractor used outside require_auth".to_string(),
            })
    }
}

impl<S> FromRequestParts<S> for AccessToken
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<AccessToken>()
            .cloned()
            .ok_or(Error::Internal {
                operation: "AccessToken extractor used outside require_auth".to_string(),
            })
    }
}
