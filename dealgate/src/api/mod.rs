//! HTTP API layer: route handlers, wire models, and the OpenAPI document.
//!
//! Routes live under `/api/v1`:
//!
//! - **Authentication**: `POST /users`, `POST /oauth/token`,
//!   `DELETE /oauth/sessions`, `GET /users/me`
//! - **Clients** (admin only): `GET|POST /admin/clients`,
//!   `DELETE /admin/clients/{id}`
//! - **Health**: `GET /healthz` (mounted at the root, no auth)
//!
//! The generated OpenAPI document is served at `/docs` via Scalar.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

pub mod handlers;
pub mod models;

struct BearerSecurityAddon;

impl Modify for BearerSecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    servers((url = "/api/v1", description = "Dealgate API")),
    modifiers(&BearerSecurityAddon),
    paths(
        handlers::auth::register,
        handlers::auth::token,
        handlers::auth::logout,
        handlers::auth::me,
        handlers::clients::list_clients,
        handlers::clients::create_client,
        handlers::clients::delete_client,
        handlers::health::healthz,
    ),
    components(schemas(
        models::auth::RegisterRequest,
        models::auth::TokenRequest,
        models::auth::TokenResponse,
        models::clients::ClientCreateRequest,
        models::clients::ClientResponse,
        models::users::CurrentUser,
        models::users::Role,
        models::users::UserResponse,
    )),
    tags(
        (name = "authentication", description = "Account registration and token lifecycle"),
        (name = "users", description = "User profile"),
        (name = "clients", description = "OAuth client administration"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_document_renders_uuid_ids_as_strings() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();

        for schema in ["UserResponse", "CurrentUser"] {
            let id = &doc["components"]["schemas"][schema]["properties"]["id"];
            assert_eq!(id["type"], "string", "{schema}.id");
            assert_eq!(id["format"], "uuid", "{schema}.id");
        }
    }

    #[test]
    fn test_openapi_document_registers_bearer_scheme() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let scheme = &doc["components"]["securitySchemes"]["bearer"];
        assert_eq!(scheme["type"], "http");
        assert_eq!(scheme["scheme"], "bearer");
    }
}
