use axum::Json;
use serde_json::{Value, json};

/// Liveness probe
#[utoipa::path(
    get,
    path = "/healthz",
    tag = "health",
    responses((status = 200, description = "Service is up"))
)]
pub async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
