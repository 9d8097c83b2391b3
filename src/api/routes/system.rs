//! System handlers: health, OpenAPI.

use crate::api::AppState;
use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;

/// GET /health - Health check
///
/// Reports the submission queue depth, which also proves the store answers.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 500, description = "Store unavailable", body = crate::error::ApiError)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> crate::Result<impl IntoResponse> {
    let queued = state.enqueuer.queue_len().await?;
    Ok(Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "queued": queued,
        "prober": state.prober.name(),
    })))
}

/// GET /openapi.json - OpenAPI specification
#[utoipa::path(
    get,
    path = "/openapi.json",
    tag = "system",
    responses(
        (status = 200, description = "OpenAPI specification in JSON format")
    )
)]
pub async fn openapi_spec() -> impl IntoResponse {
    use crate::api::openapi::ApiDoc;
    use utoipa::OpenApi;

    Json(ApiDoc::openapi())
}
