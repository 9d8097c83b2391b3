//! Deferred request handlers.

use super::{DownloadRequest, MessageResponse};
use crate::Result;
use crate::api::AppState;
use crate::types::ScheduledRequest;
use axum::{Json, extract::State, extract::rejection::JsonRejection};

/// POST /schedule - Store a request for later processing
#[utoipa::path(
    post,
    path = "/schedule",
    tag = "schedule",
    request_body = DownloadRequest,
    responses(
        (status = 200, description = "Request stored", body = MessageResponse),
        (status = 400, description = "Invalid request", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn schedule_request(
    State(state): State<AppState>,
    payload: std::result::Result<Json<DownloadRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>> {
    let Json(body) = payload?;
    let request = body.into_record()?;

    state.enqueuer.schedule(&request).await?;
    Ok(Json(MessageResponse::new("Request scheduled.")))
}

/// GET /schedule - List stored requests, options withheld
#[utoipa::path(
    get,
    path = "/schedule",
    tag = "schedule",
    responses(
        (status = 200, description = "Stored requests, oldest first", body = Vec<ScheduledRequest>),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn list_scheduled(State(state): State<AppState>) -> Result<Json<Vec<ScheduledRequest>>> {
    Ok(Json(state.enqueuer.scheduled().await?))
}
