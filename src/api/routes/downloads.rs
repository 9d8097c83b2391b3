//! Submission handlers: immediate downloads, scheduled processing, retry reset.

use super::{CountResponse, DownloadRequest, MessageResponse, ProcessScheduledRequest};
use crate::api::AppState;
use crate::types::RequestRecord;
use crate::{Error, Result};
use axum::{Json, body::Bytes, extract::State, extract::rejection::JsonRejection};

/// Probe a request and enqueue every resulting job
///
/// A probe failure arms the delayed shutdown before the error is returned.
async fn probe_and_enqueue(state: &AppState, request: &RequestRecord) -> Result<usize> {
    let specs = match state
        .prober
        .probe(&request.url, &request.options, request.savedir.as_deref())
        .await
    {
        Ok(specs) => specs,
        Err(e) => {
            if matches!(e, Error::Probe(_)) {
                state
                    .shutdown
                    .trigger_after_probe_failure(state.config.api.probe_failure_exit_delay);
            }
            return Err(e);
        }
    };

    let queued = state.enqueuer.enqueue_all(&specs).await?;
    tracing::info!(
        url = %request.url,
        prober = state.prober.name(),
        jobs = queued,
        "request accepted"
    );
    Ok(queued)
}

/// POST /download - Probe a URL and queue its jobs
#[utoipa::path(
    post,
    path = "/download",
    tag = "downloads",
    request_body = DownloadRequest,
    responses(
        (status = 200, description = "Jobs queued", body = MessageResponse),
        (status = 400, description = "Invalid request, or the probe failed and the server is restarting", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn submit_download(
    State(state): State<AppState>,
    payload: std::result::Result<Json<DownloadRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>> {
    let Json(body) = payload?;
    let request = body.into_record()?;

    probe_and_enqueue(&state, &request).await?;
    Ok(Json(MessageResponse::new("Request accepted.")))
}

/// POST /download/scheduled - Process stored requests
///
/// Requests are taken from the head of the schedule list one at a time, so a
/// failure leaves the rest stored.
#[utoipa::path(
    post,
    path = "/download/scheduled",
    tag = "downloads",
    request_body(content = ProcessScheduledRequest, description = "Optional; omitted means all"),
    responses(
        (status = 200, description = "Stored requests processed", body = CountResponse),
        (status = 400, description = "Invalid count parameter", body = crate::error::ApiError),
        (status = 500, description = "Processing stopped on an error", body = crate::error::ApiError)
    )
)]
pub async fn process_scheduled(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CountResponse>> {
    let params = if body.iter().all(u8::is_ascii_whitespace) {
        ProcessScheduledRequest::default()
    } else {
        serde_json::from_slice::<ProcessScheduledRequest>(&body)
            .map_err(|e| Error::InvalidRequest(e.to_string()))?
    };
    let limit = params.limit()?;

    let mut processed: u64 = 0;
    while limit.is_none_or(|limit| processed < limit) {
        let Some(request) = state.enqueuer.pop_scheduled(Some(1)).await?.pop() else {
            break;
        };

        // Anything but a clean accept is a server-side failure for the batch
        probe_and_enqueue(&state, &request)
            .await
            .map_err(|e| Error::Other(format!("scheduled request {} failed: {}", request.url, e)))?;
        processed += 1;
    }

    Ok(Json(CountResponse {
        message: "Processed scheduled requests.".to_string(),
        count: processed,
    }))
}

/// POST /download/retry - Reset the failure count of every failed job
#[utoipa::path(
    post,
    path = "/download/retry",
    tag = "downloads",
    responses(
        (status = 200, description = "Failure counts reset", body = CountResponse),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn reset_retries(State(state): State<AppState>) -> Result<Json<CountResponse>> {
    let count = state.retry_scanner().reset_all_failed_counts().await?;
    Ok(Json(CountResponse {
        message: "Reset failed_count for failed jobs.".to_string(),
        count,
    }))
}
