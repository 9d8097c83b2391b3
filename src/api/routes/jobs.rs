//! Job record handlers.

use crate::api::AppState;
use crate::jobs::list_jobs;
use crate::types::{JobRecord, JobStatus};
use crate::{Error, Result};
use axum::{
    Json,
    extract::{Path, State},
};

/// GET /jobs/:status - List job records in one status
#[utoipa::path(
    get,
    path = "/jobs/{status}",
    tag = "jobs",
    params(
        ("status" = String, Path, description = "pending, in_progress, completed or failed")
    ),
    responses(
        (status = 200, description = "Live records in key order", body = Vec<JobRecord>),
        (status = 404, description = "Unknown status", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn list_jobs_by_status(
    State(state): State<AppState>,
    Path(status): Path<String>,
) -> Result<Json<Vec<JobRecord>>> {
    let status: JobStatus = status.parse().map_err(Error::NotFound)?;
    let records = list_jobs(&state.db, &state.config.store.namespace, status).await?;
    Ok(Json(records))
}
