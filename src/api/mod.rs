//! REST API server module
//!
//! The ingestion side of the queue: accepts download requests, probes them
//! into jobs and feeds the submission queue. Workers never talk to it.

use crate::{Error, Result};
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::{AppState, ShutdownSignal};

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Submission
/// - `POST /download` - Probe a URL and queue its jobs
/// - `POST /download/scheduled` - Process stored requests
/// - `POST /download/retry` - Reset failure counts of failed jobs
///
/// ## Deferred Requests
/// - `POST /schedule` - Store a request
/// - `GET /schedule` - List stored requests
///
/// ## Job Records
/// - `GET /jobs/:status` - Records in one status
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive documentation (if enabled)
pub fn create_router(state: AppState) -> Router {
    let api = state.config.api.clone();

    let router = Router::new()
        // Submission
        .route("/download", post(routes::submit_download))
        .route("/download/scheduled", post(routes::process_scheduled))
        .route("/download/retry", post(routes::reset_retries))
        // Deferred requests
        .route(
            "/schedule",
            post(routes::schedule_request).get(routes::list_scheduled),
        )
        // Job records
        .route("/jobs/:status", get(routes::list_jobs_by_status))
        // System
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec));

    // Swagger UI serves its own copy of the document on a separate path
    let router = if api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router.with_state(state).layer(TraceLayer::new_for_http());

    if api.cors_enabled {
        router.layer(build_cors_layer(&api.cors_origins))
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins ("*" allows any)
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        cors.allow_origin(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        cors.allow_origin(AllowOrigin::list(allowed))
    }
}

/// Serve the API on the configured bind address until the shutdown signal fires
///
/// Returns an error when the server stopped because a probe failed, so the
/// process exits non-zero and its supervisor restarts it.
///
/// # Example
///
/// ```no_run
/// use mediaq::api::{AppState, start_api_server};
/// use mediaq::executor::CliProber;
/// use mediaq::{Config, Database};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let db = Database::new(&config.store.database_path).await?;
/// let prober = CliProber::from_config(&config.tools).ok_or("yt-dlp not found")?;
///
/// start_api_server(AppState::new(db, config, Arc::new(prober))).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(state: AppState) -> Result<()> {
    let bind_address = state.config.api.bind_address;
    let shutdown = state.shutdown.clone();

    let app = create_router(state);
    let listener = TcpListener::bind(bind_address).await.map_err(Error::Io)?;

    tracing::info!(address = %bind_address, "API server listening");

    let token = shutdown.token().clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            token.cancelled().await;
            tracing::info!("API server shutting down");
        })
        .await
        .map_err(|e| Error::ApiServerError(e.to_string()))?;

    if shutdown.probe_failed() {
        return Err(Error::Probe(
            "server stopped after a failed probe".to_string(),
        ));
    }

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
