//! OpenAPI documentation and schema generation
//!
//! The document is generated at compile time with utoipa.

use utoipa::OpenApi;

/// OpenAPI documentation for the mediaq ingestion API
///
/// Served at `/openapi.json`, and through Swagger UI at `/swagger-ui` when enabled.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "mediaq ingestion API",
        version = "0.1.0",
        description = "Submit download requests, manage scheduled requests and inspect job records",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:5000", description = "Local development server")
    ),
    paths(
        // Submission
        crate::api::routes::submit_download,
        crate::api::routes::process_scheduled,
        crate::api::routes::reset_retries,

        // Deferred requests
        crate::api::routes::schedule_request,
        crate::api::routes::list_scheduled,

        // Job records
        crate::api::routes::list_jobs_by_status,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        crate::types::JobId,
        crate::types::JobStatus,
        crate::types::JobRecord,
        crate::types::JobSpec,
        crate::types::ScheduledRequest,

        crate::api::routes::DownloadRequest,
        crate::api::routes::ProcessScheduledRequest,
        crate::api::routes::MessageResponse,
        crate::api::routes::CountResponse,

        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "downloads", description = "Submit URLs, process scheduled requests, reset retries"),
        (name = "schedule", description = "Requests stored for later processing"),
        (name = "jobs", description = "Job records by status"),
        (name = "system", description = "Health check and OpenAPI document"),
    )
)]
pub struct ApiDoc;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_lists_every_route() {
        let spec = ApiDoc::openapi();
        let paths: Vec<&str> = spec.paths.paths.keys().map(String::as_str).collect();

        for expected in [
            "/download",
            "/download/scheduled",
            "/download/retry",
            "/schedule",
            "/jobs/{status}",
            "/health",
            "/openapi.json",
        ] {
            assert!(paths.contains(&expected), "missing path {expected}");
        }
    }

    #[test]
    fn test_openapi_spec_has_schemas_and_tags() {
        let spec = ApiDoc::openapi();

        let components = spec.components.unwrap();
        assert!(components.schemas.contains_key("JobRecord"));
        assert!(components.schemas.contains_key("ApiError"));

        let tags = spec.tags.unwrap();
        let tag_names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tag_names, vec!["downloads", "schedule", "jobs", "system"]);
    }

    #[test]
    fn test_openapi_json_serialization() {
        let json = serde_json::to_value(ApiDoc::openapi()).expect("Should serialize to JSON");

        assert_eq!(json["info"]["title"], "mediaq ingestion API");
        assert!(json["openapi"].as_str().unwrap().starts_with("3."));
    }
}
