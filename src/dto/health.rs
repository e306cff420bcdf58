use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Name of the question generator, absent when only the pool is used.
    pub generator: Option<String>,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(generator: Option<String>) -> Self {
        Self {
            status: "ok".to_string(),
            generator,
        }
    }

    /// Create a health response indicating storage is unreachable.
    pub fn degraded(generator: Option<String>) -> Self {
        Self {
            status: "degraded".to_string(),
            generator,
        }
    }
}
