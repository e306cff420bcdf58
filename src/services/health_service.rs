use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Ping the store and report which question generator is installed.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let generator = state.generator_name().map(str::to_owned);
    match state.store().health_check().await {
        Ok(()) => HealthResponse::ok(generator),
        Err(err) => {
            warn!(error = %err, "storage health check failed");
            HealthResponse::degraded(generator)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::pool_only_state;

    #[tokio::test]
    async fn in_memory_store_is_healthy() {
        let state = pool_only_state().await;
        let health = health_status(&state).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.generator, None);
    }
}
