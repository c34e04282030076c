use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report `ok` or `degraded`, pinging the room store and logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_room_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "room store health check failed");
            }
        }
        Err(_) => warn!("room store unavailable (degraded mode)"),
    }

    if state.is_degraded().await {
        HealthResponse::degraded()
    } else {
        HealthResponse::ok()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig, dao::room_store::MemoryRoomStore, dto::health::HealthStatus,
        state::AppState,
    };

    #[tokio::test]
    async fn reports_degraded_without_store() {
        let state = AppState::new(AppConfig::default());
        assert_eq!(health_status(&state).await.status, HealthStatus::Degraded);

        state.set_room_store(Arc::new(MemoryRoomStore::new())).await;
        assert_eq!(health_status(&state).await.status, HealthStatus::Ok);
    }
}
