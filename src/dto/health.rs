use serde::Serialize;
use utoipa::ToSchema;

/// Whether the room store is reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Requests are being served normally.
    Ok,
    /// No room store is installed; room endpoints answer 503.
    Degraded,
}

/// Body of the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `ok` or `degraded`.
    pub status: HealthStatus,
}

impl HealthResponse {
    /// The room store is reachable.
    pub fn ok() -> Self {
        Self {
            status: HealthStatus::Ok,
        }
    }

    /// The service runs without a room store.
    pub fn degraded() -> Self {
        Self {
            status: HealthStatus::Degraded,
        }
    }
}
