/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Append-only submission ledger.
pub mod ledger;
/// Game session facade: room lifecycle, joins, submissions and projections.
pub mod room_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
