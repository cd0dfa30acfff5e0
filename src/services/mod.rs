/// OpenAPI documentation generation.
pub mod documentation;
/// Game operations exposed over HTTP.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Server-Sent Events forwarding of game documents.
pub mod sse_service;
/// Storage connection supervisor with backoff and degraded mode.
pub mod storage_supervisor;
/// Read-decide-write coordination against the shared game document.
pub mod sync_coordinator;
