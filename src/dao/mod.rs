/// Game document storage backends.
pub mod game_store;
/// Shared document model.
pub mod models;
/// Minimal field-path writes.
pub mod patch;
/// Storage abstraction layer for database operations.
pub mod storage;
