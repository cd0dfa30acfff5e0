use serde::Serialize;
use utoipa::ToSchema;

/// Name of the event carrying a full game document.
pub const GAME_EVENT: &str = "game";
/// Name of the event sent right before a broken stream is closed.
pub const ERROR_EVENT: &str = "error";

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    /// SSE event name; unnamed events reach the default `message` listener.
    pub event: Option<String>,
    /// Serialised payload.
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Payload of the final `error` event of a subscription.
pub struct StreamError {
    /// Why the subscription ended.
    pub message: String,
    /// Whether reconnecting later may succeed.
    pub retryable: bool,
}
