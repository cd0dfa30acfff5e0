use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::Sse,
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{error::AppError, services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/games/{code}/events",
    tag = "sse",
    params(("code" = String, Path, description = "Game code")),
    responses(
        (status = 200, description = "One `game` event per committed write, starting with the current document", content_type = "text/event-stream", body = String),
        (status = 404, description = "Unknown game"),
        (status = 503, description = "Storage unavailable")
    )
)]
/// Stream every change of a game document to the client.
pub async fn game_stream(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    let documents = sse_service::subscribe_game(&state, &code).await?;
    info!(code = %code, "new game SSE connection");
    Ok(sse_service::to_sse_stream(documents, code))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/games/{code}/events", get(game_stream))
}
