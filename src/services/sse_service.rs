use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::{
    dto::sse::{ERROR_EVENT, GAME_EVENT, ServerEvent, StreamError},
    error::ServiceError,
    services::sync_coordinator::DocumentStream,
    state::SharedState,
};

/// Subscribe to the documents of `code`, failing up front when the game does not exist.
pub async fn subscribe_game(state: &SharedState, code: &str) -> Result<DocumentStream, ServiceError> {
    let coordinator = state.coordinator().await?;
    coordinator.snapshot(code).await?;
    Ok(coordinator.subscribe(code))
}

/// Convert a document subscription into an SSE response, forwarding every snapshot and
/// dropping the subscription once the client disconnects.
pub fn to_sse_stream(
    mut documents: DocumentStream,
    code: String,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    // forwarder task: reads from the store subscription and pushes into mpsc
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                next = documents.next() => {
                    let payload = match next {
                        Some(Ok(document)) => ServerEvent::json(Some(GAME_EVENT.to_string()), &document),
                        Some(Err(err)) => {
                            warn!(code = %code, error = %err, "game subscription failed");
                            let body = StreamError {
                                message: err.to_string(),
                                retryable: err.is_retryable(),
                            };
                            if let Ok(payload) = ServerEvent::json(Some(ERROR_EVENT.to_string()), &body) {
                                let _ = tx.send(Ok(to_event(payload))).await;
                            }
                            break;
                        }
                        None => break,
                    };

                    match payload {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(err) => warn!(code = %code, error = %err, "failed to encode game event"),
                    }
                }
            }
        }

        info!(code = %code, "game SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_event(payload: ServerEvent) -> Event {
    let event = Event::default().data(payload.data);
    match payload.event {
        Some(name) => event.event(name),
        None => event,
    }
}
