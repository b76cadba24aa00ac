//! SSE framing for the Debate Orchestrator's event stream (spec §4.11,
//! §6 "SSE framing"). Grounded in the same
//! `async_stream::stream!` + `Body::from_stream` shape the orchestrator
//! itself uses (`other_examples/...hiddenpath-aidebate...handlers.rs`).

use async_stream::stream;
use axum::body::Body;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use futures::stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::orchestrator::events::DebateEvent;

/// Cancels `token` when dropped — mid-stream disconnects (the client
/// closing the connection) drop the underlying body stream, which drops
/// this guard, which cancels the orchestrator task (spec §4.11 "closing
/// the connection cancels the task via the shared token").
struct CancelOnDrop(CancellationToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Render an orchestrator event stream as a chunked `text/event-stream`
/// response, flushing one frame per event.
pub fn stream_response(
    events: impl Stream<Item = DebateEvent> + Send + 'static,
    token: CancellationToken,
) -> Response {
    let guard = CancelOnDrop(token);
    let body_stream = stream! {
        let _guard = guard;
        let mut events = Box::pin(events);
        while let Some(event) = events.next().await {
            yield Ok::<_, std::io::Error>(event.to_sse_frame());
        }
    };

    Response::builder()
        .status(axum::http::StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header("x-accel-buffering", "no")
        .body(Body::from_stream(body_stream))
        .unwrap_or_else(|_| {
            (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "sse build failed").into_response()
        })
}
