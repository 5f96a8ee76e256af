//! Server-Sent Events stream of ingestion and materialization events

use axum::{
    extract::State,
    response::sse::{Event, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use std::convert::Infallible;

use crate::AppState;

/// GET /events
///
/// Streams `StatementsStored`, `ActivityUnresolved`, `ProgressMaterialized`,
/// `MaterializationSkipped` and `MaterializationFailed`.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    lrs_common::sse::create_event_sse_stream("lrs-ingest", &state.event_bus, |_| true)
}

/// Build SSE routes
pub fn event_routes() -> Router<AppState> {
    Router::new().route("/events", get(event_stream))
}
