//! Server-Sent Events stream of dialog activity

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

/// GET /api/events
///
/// Streams every `LmsEvent`: dialog lifecycle, countdown updates,
/// resolutions, navigation requests and hub connection changes.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    lms_common::sse::create_event_sse_stream("lms-pay", state.event_bus.subscribe())
}
