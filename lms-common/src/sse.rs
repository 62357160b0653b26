//! Server-Sent Events (SSE) utilities
//!
//! Shared SSE implementation for LMS services: turns EventBus subscriptions
//! into an axum SSE response with keep-alive.

use crate::events::LmsEvent;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

/// Keep-alive comment interval
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Convert one event into an SSE frame named after its type
pub fn to_sse_event(event: &LmsEvent) -> Option<Event> {
    match Event::default().event(event.event_type()).json_data(event) {
        Ok(sse_event) => Some(sse_event),
        Err(e) => {
            warn!("Failed to serialize event: {}", e);
            None
        }
    }
}

/// Create an SSE stream from an EventBus subscription
///
/// The first frame is a `ConnectionStatus` with data `connected`. Lagged
/// receivers skip the dropped events and keep streaming.
///
/// # Example
/// ```rust,ignore
/// pub async fn event_stream(
///     State(state): State<AppState>,
/// ) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
///     lms_common::sse::create_event_sse_stream("lms-pay", state.event_bus.subscribe())
/// }
/// ```
pub fn create_event_sse_stream(
    service_name: &'static str,
    rx: broadcast::Receiver<LmsEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to {} events", service_name);

    let connected = futures::stream::once(async {
        Ok(Event::default().event("ConnectionStatus").data("connected"))
    });

    let events = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => {
                debug!("Broadcasting SSE event: {}", event.event_type());
                to_sse_event(&event).map(Ok)
            }
            Err(e) => {
                // Lagged: continue with the newest events
                warn!("SSE stream error: {:?}", e);
                None
            }
        }
    });

    Sse::new(connected.chain(events)).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}
