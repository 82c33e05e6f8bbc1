//! Server-sent event stream of tracker changes

use super::handlers::TrackerState;
use crate::events::TrackerEvent;
use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

/// Query parameters for filtering the event stream
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EventsQuery {
    /// Only events of this client
    pub client_id: Option<String>,
    /// Only events of this branch
    pub branch_id: Option<String>,
}

/// Check if the event passes the client and branch filters.
fn passes_filters(event: &TrackerEvent, query: &EventsQuery) -> bool {
    if let Some(ref client_id) = query.client_id {
        if &event.client_id != client_id {
            return false;
        }
    }

    if let Some(ref branch_id) = query.branch_id {
        match &event.branch_id {
            Some(event_branch) if event_branch == branch_id => {}
            // Events without a branch never match a branch filter
            _ => return false,
        }
    }

    true
}

/// SSE handler for `/api/visa-trackers/events`
pub async fn tracker_events(
    State(state): State<TrackerState>,
    Query(query): Query<EventsQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!(
        client_filter = ?query.client_id,
        branch_filter = ?query.branch_id,
        "SSE events client connected"
    );
    let rx = state.event_bus.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |received| {
        let event = match received {
            Ok(event) => event,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "SSE subscriber lagged, events dropped");
                return None;
            }
        };
        if !passes_filters(&event, &query) {
            return None;
        }
        match Event::default().event(event.action.as_str()).json_data(&event) {
            Ok(sse_event) => Some(Ok(sse_event)),
            Err(e) => {
                warn!(error = %e, "Failed to encode tracker event");
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
