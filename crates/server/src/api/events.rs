//! Server-sent event stream over the swarm bus

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream};
use std::{convert::Infallible, time::Duration};
use tokio::sync::broadcast::error::RecvError;

use super::AppState;

const HEARTBEAT: Duration = Duration::from_secs(15);

/// Every swarm event as a JSON `data` frame, with a heartbeat comment when idle
pub async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.coordinator.subscribe();

    let stream = stream::unfold(rx, |mut rx| async move {
        loop {
            match tokio::time::timeout(HEARTBEAT, rx.recv()).await {
                Ok(Ok(event)) => {
                    let json = serde_json::to_string(&event).unwrap_or_default();
                    let frame = Event::default().event(event_name(&event)).data(json);
                    return Some((Ok(frame), rx));
                }
                // Slow subscriber; drop what was missed and keep streaming
                Ok(Err(RecvError::Lagged(skipped))) => {
                    tracing::warn!("SSE subscriber lagged, skipped {} events", skipped);
                    continue;
                }
                Ok(Err(RecvError::Closed)) => return None,
                Err(_) => return Some((Ok(Event::default().comment("heartbeat")), rx)),
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn event_name(event: &quorum_core::swarm::SwarmEvent) -> String {
    match serde_json::to_value(event.kind) {
        Ok(serde_json::Value::String(name)) => name,
        _ => "message".to_string(),
    }
}
