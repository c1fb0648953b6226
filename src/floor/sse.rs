//! Server-Sent Events push channel at `/api/events`.
//!
//! Same stream as `/ws`, for clients that only need one direction. Each
//! notification becomes one event named after its topic, with the payload
//! (or `null`) as JSON data.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use lineboard_common::Notification;
use tokio_stream::{Stream, StreamExt, wrappers::BroadcastStream};

use super::api::SharedState;

pub async fn events_sse(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.events_tx.subscribe();
    let stream = BroadcastStream::new(receiver).filter_map(|item| match item {
        Ok(notification) => notification_to_event(&notification).map(Ok),
        Err(err) => {
            tracing::warn!(error = %err, "sse client lagging");
            None
        }
    });

    Sse::new(stream).keep_alive(default_keep_alive())
}

fn notification_to_event(notification: &Notification) -> Option<Event> {
    let data = match &notification.data {
        Some(value) => serde_json::to_string(value)
            .map_err(|err| {
                tracing::warn!(topic = %notification.topic, error = %err, "failed to encode sse payload");
                err
            })
            .ok()?,
        None => "null".to_string(),
    };
    Some(
        Event::default()
            .event(notification.topic.wire_name())
            .data(data),
    )
}

fn default_keep_alive() -> KeepAlive {
    KeepAlive::new()
        .interval(Duration::from_secs(15))
        .text("keep-alive")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lineboard_common::Topic;
    use serde_json::json;

    #[test]
    fn test_payload_notification_converts() {
        let n = Notification::new(Topic::PlanChanged, Some(json!({"id": 2})));
        assert!(notification_to_event(&n).is_some());
    }

    #[test]
    fn test_bare_notification_converts() {
        let n = Notification::new(Topic::ScanRecorded, None);
        assert!(notification_to_event(&n).is_some());
    }
}
