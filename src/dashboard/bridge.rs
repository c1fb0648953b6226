//! Relay from the floor server's `/api/events` stream into a local
//! [`Notifier`], so mounted widgets react to remote pushes the same way they
//! react to in-process ones.

use std::time::Duration;

use futures::StreamExt;
use lineboard_common::Topic;
use reqwest_eventsource::{Event, EventSource};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::notifier::Notifier;

const MAX_BACKOFF_SECS: u64 = 30;

/// Handle to the relay task. Dropping it stops the relay.
pub struct PushBridge {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PushBridge {
    /// Connect to `{base_url}/api/events` and republish every event on
    /// `notifier`. Reconnects with exponential backoff; after each
    /// reconnect every topic is published once so widgets re-pull whatever
    /// they missed while disconnected.
    pub fn spawn(base_url: &str, notifier: Notifier) -> Self {
        let url = format!("{}/api/events", base_url.trim_end_matches('/'));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(relay(url, notifier, cancel.clone()));
        Self {
            cancel,
            task: Some(task),
        }
    }

    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            tracing::warn!(error = %e, "push bridge ended abnormally");
        }
    }
}

impl Drop for PushBridge {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn relay(url: String, notifier: Notifier, cancel: CancellationToken) {
    let mut retry_count: u32 = 0;
    let mut connected_before = false;

    while !cancel.is_cancelled() {
        if retry_count > 0 {
            let delay = backoff(retry_count);
            tracing::info!(url = %url, attempt = retry_count + 1, delay_secs = delay.as_secs(), "reconnecting event stream");
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let mut source = EventSource::get(&url);
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => {
                    source.close();
                    return;
                }
                event = source.next() => event,
            };
            match event {
                Some(Ok(Event::Open)) => {
                    tracing::info!(url = %url, "event stream connected");
                    retry_count = 0;
                    if connected_before {
                        resync(&notifier);
                    }
                    connected_before = true;
                }
                Some(Ok(Event::Message(msg))) => {
                    if let Some((topic, data)) = decode_event(&msg.event, &msg.data) {
                        let report = notifier.publish(topic, data);
                        if !report.is_clean() {
                            tracing::debug!(topic = %topic, failures = report.failures.len(), "relayed with handler failures");
                        }
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(url = %url, error = %e, "event stream error");
                    source.close();
                    break;
                }
                None => {
                    tracing::warn!(url = %url, "event stream ended");
                    break;
                }
            }
        }
        retry_count = retry_count.saturating_add(1);
    }
}

fn backoff(retry_count: u32) -> Duration {
    let exp = retry_count.saturating_sub(1).min(16);
    Duration::from_secs((1u64 << exp).min(MAX_BACKOFF_SECS))
}

/// Map one SSE frame to a topic and payload. Unknown event names are
/// skipped; a `null` or unparseable body is relayed as "no payload".
fn decode_event(event: &str, data: &str) -> Option<(Topic, Option<Value>)> {
    let topic = match event.parse::<Topic>() {
        Ok(topic) => topic,
        Err(e) => {
            tracing::debug!(event, error = %e, "ignoring event");
            return None;
        }
    };
    let payload = match serde_json::from_str::<Value>(data) {
        Ok(Value::Null) => None,
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(topic = %topic, error = %e, "undecodable event payload");
            None
        }
    };
    Some((topic, payload))
}

fn resync(notifier: &Notifier) {
    for topic in Topic::ALL {
        notifier.publish(topic, None);
    }
}
