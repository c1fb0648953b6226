//! In-process publish/subscribe for floor events.
//!
//! A [`Notifier`] is a cheap-to-clone handle to one registry. `publish` calls
//! every current subscriber of a topic synchronously, in subscription order,
//! and returns once they have all run. There is no queue and no replay: a
//! subscriber registered after a publish never sees it.
//!
//! Handlers must be quick. The usual handler just wakes a task
//! (`Notify::notify_one`) or forwards into a channel.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use lineboard_common::{Notification, Topic};
use serde_json::Value;

use crate::errors::NotifierDeliveryError;

/// A subscriber callback.
pub type Handler = Arc<dyn Fn(&Notification) -> anyhow::Result<()> + Send + Sync>;

type Registry = HashMap<Topic, Vec<(u64, Handler)>>;

struct Inner {
    registry: RwLock<Registry>,
    next_id: AtomicU64,
}

#[derive(Clone)]
pub struct Notifier {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("subscribers", &self.subscriber_count_all())
            .finish()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a single `publish`.
#[derive(Debug, Default)]
pub struct DeliveryReport {
    /// Handlers that ran without error.
    pub delivered: usize,
    pub failures: Vec<NotifierDeliveryError>,
}

impl DeliveryReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Unsubscribe token. Dropping it unsubscribes too.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    topic: Topic,
    id: u64,
    registry: Weak<Inner>,
}

impl Subscription {
    pub fn topic(&self) -> Topic {
        self.topic
    }

    pub fn unsubscribe(self) {
        // Drop does the work.
    }

    fn release(&self) {
        let Some(inner) = self.registry.upgrade() else {
            return;
        };
        let mut registry = inner
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(handlers) = registry.get_mut(&self.topic) {
            handlers.retain(|(id, _)| *id != self.id);
            if handlers.is_empty() {
                registry.remove(&self.topic);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("id", &self.id)
            .finish()
    }
}

impl Notifier {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register `handler` for `topic`.
    pub fn subscribe<F>(&self, topic: Topic, handler: F) -> Subscription
    where
        F: Fn(&Notification) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(topic)
            .or_default()
            .push((id, Arc::new(handler)));
        tracing::debug!(topic = %topic, subscriber = id, "subscribed");
        Subscription {
            topic,
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Subscribe the same handler to several topics.
    pub fn subscribe_all<F>(&self, topics: &[Topic], handler: F) -> Vec<Subscription>
    where
        F: Fn(&Notification) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        topics
            .iter()
            .map(|topic| {
                let handler = Arc::clone(&handler);
                self.subscribe(*topic, move |n| handler(n))
            })
            .collect()
    }

    /// Deliver to every current subscriber of `topic`.
    ///
    /// Handlers run outside the registry lock, so a handler may subscribe or
    /// unsubscribe without deadlocking. A failing or panicking handler is
    /// reported and skipped; the rest still run.
    pub fn publish(&self, topic: Topic, payload: Option<Value>) -> DeliveryReport {
        let handlers: Vec<(u64, Handler)> = self
            .inner
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&topic)
            .cloned()
            .unwrap_or_default();

        let notification = Notification::new(topic, payload);
        let mut report = DeliveryReport::default();

        for (subscriber, handler) in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(&notification))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    tracing::warn!(topic = %topic, subscriber, error = %e, "subscriber failed");
                    report.failures.push(NotifierDeliveryError::HandlerFailed {
                        topic,
                        subscriber,
                        message: format!("{:#}", e),
                    });
                }
                Err(_) => {
                    tracing::warn!(topic = %topic, subscriber, "subscriber panicked");
                    report
                        .failures
                        .push(NotifierDeliveryError::HandlerPanicked { topic, subscriber });
                }
            }
        }

        tracing::trace!(topic = %topic, delivered = report.delivered, "published");
        report
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.inner
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&topic)
            .map_or(0, Vec::len)
    }

    fn subscriber_count_all(&self) -> usize {
        Topic::ALL.iter().map(|t| self.subscriber_count(*t)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    fn counter(notifier: &Notifier, topic: Topic) -> (Arc<AtomicUsize>, Subscription) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let sub = notifier.subscribe(topic, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        (count, sub)
    }

    #[test]
    fn test_publish_reaches_all_subscribers_of_topic() {
        let notifier = Notifier::new();
        let (a, _sa) = counter(&notifier, Topic::ProductionChanged);
        let (b, _sb) = counter(&notifier, Topic::ProductionChanged);
        let (other, _so) = counter(&notifier, Topic::DefectRecorded);

        let report = notifier.publish(Topic::ProductionChanged, None);

        assert_eq!(report.delivered, 2);
        assert!(report.is_clean());
        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
        assert_eq!(other.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_late_subscriber_sees_no_replay() {
        let notifier = Notifier::new();
        notifier.publish(Topic::ScanRecorded, None);

        let (count, _sub) = counter(&notifier, Topic::ScanRecorded);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        notifier.publish(Topic::ScanRecorded, None);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let notifier = Notifier::new();
        let report = notifier.publish(Topic::PlanChanged, Some(json!({"id": 1})));
        assert_eq!(report.delivered, 0);
        assert!(report.is_clean());
    }

    #[test]
    fn test_delivery_in_subscription_order_with_payload() {
        let notifier = Notifier::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut subs = Vec::new();
        for tag in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            subs.push(notifier.subscribe(Topic::DefectRecorded, move |n| {
                seen.lock().unwrap().push((tag, n.data.clone()));
                Ok(())
            }));
        }

        notifier.publish(Topic::DefectRecorded, Some(json!({"rate": 2.5})));

        let seen = seen.lock().unwrap();
        let order: Vec<_> = seen.iter().map(|(tag, _)| *tag).collect();
        assert_eq!(order, vec!["first", "second", "third"]);
        assert!(seen.iter().all(|(_, data)| data == &Some(json!({"rate": 2.5}))));
    }

    #[test]
    fn test_failing_handler_does_not_block_others() {
        let notifier = Notifier::new();
        let _bad = notifier.subscribe(Topic::ProductionChanged, |_| anyhow::bail!("widget gone"));
        let _panics = notifier.subscribe(Topic::ProductionChanged, |_| panic!("boom"));
        let (good, _sg) = counter(&notifier, Topic::ProductionChanged);

        let report = notifier.publish(Topic::ProductionChanged, None);

        assert_eq!(good.load(Ordering::SeqCst), 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failures.len(), 2);
        assert!(matches!(
            report.failures[0],
            NotifierDeliveryError::HandlerFailed { ref message, .. } if message == "widget gone"
        ));
        assert!(matches!(
            report.failures[1],
            NotifierDeliveryError::HandlerPanicked { topic: Topic::ProductionChanged, .. }
        ));
    }

    #[test]
    fn test_unsubscribe_and_drop_release() {
        let notifier = Notifier::new();
        let (a, sa) = counter(&notifier, Topic::ReallocationChanged);
        let (b, sb) = counter(&notifier, Topic::ReallocationChanged);
        assert_eq!(notifier.subscriber_count(Topic::ReallocationChanged), 2);

        sa.unsubscribe();
        drop(sb);
        assert_eq!(notifier.subscriber_count(Topic::ReallocationChanged), 0);

        notifier.publish(Topic::ReallocationChanged, None);
        assert_eq!(a.load(Ordering::SeqCst), 0);
        assert_eq!(b.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handler_may_subscribe_during_publish() {
        let notifier = Notifier::new();
        let inner = notifier.clone();
        let spawned = Arc::new(Mutex::new(Vec::new()));
        let keep = Arc::clone(&spawned);
        let _sub = notifier.subscribe(Topic::ScanRecorded, move |_| {
            let sub = inner.subscribe(Topic::ScanRecorded, |_| Ok(()));
            keep.lock().unwrap().push(sub);
            Ok(())
        });

        let report = notifier.publish(Topic::ScanRecorded, None);

        // The handler added during this publish is not called until the next one.
        assert_eq!(report.delivered, 1);
        assert_eq!(notifier.subscriber_count(Topic::ScanRecorded), 2);
    }

    #[test]
    fn test_subscribe_all_topics() {
        let notifier = Notifier::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let subs = notifier.subscribe_all(&Topic::ALL, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert_eq!(subs.len(), Topic::ALL.len());

        for topic in Topic::ALL {
            notifier.publish(topic, None);
        }
        assert_eq!(count.load(Ordering::SeqCst), Topic::ALL.len());
    }

    #[test]
    fn test_subscription_outliving_notifier_drops_cleanly() {
        let notifier = Notifier::new();
        let (_count, sub) = counter(&notifier, Topic::PlanChanged);
        drop(notifier);
        drop(sub);
    }
}
