//! Widget refresh loop.
//!
//! A mounted widget owns one tokio task. It loads its [`Panel`] once on
//! mount, then again whenever one of the panel's topics is published or the
//! fallback timer fires, whichever comes first. Triggers that arrive while a
//! load is pending or running are dropped, so a burst costs one load.
//!
//! ```text
//! Initial ──> Loading ──ok──> Ready <──ok── Refreshing
//!                │                 └──trigger──>  │
//!                └──err──> Error <──────err───────┘
//! ```
//!
//! `Error` keeps the last good value; the next successful load returns to
//! `Ready`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::panel::Panel;
use crate::config::DashboardSection;
use crate::errors::FetchError;
use crate::notifier::{Notifier, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetState {
    Initial,
    Loading,
    Ready,
    Refreshing,
    Error,
}

/// What a widget currently shows.
#[derive(Debug, Clone, Serialize)]
pub struct WidgetView<T> {
    pub state: WidgetState,
    /// Last successfully loaded value, kept through errors.
    pub value: Option<T>,
    pub error: Option<String>,
    /// Successful loads so far.
    pub loads: u64,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl<T> Default for WidgetView<T> {
    fn default() -> Self {
        Self {
            state: WidgetState::Initial,
            value: None,
            error: None,
            loads: 0,
            refreshed_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSettings {
    /// Fallback period when no push arrives.
    pub poll_interval: Duration,
    pub fetch_timeout: Duration,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&DashboardSection> for RefreshSettings {
    fn from(section: &DashboardSection) -> Self {
        Self {
            poll_interval: section.poll_interval(),
            fetch_timeout: section.fetch_timeout(),
        }
    }
}

/// Outcome of a refresh request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A load will run.
    Scheduled,
    /// A load was already pending or running; this request was dropped.
    Coalesced,
}

struct Signal {
    /// Set from trigger (or timer) until the load completes.
    busy: AtomicBool,
    wake: Notify,
}

impl Signal {
    fn trigger(&self) -> Trigger {
        match self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                self.wake.notify_one();
                Trigger::Scheduled
            }
            Err(_) => Trigger::Coalesced,
        }
    }
}

/// The driver behind a [`WidgetHandle`]. Only constructed by [`Widget::mount`].
pub struct Widget<P: Panel> {
    panel: P,
    settings: RefreshSettings,
    signal: Arc<Signal>,
    view_tx: watch::Sender<WidgetView<P::Output>>,
    cancel: CancellationToken,
}

impl<P: Panel> Widget<P> {
    /// Subscribe `panel` to `notifier` and start its refresh loop.
    ///
    /// Must be called inside a tokio runtime.
    pub fn mount(panel: P, notifier: &Notifier, settings: RefreshSettings) -> WidgetHandle<P::Output> {
        let signal = Arc::new(Signal {
            busy: AtomicBool::new(false),
            wake: Notify::new(),
        });
        let subscriptions = panel
            .topics()
            .iter()
            .map(|topic| {
                let signal = Arc::clone(&signal);
                notifier.subscribe(*topic, move |_| {
                    signal.trigger();
                    Ok(())
                })
            })
            .collect();

        let (view_tx, view_rx) = watch::channel(WidgetView::default());
        let cancel = CancellationToken::new();
        let name = panel.name().to_string();
        let widget = Widget {
            panel,
            settings,
            signal: Arc::clone(&signal),
            view_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(widget.run());
        tracing::debug!(widget = %name, "mounted");

        WidgetHandle {
            name,
            view_rx,
            signal,
            cancel,
            task: Some(task),
            _subscriptions: subscriptions,
        }
    }

    async fn run(self) {
        let poll = self.settings.poll_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + poll, poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.load_once().await;
        ticker.reset();

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = self.signal.wake.notified() => {}
                _ = ticker.tick() => {}
            }
            if self.cancel.is_cancelled() {
                break;
            }
            self.load_once().await;
            ticker.reset();
        }
        tracing::debug!(widget = self.panel.name(), "unmounted");
    }

    async fn load_once(&self) {
        // Claim the slot even when the timer started this load, so a trigger
        // arriving from here on is coalesced into it.
        self.signal.busy.swap(true, Ordering::AcqRel);
        self.view_tx.send_modify(|view| {
            view.state = if view.value.is_some() {
                WidgetState::Refreshing
            } else {
                WidgetState::Loading
            };
        });

        let timeout = self.settings.fetch_timeout;
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                // Unmounted mid-load: the result would land on a dead widget.
                return;
            }
            r = tokio::time::timeout(timeout, self.panel.load()) => {
                r.unwrap_or(Err(FetchError::Timeout(timeout)))
            }
        };

        match result {
            Ok(value) => self.view_tx.send_modify(|view| {
                view.state = WidgetState::Ready;
                view.value = Some(value);
                view.error = None;
                view.loads += 1;
                view.refreshed_at = Some(Utc::now());
            }),
            Err(e) => {
                tracing::warn!(widget = self.panel.name(), error = %e, "load failed");
                self.view_tx.send_modify(|view| {
                    view.state = WidgetState::Error;
                    view.error = Some(e.to_string());
                });
            }
        }
        // A trigger that won the race against a timer load left a wake
        // permit behind. This load already covered it.
        if self.signal.wake.notified().now_or_never().is_some() {
            tracing::trace!(widget = self.panel.name(), "dropped wake covered by timer load");
        }
        self.signal.busy.store(false, Ordering::Release);
    }
}

/// Owner of a mounted widget. Dropping it unmounts.
pub struct WidgetHandle<T> {
    name: String,
    view_rx: watch::Receiver<WidgetView<T>>,
    signal: Arc<Signal>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    _subscriptions: Vec<Subscription>,
}

impl<T: Clone> WidgetHandle<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snapshot of the current view.
    pub fn view(&self) -> WidgetView<T> {
        self.view_rx.borrow().clone()
    }

    /// Wait for the next view update. Returns `false` once the widget is gone.
    pub async fn changed(&mut self) -> bool {
        self.view_rx.changed().await.is_ok()
    }

    /// A receiver that outlives the handle, for observers.
    pub fn watch(&self) -> watch::Receiver<WidgetView<T>> {
        self.view_rx.clone()
    }

    /// Ask for a load now, subject to the same coalescing as pushes.
    pub fn refresh(&self) -> Trigger {
        self.signal.trigger()
    }

    /// Stop the loop, release subscriptions and the timer, and wait for the
    /// task to finish. An in-flight load is abandoned and its result dropped.
    pub async fn unmount(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            tracing::warn!(widget = %self.name, error = %e, "widget task ended abnormally");
        }
    }
}

impl<T> Drop for WidgetHandle<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
