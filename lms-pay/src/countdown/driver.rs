//! Countdown task: owns one dialog's `PaymentStates`
//!
//! A single task selects over cancellation, the expiry timer, hub statuses and
//! the navigation timer, feeding each signal through the reducer. Snapshots
//! are published on a `watch` channel and as `PaymentCountdown` events.
//!
//! The navigation timer is armed when the payment resolves, so its first tick
//! lands one period after resolution.

use chrono::Utc;
use std::future::pending;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::state::{CountdownEvent, PaymentStates, Transition};
use crate::navigation::{NavigationTarget, Navigator};
use crate::payment::PaymentData;
use lms_common::config::CountdownConfig;
use lms_common::time::{millis_until, now};
use lms_common::{EventBus, LmsEvent, PaymentStatus};

/// How the countdown task ended
#[derive(Debug, Clone, PartialEq)]
pub enum CountdownExit {
    /// Grace countdown finished and navigation was performed
    Navigated(PaymentStatus),
    /// Closed before navigation
    Cancelled,
}

/// Countdown for one awaiting dialog
pub struct Countdown {
    pub dialog_id: Uuid,
    pub payment: PaymentData,
    pub config: CountdownConfig,
    pub target: NavigationTarget,
    pub navigator: Arc<dyn Navigator>,
    pub event_bus: EventBus,
}

impl Countdown {
    /// Start the countdown task
    ///
    /// `status_rx` carries hub statuses; the countdown keeps running on the
    /// clock alone once it is closed.
    pub fn spawn(self, status_rx: mpsc::Receiver<PaymentStatus>) -> CountdownHandle {
        let initial_left_ms = millis_until(self.payment.expired_at, now());
        let states = PaymentStates::new(initial_left_ms, self.config.navigate_grace_seconds);
        let (states_tx, states_rx) = watch::channel(states.clone());
        let cancel = CancellationToken::new();

        let runner = Runner {
            countdown: self,
            states,
            states_tx,
            status_rx: Some(status_rx),
            initial_left_ms,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(runner.run());

        CountdownHandle {
            states: states_rx,
            cancel,
            task: Some(task),
        }
    }
}

/// Handle owned by the dialog
///
/// Dropping the handle cancels the task.
pub struct CountdownHandle {
    states: watch::Receiver<PaymentStates>,
    cancel: CancellationToken,
    task: Option<JoinHandle<CountdownExit>>,
}

impl CountdownHandle {
    /// Latest snapshot
    pub fn states(&self) -> PaymentStates {
        self.states.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PaymentStates> {
        self.states.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }

    /// Cancel and wait for the task to stop
    pub async fn shutdown(mut self) -> CountdownExit {
        self.cancel.cancel();
        self.join().await
    }

    /// Wait for the task to end on its own
    pub async fn wait(mut self) -> CountdownExit {
        self.join().await
    }

    async fn join(&mut self) -> CountdownExit {
        match self.task.take() {
            Some(task) => task.await.unwrap_or(CountdownExit::Cancelled),
            None => CountdownExit::Cancelled,
        }
    }
}

impl Drop for CountdownHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Runner {
    countdown: Countdown,
    states: PaymentStates,
    states_tx: watch::Sender<PaymentStates>,
    status_rx: Option<mpsc::Receiver<PaymentStatus>>,
    initial_left_ms: i64,
    cancel: CancellationToken,
}

impl Runner {
    async fn run(mut self) -> CountdownExit {
        let period = self.countdown.config.tick();
        let started = Instant::now();
        let mut expiry = interval(period);
        expiry.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut nav: Option<Interval> = None;
        let dialog_id = self.countdown.dialog_id;

        debug!(%dialog_id, left_ms = self.initial_left_ms, "Countdown started");

        loop {
            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!(%dialog_id, "Countdown cancelled");
                    return CountdownExit::Cancelled;
                }
                _ = expiry.tick(), if !self.states.can_navigate => {
                    let elapsed = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
                    CountdownEvent::ExpiryTick {
                        left_time_ms: self.initial_left_ms.saturating_sub(elapsed),
                    }
                }
                status = next_status(self.status_rx.as_mut()) => match status {
                    Some(status) => CountdownEvent::SocketStatus(status),
                    None => {
                        debug!(%dialog_id, "Hub status channel closed");
                        self.status_rx = None;
                        continue;
                    }
                },
                _ = next_tick(nav.as_mut()) => CountdownEvent::NavTick,
            };

            match self.states.reduce(event) {
                Transition::Unchanged => {}
                Transition::Updated => self.publish(),
                Transition::Resolved { status, source } => {
                    info!(%dialog_id, %status, resolved_by = ?source, "Payment resolved");
                    nav = Some(interval_at(Instant::now() + period, period));
                    self.publish();
                    self.countdown.event_bus.emit_lossy(LmsEvent::PaymentResolved {
                        dialog_id,
                        status: status.clone(),
                        resolved_by: source,
                        timestamp: Utc::now(),
                    });
                    self.countdown
                        .navigator
                        .resolved(dialog_id, &self.countdown.target, &status)
                        .await;
                }
                Transition::Conflict { kept, ignored } => {
                    warn!(%dialog_id, %kept, %ignored, "Ignoring conflicting payment status");
                    self.publish();
                    self.countdown.event_bus.emit_lossy(LmsEvent::PaymentStatusConflict {
                        dialog_id,
                        kept,
                        ignored,
                        timestamp: Utc::now(),
                    });
                }
                Transition::Navigate => {
                    self.publish();
                    let status = self.states.status.clone();
                    self.countdown
                        .navigator
                        .navigate(dialog_id, &self.countdown.target, &status)
                        .await;
                    return CountdownExit::Navigated(status);
                }
            }
        }
    }

    fn publish(&self) {
        self.states_tx.send_replace(self.states.clone());
        self.countdown.event_bus.emit_lossy(LmsEvent::PaymentCountdown {
            dialog_id: self.countdown.dialog_id,
            left_time_ms: self.states.left_time_ms,
            navigate_countdown_seconds: self.states.navigate_countdown_seconds,
            status: self.states.status.clone(),
            can_navigate: self.states.can_navigate,
            timestamp: Utc::now(),
        });
    }
}

async fn next_status(rx: Option<&mut mpsc::Receiver<PaymentStatus>>) -> Option<PaymentStatus> {
    match rx {
        Some(rx) => rx.recv().await,
        None => pending().await,
    }
}

async fn next_tick(nav: Option<&mut Interval>) {
    match nav {
        Some(nav) => {
            nav.tick().await;
        }
        None => pending().await,
    }
}
