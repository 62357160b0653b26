//! Countdown task timing tests
//!
//! Run on a paused tokio clock so every timer fires at an exact virtual instant.

use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use lms_common::config::CountdownConfig;
use lms_common::{EventBus, LmsEvent, PaymentStatus, ResolutionSource};
use lms_pay::countdown::{Countdown, CountdownExit, CountdownHandle};
use lms_pay::navigation::{NavigationTarget, Navigator};
use lms_pay::payment::PaymentData;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{timeout, Instant};
use uuid::Uuid;

#[derive(Default)]
struct RecordingNavigator {
    resolved: Mutex<Vec<PaymentStatus>>,
    navigations: Mutex<Vec<(NavigationTarget, PaymentStatus, Instant)>>,
}

impl Navigator for RecordingNavigator {
    fn resolved<'a>(
        &'a self,
        _dialog_id: Uuid,
        _target: &'a NavigationTarget,
        status: &'a PaymentStatus,
    ) -> BoxFuture<'a, ()> {
        self.resolved.lock().unwrap().push(status.clone());
        futures::future::ready(()).boxed()
    }

    fn navigate<'a>(
        &'a self,
        _dialog_id: Uuid,
        target: &'a NavigationTarget,
        status: &'a PaymentStatus,
    ) -> BoxFuture<'a, ()> {
        self.navigations
            .lock()
            .unwrap()
            .push((*target, status.clone(), Instant::now()));
        futures::future::ready(()).boxed()
    }
}

struct Harness {
    handle: CountdownHandle,
    status_tx: mpsc::Sender<PaymentStatus>,
    navigator: Arc<RecordingNavigator>,
    events: broadcast::Receiver<LmsEvent>,
    target: NavigationTarget,
}

fn start(expires_in_ms: i64) -> Harness {
    let event_bus = EventBus::new(256);
    let events = event_bus.subscribe();
    let navigator = Arc::new(RecordingNavigator::default());
    let target = NavigationTarget::Book {
        resource_id: Uuid::new_v4(),
    };
    let (status_tx, status_rx) = mpsc::channel(16);

    let handle = Countdown {
        dialog_id: Uuid::new_v4(),
        payment: PaymentData {
            payment_link: "https://pay.example/qr/42".to_string(),
            expired_at: Utc::now() + chrono::Duration::milliseconds(expires_in_ms),
        },
        config: CountdownConfig::default(),
        target,
        navigator: navigator.clone(),
        event_bus,
    }
    .spawn(status_rx);

    Harness {
        handle,
        status_tx,
        navigator,
        events,
        target,
    }
}

fn drain(events: &mut broadcast::Receiver<LmsEvent>) -> Vec<LmsEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

#[tokio::test(start_paused = true)]
async fn test_past_deadline_expires_within_one_tick() {
    let harness = start(-30_000);
    let mut states = harness.handle.subscribe();

    timeout(Duration::from_secs(1), states.wait_for(|s| s.can_navigate))
        .await
        .expect("resolved within one tick")
        .unwrap();

    let snapshot = harness.handle.states();
    assert_eq!(snapshot.status, PaymentStatus::Expired);
    assert_eq!(snapshot.resolved_by, Some(ResolutionSource::Clock));
    assert_eq!(snapshot.left_time_ms, 0);
}

#[tokio::test(start_paused = true)]
async fn test_expiry_then_navigation_five_seconds_later() {
    let Harness {
        handle,
        status_tx,
        navigator,
        target,
        ..
    } = start(5_000);
    let started = Instant::now();

    let exit = handle.wait().await;
    assert_eq!(exit, CountdownExit::Navigated(PaymentStatus::Expired));

    let navigations = navigator.navigations.lock().unwrap();
    assert_eq!(navigations.len(), 1);
    let (nav_target, status, at) = &navigations[0];
    assert_eq!(*nav_target, target);
    assert_eq!(*status, PaymentStatus::Expired);
    assert_eq!(at.duration_since(started), Duration::from_secs(10));
    assert_eq!(*navigator.resolved.lock().unwrap(), vec![PaymentStatus::Expired]);

    // Hub subscription side of the channel sees the countdown is gone
    assert!(status_tx.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_hub_status_resolves_and_navigation_counts_down() {
    let mut harness = start(60_000);
    tokio::time::sleep(Duration::from_millis(2_500)).await;

    harness.status_tx.send(PaymentStatus::Pending).await.unwrap();
    harness.status_tx.send(PaymentStatus::Paid).await.unwrap();
    harness.status_tx.send(PaymentStatus::Paid).await.unwrap();
    let resolved_at = Instant::now();

    let exit = harness.handle.wait().await;
    assert_eq!(exit, CountdownExit::Navigated(PaymentStatus::Paid));

    let events = drain(&mut harness.events);
    let resolutions: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            LmsEvent::PaymentResolved {
                status, resolved_by, ..
            } => Some((status.clone(), *resolved_by)),
            _ => None,
        })
        .collect();
    assert_eq!(resolutions, vec![(PaymentStatus::Paid, ResolutionSource::Hub)]);

    let grace: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            LmsEvent::PaymentCountdown {
                can_navigate: true,
                navigate_countdown_seconds,
                ..
            } => Some(*navigate_countdown_seconds),
            _ => None,
        })
        .collect();
    assert_eq!(grace, vec![5, 4, 3, 2, 1, 0]);

    let navigations = harness.navigator.navigations.lock().unwrap();
    assert_eq!(navigations.len(), 1);
    assert_eq!(navigations[0].2.duration_since(resolved_at), Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_late_paid_after_clock_expiry_is_recorded_not_applied() {
    let harness = start(1_000);
    let mut states = harness.handle.subscribe();

    states.wait_for(|s| s.can_navigate).await.unwrap();
    harness.status_tx.send(PaymentStatus::Paid).await.unwrap();
    states
        .wait_for(|s| s.conflicting_status.is_some())
        .await
        .unwrap();

    let snapshot = harness.handle.states();
    assert_eq!(snapshot.status, PaymentStatus::Expired);
    assert_eq!(snapshot.conflicting_status, Some(PaymentStatus::Paid));
    assert!(snapshot.can_navigate);

    let exit = harness.handle.wait().await;
    assert_eq!(exit, CountdownExit::Navigated(PaymentStatus::Expired));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_all_mutation() {
    let mut harness = start(3_000);
    tokio::time::sleep(Duration::from_millis(1_500)).await;

    let before = harness.handle.states();
    let mut states = harness.handle.subscribe();
    let exit = harness.handle.shutdown().await;
    assert_eq!(exit, CountdownExit::Cancelled);

    // Timers would have expired and navigated by now
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert!(harness.status_tx.send(PaymentStatus::Paid).await.is_err());
    assert_eq!(*states.borrow_and_update(), before);
    assert!(!before.can_navigate);

    let late = drain(&mut harness.events);
    assert!(late.iter().all(|e| !matches!(
        e,
        LmsEvent::PaymentResolved { .. } | LmsEvent::NavigationRequested { .. }
    )));
    assert!(harness.navigator.navigations.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_clock_keeps_running_without_hub() {
    let harness = start(2_000);
    drop(harness.status_tx);

    let exit = harness.handle.wait().await;
    assert_eq!(exit, CountdownExit::Navigated(PaymentStatus::Expired));
}
