//! Status subscriber: keeps one hub connection alive for the current token
//!
//! - token present: connected with that token
//! - token changed: disconnect, then reconnect with the new token
//! - token cleared: disconnect only
//!
//! A failed connection attempt is logged and not retried; the countdown clock
//! still resolves the dialog.

use std::future::pending;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::client::{HubClient, HubConnection};
use lms_common::{EventBus, LmsEvent, PaymentStatus};

enum Step {
    Stop,
    TokenChanged,
    ConnectionEnded,
}

/// Handle to a running subscriber task
pub struct StatusSubscriber {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl StatusSubscriber {
    /// Start forwarding hub statuses into `status_tx`
    ///
    /// The task ends on `shutdown`, when the session's token sender goes
    /// away, or when `status_tx` is closed by its receiver.
    pub fn spawn(
        client: HubClient,
        token_rx: watch::Receiver<Option<String>>,
        status_tx: mpsc::Sender<PaymentStatus>,
        event_bus: EventBus,
    ) -> Self {
        let cancel = CancellationToken::new();
        let worker = Worker {
            client,
            token_rx,
            status_tx,
            event_bus,
            cancel: cancel.clone(),
            connection: None,
        };
        let task = tokio::spawn(worker.run());

        Self {
            cancel,
            task: Some(task),
        }
    }

    /// Disconnect and wait for the task to finish
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for StatusSubscriber {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Worker {
    client: HubClient,
    token_rx: watch::Receiver<Option<String>>,
    status_tx: mpsc::Sender<PaymentStatus>,
    event_bus: EventBus,
    cancel: CancellationToken,
    connection: Option<HubConnection>,
}

impl Worker {
    async fn run(mut self) {
        let token = self.token_rx.borrow_and_update().clone();
        self.apply_token(token).await;

        loop {
            let step = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Step::Stop,
                _ = self.status_tx.closed() => Step::Stop,
                changed = self.token_rx.changed() => match changed {
                    Ok(()) => Step::TokenChanged,
                    Err(_) => Step::Stop,
                },
                _ = connection_ended(self.connection.as_ref()) => Step::ConnectionEnded,
            };

            match step {
                Step::Stop => break,
                Step::TokenChanged => {
                    let token = self.token_rx.borrow_and_update().clone();
                    self.apply_token(token).await;
                }
                Step::ConnectionEnded => {
                    self.connection = None;
                    self.publish(false);
                }
            }
        }

        self.disconnect().await;
        debug!("Status subscriber stopped");
    }

    async fn apply_token(&mut self, token: Option<String>) {
        self.disconnect().await;

        let Some(token) = token else {
            info!("No access token, hub subscription idle");
            return;
        };

        match self.client.connect(&token, self.status_tx.clone()).await {
            Ok(connection) => {
                self.connection = Some(connection);
                self.publish(true);
            }
            Err(e) => {
                warn!("Payment hub connection failed, relying on expiry clock: {}", e);
            }
        }
    }

    async fn disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.disconnect().await;
            self.publish(false);
        }
    }

    fn publish(&self, connected: bool) {
        self.event_bus.emit_lossy(LmsEvent::HubConnectionChanged {
            connected,
            timestamp: chrono::Utc::now(),
        });
    }
}

async fn connection_ended(connection: Option<&HubConnection>) {
    match connection {
        Some(connection) => connection.ended().await,
        None => pending().await,
    }
}
