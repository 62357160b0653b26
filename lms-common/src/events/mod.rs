//! Event types for the LMS event system
//!
//! Provides shared event definitions and the EventBus used by LMS services.
//! Events are broadcast in-process and serialized for SSE transmission to the browser.

mod payment_types;

pub use payment_types::{PaymentStatus, ResolutionSource};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// LMS event types
///
/// All dialog and session notifications use this central enum so consumers can
/// match exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum LmsEvent {
    /// Access token set, refreshed or cleared
    SessionChanged {
        authenticated: bool,
        timestamp: DateTime<Utc>,
    },

    /// A payment dialog was opened (phase FORM)
    DialogOpened {
        dialog_id: Uuid,
        /// Dialog kind (`borrowDigital` / `extendDigitalBorrow`)
        kind: String,
        timestamp: DateTime<Utc>,
    },

    /// Backend created a transaction that needs payment
    ///
    /// Triggers:
    /// - UI: replace the form with the payment link/QR and countdown
    PaymentAwaiting {
        dialog_id: Uuid,
        payment_link: String,
        expired_at: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    /// Countdown state after a timer tick or hub event
    ///
    /// Only emitted when the state actually changed.
    PaymentCountdown {
        dialog_id: Uuid,
        left_time_ms: i64,
        navigate_countdown_seconds: u32,
        status: PaymentStatus,
        can_navigate: bool,
        timestamp: DateTime<Utc>,
    },

    /// Payment reached its first terminal status
    PaymentResolved {
        dialog_id: Uuid,
        status: PaymentStatus,
        resolved_by: ResolutionSource,
        timestamp: DateTime<Utc>,
    },

    /// A later terminal status disagreed with the resolved one and was ignored
    PaymentStatusConflict {
        dialog_id: Uuid,
        kept: PaymentStatus,
        ignored: PaymentStatus,
        timestamp: DateTime<Utc>,
    },

    /// Grace countdown finished, browser should follow `target`
    NavigationRequested {
        dialog_id: Uuid,
        target: String,
        timestamp: DateTime<Utc>,
    },

    /// Dialog closed (user, zero-cost completion, logout or navigation)
    DialogClosed {
        dialog_id: Uuid,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Realtime hub connected or disconnected
    HubConnectionChanged {
        connected: bool,
        timestamp: DateTime<Utc>,
    },
}

impl LmsEvent {
    /// SSE event name for this event
    pub fn event_type(&self) -> &'static str {
        match self {
            LmsEvent::SessionChanged { .. } => "SessionChanged",
            LmsEvent::DialogOpened { .. } => "DialogOpened",
            LmsEvent::PaymentAwaiting { .. } => "PaymentAwaiting",
            LmsEvent::PaymentCountdown { .. } => "PaymentCountdown",
            LmsEvent::PaymentResolved { .. } => "PaymentResolved",
            LmsEvent::PaymentStatusConflict { .. } => "PaymentStatusConflict",
            LmsEvent::NavigationRequested { .. } => "NavigationRequested",
            LmsEvent::DialogClosed { .. } => "DialogClosed",
            LmsEvent::HubConnectionChanged { .. } => "HubConnectionChanged",
        }
    }
}

/// Central event distribution bus
///
/// Thin wrapper over `tokio::sync::broadcast`. Slow subscribers lag and lose
/// the oldest events; emitters never block.
///
/// # Examples
///
/// ```
/// use lms_common::events::{EventBus, LmsEvent};
///
/// let event_bus = EventBus::new(100);
/// let _rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(LmsEvent::HubConnectionChanged {
///     connected: true,
///     timestamp: chrono::Utc::now(),
/// });
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LmsEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<LmsEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: LmsEvent,
    ) -> Result<usize, broadcast::error::SendError<LmsEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: LmsEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
