//! Payment dialogs
//!
//! A dialog walks `FORM → AWAITING_PAYMENT → RESOLVED → NAVIGATED`, and can be
//! closed from any phase. While awaiting, it owns one countdown task and one
//! hub status subscriber; closing stops the countdown first, then the
//! subscriber.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::BackendClient;
use crate::countdown::{Countdown, CountdownHandle, PaymentStates};
use crate::error::{Error, Result};
use crate::hub::{HubClient, StatusSubscriber};
use crate::navigation::Navigator;
use crate::payment::{
    InitiatorOutcome, PaymentData, PaymentField, PaymentMethod, PaymentMethodSelector,
    TransactionInitiator, TransactionKind,
};
use lms_common::api::{ErrorKind, FormErrors, FormErrorsView};
use lms_common::config::CountdownConfig;
use lms_common::time::format_countdown;
use lms_common::{EventBus, LmsEvent, PaymentStatus, ResolutionSource, SessionContext};

/// Capacity of the hub → countdown status channel
const STATUS_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DialogPhase {
    Form,
    AwaitingPayment,
    Resolved,
    Navigated,
    Closed,
}

/// Services a dialog needs
#[derive(Clone)]
pub struct DialogDeps {
    pub backend: Arc<BackendClient>,
    pub hub: HubClient,
    pub session: SessionContext,
    pub event_bus: EventBus,
    pub navigator: Arc<dyn Navigator>,
    pub countdown: CountdownConfig,
}

/// Countdown part of a dialog view
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentView {
    pub payment_link: String,
    pub expired_at: chrono::DateTime<chrono::Utc>,
    pub left_time_ms: i64,
    pub left_time_display: String,
    pub can_navigate: bool,
    pub navigate_countdown_seconds: u32,
    pub status: PaymentStatus,
    pub resolved_by: Option<ResolutionSource>,
    pub conflicting_status: Option<PaymentStatus>,
    pub navigation_target: String,
}

/// Serializable snapshot of a dialog
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogView {
    pub id: Uuid,
    #[serde(flatten)]
    pub kind: TransactionKind,
    pub phase: DialogPhase,
    pub payment_methods: Vec<PaymentMethod>,
    pub selected_method_id: Option<String>,
    pub errors: FormErrorsView,
    /// Success message of a transaction settled without payment
    pub notice: Option<String>,
    pub payment: Option<PaymentView>,
}

struct AwaitingPayment {
    data: PaymentData,
    countdown: CountdownHandle,
    subscriber: StatusSubscriber,
}

/// One borrow or extend payment flow
pub struct PaymentDialog {
    id: Uuid,
    kind: TransactionKind,
    methods: PaymentMethodSelector,
    form: FormErrors<PaymentField>,
    initiator: TransactionInitiator,
    deps: DialogDeps,
    awaiting: Option<AwaitingPayment>,
    /// Payment and last countdown snapshot, kept after teardown
    last_payment: Option<PaymentData>,
    last_states: Option<PaymentStates>,
    notice: Option<String>,
    closed: bool,
}

impl PaymentDialog {
    /// Open a dialog in `FORM`, loading the payment methods
    ///
    /// Fails when signed out. A failed method listing leaves the list empty
    /// and shows a toast; the backend still validates the submitted id.
    pub async fn open(kind: TransactionKind, deps: DialogDeps) -> Result<Self> {
        deps.session.require_token()?;

        let mut form = FormErrors::new();
        let methods = match PaymentMethodSelector::load(&deps.backend, &deps.session).await {
            Ok(methods) => methods,
            Err(e @ Error::Common(lms_common::Error::Unauthenticated(_))) => return Err(e),
            Err(e) => {
                warn!(kind = kind.name(), "Could not load payment methods: {}", e);
                form.set_toast("Payment methods are unavailable right now");
                PaymentMethodSelector::default()
            }
        };

        let id = Uuid::new_v4();
        info!(dialog_id = %id, kind = kind.name(), "Payment dialog opened");
        deps.event_bus.emit_lossy(LmsEvent::DialogOpened {
            dialog_id: id,
            kind: kind.name().to_string(),
            timestamp: chrono::Utc::now(),
        });

        Ok(Self {
            id,
            kind,
            methods,
            form,
            initiator: TransactionInitiator::new(deps.backend.clone(), deps.session.clone()),
            deps,
            awaiting: None,
            last_payment: None,
            last_states: None,
            notice: None,
            closed: false,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> DialogPhase {
        if self.closed {
            return DialogPhase::Closed;
        }
        match self.awaiting.as_ref().map(|a| a.countdown.states()) {
            None => DialogPhase::Form,
            Some(states) if states.navigated => DialogPhase::Navigated,
            Some(states) if states.can_navigate => DialogPhase::Resolved,
            Some(_) => DialogPhase::AwaitingPayment,
        }
    }

    /// Submit the form once
    pub async fn submit(&mut self, payment_method_id: Option<String>) -> Result<()> {
        let phase = self.phase();
        if phase != DialogPhase::Form {
            return Err(Error::InvalidState(format!(
                "Dialog {} cannot be submitted in phase {:?}",
                self.id, phase
            )));
        }

        let method_id = payment_method_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());

        if let Some(id) = method_id.as_deref() {
            if !self.methods.methods().is_empty() && self.methods.select(id).is_err() {
                self.form.clear();
                self.form.set(PaymentField::PaymentMethodId, ErrorKind::Invalid);
                self.form.set_toast("Please choose one of the listed payment methods");
                return Ok(());
            }
        } else {
            self.methods.clear();
        }

        let outcome = self
            .initiator
            .submit(&self.kind, method_id.as_deref(), &mut self.form)
            .await?;

        match outcome {
            InitiatorOutcome::AwaitPayment(data) => self.start_countdown(data),
            InitiatorOutcome::Completed { message } => {
                self.notice = Some(message);
                self.close("completed").await;
            }
            InitiatorOutcome::Rejected => {}
        }
        Ok(())
    }

    fn start_countdown(&mut self, data: PaymentData) {
        let (status_tx, status_rx) = mpsc::channel(STATUS_CHANNEL_CAPACITY);

        let subscriber = StatusSubscriber::spawn(
            self.deps.hub.clone(),
            self.deps.session.watch_token(),
            status_tx,
            self.deps.event_bus.clone(),
        );

        let countdown = Countdown {
            dialog_id: self.id,
            payment: data.clone(),
            config: self.deps.countdown.clone(),
            target: self.kind.navigation_target(),
            navigator: self.deps.navigator.clone(),
            event_bus: self.deps.event_bus.clone(),
        }
        .spawn(status_rx);

        info!(dialog_id = %self.id, expired_at = %data.expired_at, "Awaiting payment");
        self.deps.event_bus.emit_lossy(LmsEvent::PaymentAwaiting {
            dialog_id: self.id,
            payment_link: data.payment_link.clone(),
            expired_at: data.expired_at,
            timestamp: chrono::Utc::now(),
        });

        self.awaiting = Some(AwaitingPayment {
            data,
            countdown,
            subscriber,
        });
    }

    /// Close the dialog; idempotent
    pub async fn close(&mut self, reason: &str) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Some(awaiting) = self.awaiting.take() {
            self.last_states = Some(awaiting.countdown.states());
            awaiting.countdown.shutdown().await;
            awaiting.subscriber.shutdown().await;
            self.last_payment = Some(awaiting.data);
        }

        info!(dialog_id = %self.id, reason, "Payment dialog closed");
        self.deps.event_bus.emit_lossy(LmsEvent::DialogClosed {
            dialog_id: self.id,
            reason: reason.to_string(),
            timestamp: chrono::Utc::now(),
        });
    }

    pub fn view(&self) -> DialogView {
        let payment = match &self.awaiting {
            Some(awaiting) => Some(self.payment_view(&awaiting.data, &awaiting.countdown.states())),
            None => match (&self.last_payment, &self.last_states) {
                (Some(data), Some(states)) => Some(self.payment_view(data, states)),
                _ => None,
            },
        };

        DialogView {
            id: self.id,
            kind: self.kind,
            phase: self.phase(),
            payment_methods: self.methods.methods().to_vec(),
            selected_method_id: self.methods.selected().map(|m| m.id.clone()),
            errors: self.form.view(),
            notice: self.notice.clone(),
            payment,
        }
    }

    fn payment_view(&self, data: &PaymentData, states: &PaymentStates) -> PaymentView {
        PaymentView {
            payment_link: data.payment_link.clone(),
            expired_at: data.expired_at,
            left_time_ms: states.left_time_ms,
            left_time_display: format_countdown(states.left_time_ms),
            can_navigate: states.can_navigate,
            navigate_countdown_seconds: states.navigate_countdown_seconds,
            status: states.status.clone(),
            resolved_by: states.resolved_by,
            conflicting_status: states.conflicting_status.clone(),
            navigation_target: self.kind.navigation_target().path(),
        }
    }
}

/// Open dialogs keyed by id
pub struct DialogRegistry {
    dialogs: RwLock<HashMap<Uuid, Arc<Mutex<PaymentDialog>>>>,
    deps: DialogDeps,
}

impl DialogRegistry {
    pub fn new(deps: DialogDeps) -> Self {
        Self {
            dialogs: RwLock::new(HashMap::new()),
            deps,
        }
    }

    pub async fn open(&self, kind: TransactionKind) -> Result<DialogView> {
        self.prune().await;

        let dialog = PaymentDialog::open(kind, self.deps.clone()).await?;
        let view = dialog.view();
        self.dialogs
            .write()
            .await
            .insert(dialog.id(), Arc::new(Mutex::new(dialog)));
        Ok(view)
    }

    pub async fn get(&self, id: Uuid) -> Result<DialogView> {
        let dialog = self.lookup(id).await?;
        let view = dialog.lock().await.view();
        Ok(view)
    }

    /// Submit; a dialog closed by the submission leaves the registry
    pub async fn submit(&self, id: Uuid, payment_method_id: Option<String>) -> Result<DialogView> {
        let dialog = self.lookup(id).await?;
        let view = {
            let mut dialog = dialog.lock().await;
            dialog.submit(payment_method_id).await?;
            dialog.view()
        };

        if view.phase == DialogPhase::Closed {
            self.dialogs.write().await.remove(&id);
        }
        Ok(view)
    }

    pub async fn close(&self, id: Uuid) -> Result<DialogView> {
        let dialog = self
            .dialogs
            .write()
            .await
            .remove(&id)
            .ok_or(Error::DialogNotFound(id))?;

        let mut dialog = dialog.lock().await;
        dialog.close("closed").await;
        Ok(dialog.view())
    }

    /// Close every dialog (logout, shutdown)
    pub async fn close_all(&self, reason: &str) -> usize {
        let dialogs: Vec<_> = self.dialogs.write().await.drain().map(|(_, d)| d).collect();
        for dialog in &dialogs {
            dialog.lock().await.close(reason).await;
        }
        dialogs.len()
    }

    pub async fn len(&self) -> usize {
        self.dialogs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.dialogs.read().await.is_empty()
    }

    async fn lookup(&self, id: Uuid) -> Result<Arc<Mutex<PaymentDialog>>> {
        self.dialogs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(Error::DialogNotFound(id))
    }

    /// Drop dialogs whose countdown already navigated away
    async fn prune(&self) {
        let mut finished = Vec::new();
        {
            let dialogs = self.dialogs.read().await;
            for (id, dialog) in dialogs.iter() {
                if let Ok(dialog) = dialog.try_lock() {
                    if dialog.phase() == DialogPhase::Navigated {
                        finished.push(*id);
                    }
                }
            }
        }
        if finished.is_empty() {
            return;
        }

        let removed: Vec<_> = {
            let mut dialogs = self.dialogs.write().await;
            finished.iter().filter_map(|id| dialogs.remove(id)).collect()
        };
        for dialog in removed {
            dialog.lock().await.close("navigated").await;
        }
    }
}
