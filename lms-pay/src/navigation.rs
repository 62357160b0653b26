//! Post-payment navigation
//!
//! The service has no browser of its own: navigating means publishing a
//! `NavigationRequested` event the UI follows. Tests plug in their own
//! `Navigator` to observe calls.

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use lms_common::{EventBus, LmsEvent, PaymentStatus, SessionContext};

/// Page shown after a payment dialog settles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "page", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum NavigationTarget {
    /// Book detail page (borrow flow)
    Book { resource_id: Uuid },
    /// Borrow record page (extend flow)
    BorrowRecord { borrow_record_id: Uuid },
}

impl NavigationTarget {
    pub fn path(&self) -> String {
        match self {
            NavigationTarget::Book { resource_id } => format!("/books/{}", resource_id),
            NavigationTarget::BorrowRecord { borrow_record_id } => {
                format!("/borrow-records/{}", borrow_record_id)
            }
        }
    }
}

/// Receives countdown milestones for one dialog
pub trait Navigator: Send + Sync {
    /// Payment reached its first terminal status
    fn resolved<'a>(
        &'a self,
        _dialog_id: Uuid,
        _target: &'a NavigationTarget,
        _status: &'a PaymentStatus,
    ) -> BoxFuture<'a, ()> {
        futures::future::ready(()).boxed()
    }

    /// Grace countdown reached zero; called at most once per dialog
    fn navigate<'a>(
        &'a self,
        dialog_id: Uuid,
        target: &'a NavigationTarget,
        status: &'a PaymentStatus,
    ) -> BoxFuture<'a, ()>;
}

/// Navigator used by the service: updates the session and notifies the UI
#[derive(Clone)]
pub struct BusNavigator {
    event_bus: EventBus,
    session: SessionContext,
}

impl BusNavigator {
    pub fn new(event_bus: EventBus, session: SessionContext) -> Self {
        Self { event_bus, session }
    }
}

impl Navigator for BusNavigator {
    fn resolved<'a>(
        &'a self,
        _dialog_id: Uuid,
        target: &'a NavigationTarget,
        status: &'a PaymentStatus,
    ) -> BoxFuture<'a, ()> {
        async move {
            if let (PaymentStatus::Paid, NavigationTarget::Book { resource_id }) = (status, target) {
                self.session.mark_borrowed(*resource_id).await;
            }
        }
        .boxed()
    }

    fn navigate<'a>(
        &'a self,
        dialog_id: Uuid,
        target: &'a NavigationTarget,
        status: &'a PaymentStatus,
    ) -> BoxFuture<'a, ()> {
        async move {
            let path = target.path();
            info!(%dialog_id, %status, %path, "Navigating after payment");
            self.event_bus.emit_lossy(LmsEvent::NavigationRequested {
                dialog_id,
                target: path,
                timestamp: chrono::Utc::now(),
            });
        }
        .boxed()
    }
}
