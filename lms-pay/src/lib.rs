//! lms-pay library - payment confirmation for digital borrows
//!
//! Drives the borrow/extend payment dialogs: transaction creation against the
//! library backend, realtime status from the payment hub, and the local
//! expiry/navigation countdown. Also hosts return reconciliation.

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod backend;
pub mod countdown;
pub mod dialog;
pub mod error;
pub mod hub;
pub mod navigation;
pub mod payment;
pub mod returns;

pub use error::{Error, Result};

use backend::BackendClient;
use dialog::{DialogDeps, DialogRegistry};
use hub::HubClient;
use lms_common::config::TomlConfig;
use lms_common::{EventBus, SessionContext};
use navigation::BusNavigator;
use returns::ReturnRegistry;

/// EventBus capacity
const EVENT_BUS_CAPACITY: usize = 1000;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub session: SessionContext,
    pub event_bus: EventBus,
    pub backend: Arc<BackendClient>,
    pub dialogs: Arc<DialogRegistry>,
    pub returns: Arc<ReturnRegistry>,
}

impl AppState {
    /// Build state from bootstrap configuration
    pub fn new(config: &TomlConfig) -> Result<Self> {
        let backend = Arc::new(BackendClient::new(&config.backend_url)?);
        let hub = HubClient::new(config)?;
        Ok(Self::from_parts(backend, hub, config))
    }

    pub fn from_parts(backend: Arc<BackendClient>, hub: HubClient, config: &TomlConfig) -> Self {
        let session = SessionContext::new();
        let event_bus = EventBus::new(EVENT_BUS_CAPACITY);
        let navigator = Arc::new(BusNavigator::new(event_bus.clone(), session.clone()));

        let deps = DialogDeps {
            backend: backend.clone(),
            hub,
            session: session.clone(),
            event_bus: event_bus.clone(),
            navigator,
            countdown: config.countdown.clone(),
        };

        Self {
            session,
            event_bus,
            backend,
            dialogs: Arc::new(DialogRegistry::new(deps)),
            returns: Arc::new(ReturnRegistry::new()),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::session_routes())
        .merge(api::payment_method_routes())
        .merge(api::dialog_routes())
        .merge(api::return_routes())
        .route("/api/events", get(api::event_stream))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
