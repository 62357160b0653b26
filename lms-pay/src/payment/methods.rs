//! Payment method listing and selection

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::BackendClient;
use crate::error::{Error, Result};
use lms_common::SessionContext;

/// Payment method offered by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethod {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Holds the active payment methods and at most one selection
#[derive(Debug, Clone, Default)]
pub struct PaymentMethodSelector {
    methods: Vec<PaymentMethod>,
    selected: Option<String>,
}

impl PaymentMethodSelector {
    /// Build from a backend listing, dropping inactive methods
    pub fn from_methods(methods: Vec<PaymentMethod>) -> Self {
        let methods: Vec<PaymentMethod> = methods.into_iter().filter(|m| m.is_active).collect();
        Self {
            methods,
            selected: None,
        }
    }

    /// Fetch the listing for the current session
    pub async fn load(backend: &BackendClient, session: &SessionContext) -> Result<Self> {
        let token = session.require_token()?;
        let methods = backend.list_payment_methods(&token).await?;
        debug!(count = methods.len(), "Loaded payment methods");
        Ok(Self::from_methods(methods))
    }

    pub fn methods(&self) -> &[PaymentMethod] {
        &self.methods
    }

    /// Select a method by id
    pub fn select(&mut self, id: &str) -> Result<&PaymentMethod> {
        let method = self
            .methods
            .iter()
            .find(|m| m.id == id)
            .ok_or_else(|| Error::BadRequest(format!("Unknown payment method: {}", id)))?;
        self.selected = Some(method.id.clone());
        Ok(method)
    }

    pub fn selected(&self) -> Option<&PaymentMethod> {
        let id = self.selected.as_deref()?;
        self.methods.iter().find(|m| m.id == id)
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }
}
