//! Generic form-error binder
//!
//! Holds the error state a form displays: one message per field plus an optional
//! toast. Every submission result is bound through [`FormErrors::bind`], which
//! clears the previous errors first so stale messages never survive a resubmit.

use super::types::{ActionOutcome, ErrorKind, FieldErrors, FormField};
use serde::Serialize;
use std::collections::BTreeMap;

/// Default toast when the backend rejects fields without a message
const INVALID_FORM_TOAST: &str = "Please correct the highlighted fields";

/// Error state of one form
#[derive(Debug, Clone, PartialEq)]
pub struct FormErrors<F: FormField> {
    fields: BTreeMap<F, ErrorKind>,
    toast: Option<String>,
}

/// Serializable snapshot of [`FormErrors`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormErrorsView {
    /// Wire field name → message
    pub fields: BTreeMap<String, String>,
    pub toast: Option<String>,
}

impl<F: FormField> Default for FormErrors<F> {
    fn default() -> Self {
        Self {
            fields: BTreeMap::new(),
            toast: None,
        }
    }
}

impl<F: FormField> FormErrors<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an action outcome onto the form
    ///
    /// Returns the success payload, or `None` after recording field errors
    /// and/or a toast.
    pub fn bind<T>(&mut self, outcome: ActionOutcome<T, F>) -> Option<T> {
        self.clear();
        match outcome {
            ActionOutcome::Ok(data) => Some(data),
            ActionOutcome::Invalid { errors, message } => {
                self.apply(&errors);
                let toast = match (message, errors.unmapped().first()) {
                    (Some(message), _) => message,
                    // Errors for fields the form does not render still need to reach the user
                    (None, Some((_, kind))) => kind.message(),
                    (None, None) => INVALID_FORM_TOAST.to_string(),
                };
                self.toast = Some(toast);
                None
            }
            ActionOutcome::Failed { message } => {
                self.toast = Some(message);
                None
            }
        }
    }

    /// Record a locally detected field error
    pub fn set(&mut self, field: F, kind: ErrorKind) {
        self.fields.insert(field, kind);
    }

    pub fn set_toast(&mut self, message: impl Into<String>) {
        self.toast = Some(message.into());
    }

    pub fn error_for(&self, field: F) -> Option<&ErrorKind> {
        self.fields.get(&field)
    }

    pub fn toast(&self) -> Option<&str> {
        self.toast.as_deref()
    }

    pub fn has_errors(&self) -> bool {
        !self.fields.is_empty()
    }

    pub fn clear(&mut self) {
        self.fields.clear();
        self.toast = None;
    }

    pub fn view(&self) -> FormErrorsView {
        FormErrorsView {
            fields: self
                .fields
                .iter()
                .map(|(field, kind)| (field.wire_name().to_string(), kind.message()))
                .collect(),
            toast: self.toast.clone(),
        }
    }

    fn apply(&mut self, errors: &FieldErrors<F>) {
        for (field, kind) in errors.iter() {
            self.fields.insert(*field, kind.clone());
        }
    }
}
