//! Transaction initiation for borrow and extend payments
//!
//! One submission calls the backend exactly once. The result is one of:
//! - payment required (`PaymentData` present): the dialog switches to the countdown
//! - completed without payment (zero-cost): success notice, dialog closes
//! - rejected: field errors and/or a toast are bound onto the form, the user resubmits

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::BackendClient;
use crate::error::{Error, Result};
use crate::navigation::NavigationTarget;
use lms_common::api::{ErrorKind, FormErrors, FormField};
use lms_common::SessionContext;

const NETWORK_FAILURE_TOAST: &str = "Could not reach the library service, please try again";
const SERVICE_FAILURE_TOAST: &str = "The library service could not process the request, please try again";
const INVALID_RESPONSE_TOAST: &str = "The library service returned an invalid response, please try again";

/// Fields of the payment form
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PaymentField {
    PaymentMethodId,
    ResourceId,
    BorrowRecordId,
}

impl FormField for PaymentField {
    const ALL: &'static [Self] = &[
        PaymentField::PaymentMethodId,
        PaymentField::ResourceId,
        PaymentField::BorrowRecordId,
    ];

    fn wire_name(&self) -> &'static str {
        match self {
            PaymentField::PaymentMethodId => "paymentMethodId",
            PaymentField::ResourceId => "resourceId",
            PaymentField::BorrowRecordId => "borrowRecordId",
        }
    }
}

/// Payment link and deadline issued by the backend
///
/// Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentData {
    #[serde(alias = "qrCode", alias = "paymentLinkOrQR")]
    pub payment_link: String,
    pub expired_at: DateTime<Utc>,
}

/// `data` of a transaction response
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionData {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub payment_data: Option<PaymentData>,
}

/// What a payment dialog pays for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TransactionKind {
    /// Borrow a digital resource
    BorrowDigital { resource_id: Uuid },
    /// Extend an existing digital borrow
    ExtendDigitalBorrow { borrow_record_id: Uuid },
}

impl TransactionKind {
    pub fn name(&self) -> &'static str {
        match self {
            TransactionKind::BorrowDigital { .. } => "borrowDigital",
            TransactionKind::ExtendDigitalBorrow { .. } => "extendDigitalBorrow",
        }
    }

    /// Page shown once the payment is settled
    pub fn navigation_target(&self) -> NavigationTarget {
        match *self {
            TransactionKind::BorrowDigital { resource_id } => NavigationTarget::Book { resource_id },
            TransactionKind::ExtendDigitalBorrow { borrow_record_id } => {
                NavigationTarget::BorrowRecord { borrow_record_id }
            }
        }
    }
}

/// Request body for `POST /api/borrows/digital`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowDigitalRequest {
    pub resource_id: Uuid,
    pub payment_method_id: String,
}

/// Request body for `POST /api/borrows/{id}/extend`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendBorrowRequest {
    pub payment_method_id: String,
}

/// Result of one submission
#[derive(Debug, Clone, PartialEq)]
pub enum InitiatorOutcome {
    /// Backend issued a payment link; start the countdown
    AwaitPayment(PaymentData),
    /// Settled without payment
    Completed { message: String },
    /// Errors were bound onto the form
    Rejected,
}

/// Submits borrow/extend transactions on behalf of a dialog
#[derive(Clone)]
pub struct TransactionInitiator {
    backend: Arc<BackendClient>,
    session: SessionContext,
}

impl TransactionInitiator {
    pub fn new(backend: Arc<BackendClient>, session: SessionContext) -> Self {
        Self { backend, session }
    }

    /// Submit once; never retries
    ///
    /// Returns `Err` only when the session has no token. Backend and network
    /// failures are bound onto `form` and reported as `Rejected`.
    pub async fn submit(
        &self,
        kind: &TransactionKind,
        payment_method_id: Option<&str>,
        form: &mut FormErrors<PaymentField>,
    ) -> Result<InitiatorOutcome> {
        let Some(payment_method_id) = payment_method_id.map(str::trim).filter(|id| !id.is_empty())
        else {
            form.clear();
            form.set(PaymentField::PaymentMethodId, ErrorKind::Required);
            form.set_toast("Please choose a payment method");
            return Ok(InitiatorOutcome::Rejected);
        };

        let token = self.session.require_token()?;

        let response = match *kind {
            TransactionKind::BorrowDigital { resource_id } => {
                let request = BorrowDigitalRequest {
                    resource_id,
                    payment_method_id: payment_method_id.to_string(),
                };
                self.backend.create_digital_borrow(&token, &request).await
            }
            TransactionKind::ExtendDigitalBorrow { borrow_record_id } => {
                let request = ExtendBorrowRequest {
                    payment_method_id: payment_method_id.to_string(),
                };
                self.backend
                    .extend_digital_borrow(&token, borrow_record_id, &request)
                    .await
            }
        };

        let outcome = match response {
            Ok(outcome) => outcome,
            Err(e @ (Error::Network(_) | Error::Backend(_) | Error::Protocol(_))) => {
                warn!(kind = kind.name(), "Transaction request failed: {}", e);
                let toast = match e {
                    Error::Network(_) => NETWORK_FAILURE_TOAST,
                    Error::Protocol(_) => INVALID_RESPONSE_TOAST,
                    _ => SERVICE_FAILURE_TOAST,
                };
                form.clear();
                form.set_toast(toast);
                return Ok(InitiatorOutcome::Rejected);
            }
            Err(e) => return Err(e),
        };

        let Some(data) = form.bind(outcome) else {
            info!(kind = kind.name(), "Transaction rejected by backend");
            return Ok(InitiatorOutcome::Rejected);
        };

        match data.payment_data {
            Some(payment) => {
                info!(
                    kind = kind.name(),
                    expired_at = %payment.expired_at,
                    "Transaction awaiting payment"
                );
                Ok(InitiatorOutcome::AwaitPayment(payment))
            }
            None => {
                if let TransactionKind::BorrowDigital { resource_id } = *kind {
                    self.session.mark_borrowed(resource_id).await;
                }
                let message = data
                    .message
                    .unwrap_or_else(|| "Transaction completed".to_string());
                info!(kind = kind.name(), "Transaction completed without payment");
                Ok(InitiatorOutcome::Completed { message })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_data_accepts_qr_alias() {
        let parsed: PaymentData = serde_json::from_str(
            r#"{"qrCode":"https://pay.example/qr/1","expiredAt":"2026-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(parsed.payment_link, "https://pay.example/qr/1");
    }

    #[test]
    fn test_transaction_kind_wire_form() {
        let id = Uuid::new_v4();
        let kind: TransactionKind = serde_json::from_value(serde_json::json!({
            "kind": "extendDigitalBorrow",
            "borrowRecordId": id,
        }))
        .unwrap();
        assert_eq!(kind, TransactionKind::ExtendDigitalBorrow { borrow_record_id: id });
        assert_eq!(kind.name(), "extendDigitalBorrow");
        assert_eq!(
            kind.navigation_target(),
            NavigationTarget::BorrowRecord { borrow_record_id: id }
        );
    }

    #[test]
    fn test_payment_field_wire_names() {
        assert_eq!(
            PaymentField::from_wire("paymentMethodId"),
            Some(PaymentField::PaymentMethodId)
        );
        assert_eq!(PaymentField::from_wire("amount"), None);
    }

    #[tokio::test]
    async fn test_missing_method_is_rejected_locally() {
        // Unroutable backend: the request must never be sent
        let backend = Arc::new(BackendClient::new("http://127.0.0.1:9").unwrap());
        let initiator = TransactionInitiator::new(backend, SessionContext::new());
        let mut form = FormErrors::new();

        let outcome = initiator
            .submit(
                &TransactionKind::BorrowDigital { resource_id: Uuid::new_v4() },
                Some("  "),
                &mut form,
            )
            .await
            .unwrap();

        assert_eq!(outcome, InitiatorOutcome::Rejected);
        assert_eq!(
            form.error_for(PaymentField::PaymentMethodId),
            Some(&ErrorKind::Required)
        );
    }

    #[tokio::test]
    async fn test_missing_token_is_an_error() {
        let backend = Arc::new(BackendClient::new("http://127.0.0.1:9").unwrap());
        let initiator = TransactionInitiator::new(backend, SessionContext::new());
        let mut form = FormErrors::new();

        let result = initiator
            .submit(
                &TransactionKind::BorrowDigital { resource_id: Uuid::new_v4() },
                Some("momo"),
                &mut form,
            )
            .await;

        assert!(matches!(
            result,
            Err(Error::Common(lms_common::Error::Unauthenticated(_)))
        ));
    }
}
