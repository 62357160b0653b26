//! Library backend REST client
//!
//! Every endpoint answers with the `{isSuccess, data, message, fieldErrors}`
//! envelope, also on 4xx. Envelopes are turned into typed outcomes; only
//! transport failures and non-envelope bodies become `Err`.

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::payment::{
    BorrowDigitalRequest, ExtendBorrowRequest, PaymentField, PaymentMethod, TransactionData,
};
use lms_common::api::{ActionOutcome, ApiEnvelope, NoField};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("lms-pay/", env!("CARGO_PKG_VERSION"));

/// Longest body excerpt kept in error messages
const BODY_EXCERPT_LEN: usize = 200;

/// HTTP client for the library backend
pub struct BackendClient {
    http_client: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /api/payment-methods`
    pub async fn list_payment_methods(&self, token: &str) -> Result<Vec<PaymentMethod>> {
        let url = format!("{}/api/payment-methods", self.base_url);
        let response = self.http_client.get(&url).bearer_auth(token).send().await?;

        match read_envelope::<Vec<PaymentMethod>>(response).await?.into_outcome::<NoField>() {
            ActionOutcome::Ok(methods) => Ok(methods),
            ActionOutcome::Invalid { message, .. } => Err(Error::Backend(
                message.unwrap_or_else(|| "Payment methods rejected".to_string()),
            )),
            ActionOutcome::Failed { message } => Err(Error::Backend(message)),
        }
    }

    /// `POST /api/borrows/digital`
    pub async fn create_digital_borrow(
        &self,
        token: &str,
        request: &BorrowDigitalRequest,
    ) -> Result<ActionOutcome<TransactionData, PaymentField>> {
        let url = format!("{}/api/borrows/digital", self.base_url);
        debug!(resource_id = %request.resource_id, "Creating digital borrow");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;

        Ok(read_envelope::<TransactionData>(response).await?.into_outcome())
    }

    /// `POST /api/borrows/{borrow_record_id}/extend`
    pub async fn extend_digital_borrow(
        &self,
        token: &str,
        borrow_record_id: Uuid,
        request: &ExtendBorrowRequest,
    ) -> Result<ActionOutcome<TransactionData, PaymentField>> {
        let url = format!("{}/api/borrows/{}/extend", self.base_url, borrow_record_id);
        debug!(%borrow_record_id, "Extending digital borrow");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;

        Ok(read_envelope::<TransactionData>(response).await?.into_outcome())
    }
}

/// Decode the envelope regardless of status code
async fn read_envelope<T: DeserializeOwned>(response: Response) -> Result<ApiEnvelope<T>> {
    let status = response.status();
    let body = response.text().await?;

    match serde_json::from_str::<ApiEnvelope<T>>(&body) {
        Ok(envelope) => Ok(envelope),
        Err(_) if status == StatusCode::UNAUTHORIZED => Err(Error::Common(
            lms_common::Error::Unauthenticated("backend rejected the access token".to_string()),
        )),
        Err(e) if status.is_success() => Err(Error::Protocol(format!(
            "Malformed response envelope: {}",
            e
        ))),
        Err(_) => Err(Error::Backend(format!(
            "HTTP {}: {}",
            status,
            excerpt(&body)
        ))),
    }
}

fn excerpt(body: &str) -> &str {
    match body.char_indices().nth(BODY_EXCERPT_LEN) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
