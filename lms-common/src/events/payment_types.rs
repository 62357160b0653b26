//! Payment-related event types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Payment status as reported by the backend hub
///
/// Wire form is the upper-case name (`"PAID"`). Any status this client does not
/// know decodes as `Unknown` and still counts as terminal, so a new backend
/// status resolves the dialog instead of leaving it waiting forever.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Expired,
    Cancelled,
    Failed,
    Unknown(String),
}

impl PaymentStatus {
    /// Every status except `Pending` ends the wait
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    pub fn as_str(&self) -> &str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Expired => "EXPIRED",
            PaymentStatus::Cancelled => "CANCELLED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Unknown(raw) => raw,
        }
    }
}

impl From<String> for PaymentStatus {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PENDING" => PaymentStatus::Pending,
            "PAID" => PaymentStatus::Paid,
            "EXPIRED" => PaymentStatus::Expired,
            "CANCELLED" | "CANCELED" => PaymentStatus::Cancelled,
            "FAILED" => PaymentStatus::Failed,
            _ => PaymentStatus::Unknown(raw),
        }
    }
}

impl From<PaymentStatus> for String {
    fn from(status: PaymentStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which signal resolved a pending payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolutionSource {
    /// Local expiry clock reached zero
    Clock,
    /// Status pushed by the realtime hub
    Hub,
}
