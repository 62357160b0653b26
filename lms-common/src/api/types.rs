//! Backend response envelope and typed outcomes

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::hash::Hash;

// ========================================
// Wire Envelope
// ========================================

/// Response envelope returned by every backend endpoint
///
/// # Examples
///
/// ```
/// use lms_common::api::ApiEnvelope;
///
/// let json = r#"{"isSuccess":false,"fieldErrors":{"paymentMethodId":"required"}}"#;
/// let envelope: ApiEnvelope<serde_json::Value> = serde_json::from_str(json).unwrap();
/// assert!(!envelope.is_success);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope<T> {
    pub is_success: bool,

    pub data: Option<T>,

    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub field_errors: Option<BTreeMap<String, String>>,
}

impl<T: Default> ApiEnvelope<T> {
    /// Convert the envelope into a typed outcome
    ///
    /// A success without `data` yields `T::default()`.
    pub fn into_outcome<F: FormField>(self) -> ActionOutcome<T, F> {
        if self.is_success {
            return ActionOutcome::Ok(self.data.unwrap_or_default());
        }

        match self.field_errors {
            Some(raw) if !raw.is_empty() => ActionOutcome::Invalid {
                errors: FieldErrors::from_wire(&raw),
                message: self.message,
            },
            _ => ActionOutcome::Failed {
                message: self
                    .message
                    .unwrap_or_else(|| "Request failed".to_string()),
            },
        }
    }
}

// ========================================
// Field Errors
// ========================================

/// Form field with a stable wire name
///
/// Implemented by per-form field enums so backend field errors bind to
/// variants rather than strings.
pub trait FormField: Copy + Eq + Ord + Hash + Debug + Send + Sync + 'static {
    /// Every field of the form
    const ALL: &'static [Self];

    /// Field name as used by the backend
    fn wire_name(&self) -> &'static str;

    /// Look up a field by its backend name (case-insensitive)
    fn from_wire(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|field| field.wire_name().eq_ignore_ascii_case(name))
    }
}

/// Field type for actions that have no form (listing, lookups)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NoField {}

impl FormField for NoField {
    const ALL: &'static [Self] = &[];

    fn wire_name(&self) -> &'static str {
        match *self {}
    }
}

/// Kind of a single field error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    Required,
    Invalid,
    NotFound,
    Conflict,
    /// Free-form backend message
    Other(String),
}

impl ErrorKind {
    /// Classify a backend error message
    pub fn from_message(message: &str) -> Self {
        match message.trim().to_ascii_lowercase().as_str() {
            "required" => ErrorKind::Required,
            "invalid" => ErrorKind::Invalid,
            "not_found" | "notfound" | "not found" => ErrorKind::NotFound,
            "conflict" => ErrorKind::Conflict,
            _ => ErrorKind::Other(message.to_string()),
        }
    }

    /// Message shown next to the field
    pub fn message(&self) -> String {
        match self {
            ErrorKind::Required => "This field is required".to_string(),
            ErrorKind::Invalid => "Invalid value".to_string(),
            ErrorKind::NotFound => "Not found".to_string(),
            ErrorKind::Conflict => "Conflicts with an existing record".to_string(),
            ErrorKind::Other(message) => message.clone(),
        }
    }
}

/// Field errors bound to a form's field type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldErrors<F: FormField> {
    errors: BTreeMap<F, ErrorKind>,
    /// Backend field names with no matching form field
    unmapped: Vec<(String, ErrorKind)>,
}

impl<F: FormField> Default for FieldErrors<F> {
    fn default() -> Self {
        Self {
            errors: BTreeMap::new(),
            unmapped: Vec::new(),
        }
    }
}

impl<F: FormField> FieldErrors<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind raw backend `fieldErrors` to form fields
    pub fn from_wire(raw: &BTreeMap<String, String>) -> Self {
        let mut errors = Self::new();
        for (name, message) in raw {
            let kind = ErrorKind::from_message(message);
            match F::from_wire(name) {
                Some(field) => {
                    errors.insert(field, kind);
                }
                None => errors.unmapped.push((name.clone(), kind)),
            }
        }
        errors
    }

    pub fn insert(&mut self, field: F, kind: ErrorKind) -> &mut Self {
        self.errors.insert(field, kind);
        self
    }

    pub fn get(&self, field: F) -> Option<&ErrorKind> {
        self.errors.get(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.unmapped.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&F, &ErrorKind)> {
        self.errors.iter()
    }

    pub fn unmapped(&self) -> &[(String, ErrorKind)] {
        &self.unmapped
    }
}

// ========================================
// Outcome
// ========================================

/// Typed result of a backend action
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome<T, F: FormField> {
    /// Action succeeded
    Ok(T),

    /// Backend rejected one or more fields
    Invalid {
        errors: FieldErrors<F>,
        message: Option<String>,
    },

    /// Action failed without field detail (network, server, business rule)
    Failed { message: String },
}

impl<T, F: FormField> ActionOutcome<T, F> {
    pub fn is_ok(&self) -> bool {
        matches!(self, ActionOutcome::Ok(_))
    }

    pub fn failed(message: impl Into<String>) -> Self {
        ActionOutcome::Failed {
            message: message.into(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub enum LoginField {
        Email,
        Password,
    }

    impl FormField for LoginField {
        const ALL: &'static [Self] = &[LoginField::Email, LoginField::Password];

        fn wire_name(&self) -> &'static str {
            match self {
                LoginField::Email => "email",
                LoginField::Password => "password",
            }
        }
    }

    #[test]
    fn test_success_envelope() {
        let envelope: ApiEnvelope<Vec<u32>> =
            serde_json::from_str(r#"{"isSuccess":true,"data":[1,2]}"#).unwrap();
        assert_eq!(
            envelope.into_outcome::<LoginField>(),
            ActionOutcome::Ok(vec![1, 2])
        );
    }

    #[test]
    fn test_success_without_data_uses_default() {
        let envelope: ApiEnvelope<Vec<u32>> =
            serde_json::from_str(r#"{"isSuccess":true}"#).unwrap();
        assert_eq!(envelope.into_outcome::<LoginField>(), ActionOutcome::Ok(vec![]));
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Receipt {
        id: u32,
    }

    fn decode<T: serde::de::DeserializeOwned>(json: &str) -> ApiEnvelope<T> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_envelope_decodes_payload_without_default() {
        let envelope: ApiEnvelope<Receipt> = decode(r#"{"isSuccess":true,"data":{"id":7}}"#);
        assert_eq!(envelope.data, Some(Receipt { id: 7 }));

        let envelope: ApiEnvelope<Receipt> = decode(r#"{"isSuccess":false,"message":"no"}"#);
        assert!(envelope.data.is_none());
        assert_eq!(envelope.message.as_deref(), Some("no"));
    }

    #[test]
    fn test_field_errors_bind_to_fields() {
        let envelope: ApiEnvelope<Vec<u32>> = serde_json::from_str(
            r#"{"isSuccess":false,"message":"Check the form",
                "fieldErrors":{"Email":"required","captcha":"expired"}}"#,
        )
        .unwrap();

        match envelope.into_outcome::<LoginField>() {
            ActionOutcome::Invalid { errors, message } => {
                assert_eq!(message.as_deref(), Some("Check the form"));
                assert_eq!(errors.get(LoginField::Email), Some(&ErrorKind::Required));
                assert_eq!(errors.get(LoginField::Password), None);
                assert_eq!(
                    errors.unmapped(),
                    &[("captcha".to_string(), ErrorKind::Other("expired".to_string()))]
                );
            }
            other => panic!("expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn test_failure_without_fields() {
        let envelope: ApiEnvelope<Vec<u32>> =
            serde_json::from_str(r#"{"isSuccess":false,"fieldErrors":{}}"#).unwrap();
        assert_eq!(
            envelope.into_outcome::<LoginField>(),
            ActionOutcome::failed("Request failed")
        );
    }

    #[test]
    fn test_error_kind_messages() {
        assert_eq!(ErrorKind::from_message(" Required "), ErrorKind::Required);
        assert_eq!(ErrorKind::from_message("not_found"), ErrorKind::NotFound);
        assert_eq!(
            ErrorKind::from_message("Card declined").message(),
            "Card declined"
        );
    }
}
