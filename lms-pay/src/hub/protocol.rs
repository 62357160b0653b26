//! Hub wire protocol (JSON hub protocol, version 1)
//!
//! Every record is a JSON object terminated by the 0x1E record separator.
//! Only the message types the payment flow needs are decoded; anything else
//! is surfaced as `HubMessage::Other` and ignored by the client.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use lms_common::PaymentStatus;

/// Terminates every hub record
pub const RECORD_SEPARATOR: char = '\u{1e}';

const MSG_INVOCATION: u64 = 1;
const MSG_PING: u64 = 6;
const MSG_CLOSE: u64 = 7;

/// Handshake record sent right after the receive stream opens
pub fn handshake_request() -> String {
    format!(r#"{{"protocol":"json","version":1}}{}"#, RECORD_SEPARATOR)
}

/// Response of `POST {hub}/negotiate?negotiateVersion=1`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiateResponse {
    #[serde(default)]
    pub connection_id: Option<String>,
    #[serde(default)]
    pub connection_token: Option<String>,
    #[serde(default)]
    pub negotiate_version: u32,
    #[serde(default)]
    pub error: Option<String>,
}

impl NegotiateResponse {
    /// Id used on the transport requests
    ///
    /// Version 1 servers hand out a separate connection token; older servers
    /// only return the connection id.
    pub fn stream_id(&self) -> Result<&str> {
        if let Some(error) = &self.error {
            return Err(Error::Hub(format!("Negotiation refused: {}", error)));
        }
        self.connection_token
            .as_deref()
            .or(self.connection_id.as_deref())
            .ok_or_else(|| Error::Hub("Negotiation returned no connection id".to_string()))
    }
}

/// Decoded hub record
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    /// Handshake response (first record on the stream)
    Handshake { error: Option<String> },
    /// Server-to-client method call
    Invocation { target: String, arguments: Vec<Value> },
    Ping,
    /// Server is closing the connection
    Close { error: Option<String> },
    /// Any other message type
    Other(u64),
}

#[derive(Deserialize)]
struct RawRecord {
    #[serde(rename = "type")]
    kind: Option<u64>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    arguments: Vec<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Decode one record (without its separator)
pub fn parse_record(record: &str) -> Result<HubMessage> {
    let raw: RawRecord = serde_json::from_str(record)
        .map_err(|e| Error::Protocol(format!("Invalid hub record: {}", e)))?;

    let message = match raw.kind {
        None => HubMessage::Handshake { error: raw.error },
        Some(MSG_INVOCATION) => HubMessage::Invocation {
            target: raw
                .target
                .ok_or_else(|| Error::Protocol("Invocation without target".to_string()))?,
            arguments: raw.arguments,
        },
        Some(MSG_PING) => HubMessage::Ping,
        Some(MSG_CLOSE) => HubMessage::Close { error: raw.error },
        Some(other) => HubMessage::Other(other),
    };
    Ok(message)
}

/// Split a transport payload into complete records
///
/// Returns the records and whatever trailing text has no separator yet.
pub fn split_records(payload: &str) -> (Vec<&str>, &str) {
    let mut records = Vec::new();
    let mut rest = payload;
    while let Some(idx) = rest.find(RECORD_SEPARATOR) {
        let record = rest[..idx].trim();
        if !record.is_empty() {
            records.push(record);
        }
        rest = &rest[idx + RECORD_SEPARATOR.len_utf8()..];
    }
    (records, rest)
}

/// Extract the payment status from a status invocation
///
/// The first argument is either the bare status string or an object carrying
/// a `status` (or `paymentStatus`) field.
pub fn status_from_invocation(arguments: &[Value]) -> Option<PaymentStatus> {
    let status = match arguments.first()? {
        Value::String(status) => status.as_str(),
        Value::Object(fields) => fields
            .iter()
            .find(|(key, _)| {
                key.eq_ignore_ascii_case("status") || key.eq_ignore_ascii_case("paymentStatus")
            })
            .and_then(|(_, value)| value.as_str())?,
        _ => return None,
    };
    let status = status.trim();
    if status.is_empty() {
        return None;
    }
    Some(PaymentStatus::from(status.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_handshake_request_is_terminated() {
        let handshake = handshake_request();
        assert!(handshake.ends_with(RECORD_SEPARATOR));
        let body: Value = serde_json::from_str(handshake.trim_end_matches(RECORD_SEPARATOR)).unwrap();
        assert_eq!(body, json!({"protocol": "json", "version": 1}));
    }

    #[test]
    fn test_negotiate_prefers_connection_token() {
        let v1: NegotiateResponse = serde_json::from_value(json!({
            "connectionId": "id-1",
            "connectionToken": "token-1",
            "negotiateVersion": 1,
            "availableTransports": []
        }))
        .unwrap();
        assert_eq!(v1.stream_id().unwrap(), "token-1");

        let v0: NegotiateResponse =
            serde_json::from_value(json!({"connectionId": "id-0"})).unwrap();
        assert_eq!(v0.stream_id().unwrap(), "id-0");

        let refused: NegotiateResponse =
            serde_json::from_value(json!({"error": "Unauthorized"})).unwrap();
        assert!(matches!(refused.stream_id(), Err(Error::Hub(_))));
    }

    #[test]
    fn test_parse_known_records() {
        assert_eq!(
            parse_record("{}").unwrap(),
            HubMessage::Handshake { error: None }
        );
        assert_eq!(parse_record(r#"{"type":6}"#).unwrap(), HubMessage::Ping);
        assert_eq!(
            parse_record(r#"{"type":7,"error":"server shutdown"}"#).unwrap(),
            HubMessage::Close { error: Some("server shutdown".to_string()) }
        );
        assert_eq!(parse_record(r#"{"type":3,"invocationId":"1"}"#).unwrap(), HubMessage::Other(3));

        match parse_record(r#"{"type":1,"target":"PaymentStatusChanged","arguments":["PAID"]}"#)
            .unwrap()
        {
            HubMessage::Invocation { target, arguments } => {
                assert_eq!(target, "PaymentStatusChanged");
                assert_eq!(status_from_invocation(&arguments), Some(PaymentStatus::Paid));
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_record("not json"), Err(Error::Protocol(_))));
        assert!(matches!(parse_record(r#"{"type":1}"#), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_split_records_keeps_partial_tail() {
        let payload = "{\"type\":6}\u{1e}{}\u{1e}{\"type\":";
        let (records, rest) = split_records(payload);
        assert_eq!(records, vec![r#"{"type":6}"#, "{}"]);
        assert_eq!(rest, r#"{"type":"#);
    }

    #[test]
    fn test_status_from_object_argument() {
        let args = vec![json!({"transactionId": "t-1", "Status": "expired"})];
        assert_eq!(status_from_invocation(&args), Some(PaymentStatus::Expired));
        assert_eq!(status_from_invocation(&[json!(42)]), None);
        assert_eq!(status_from_invocation(&[]), None);
    }

    #[test]
    fn test_blank_status_is_no_status() {
        assert_eq!(status_from_invocation(&[json!({"status": ""})]), None);
        assert_eq!(status_from_invocation(&[json!("   ")]), None);
        assert_eq!(
            status_from_invocation(&[json!({"status": " PAID "})]),
            Some(PaymentStatus::Paid)
        );
    }
}
