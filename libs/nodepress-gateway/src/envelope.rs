//! The API's JSON envelope and what a successful call resolves to.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `status` field of the envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Success,
    Error,
}

impl EnvelopeStatus {
    pub const SUCCESS: &'static str = "success";
    pub const ERROR: &'static str = "error";
}

/// Response body shape used by the API: `{ status, message, result }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T = Value> {
    pub status: EnvelopeStatus,
    #[serde(default)]
    pub message: String,
    pub result: T,
}

/// What a successful gateway call resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload<T = Value> {
    /// `result` of a success envelope
    Result(T),
    /// Body of a non-JSON response, byte for byte
    Raw(Bytes),
}

impl<T> Payload<T> {
    #[must_use]
    pub fn result(&self) -> Option<&T> {
        match self {
            Payload::Result(result) => Some(result),
            Payload::Raw(_) => None,
        }
    }

    #[must_use]
    pub fn into_result(self) -> Option<T> {
        match self {
            Payload::Result(result) => Some(result),
            Payload::Raw(_) => None,
        }
    }

    #[must_use]
    pub fn raw(&self) -> Option<&Bytes> {
        match self {
            Payload::Raw(raw) => Some(raw),
            Payload::Result(_) => None,
        }
    }

    /// Raw body as text, `None` for a result or a body that is not UTF-8
    #[must_use]
    pub fn raw_str(&self) -> Option<&str> {
        std::str::from_utf8(self.raw()?).ok()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Payload<U> {
        match self {
            Payload::Result(result) => Payload::Result(f(result)),
            Payload::Raw(raw) => Payload::Raw(raw),
        }
    }
}

/// Whether a parsed body is a success envelope.
///
/// Anything without `"status": "success"` counts as a failure, including
/// bodies that are not objects at all.
#[must_use]
pub fn is_success(body: &Value) -> bool {
    body.get("status").and_then(Value::as_str) == Some(EnvelopeStatus::SUCCESS)
}

/// Text form of a body field, following JavaScript truthiness.
///
/// `null`, `false`, `0` and `""` count as absent; strings are returned as-is
/// and other values in their JSON form.
#[must_use]
pub fn field_text(body: Option<&Value>, field: &str) -> Option<String> {
    match body?.get(field)? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64().is_some_and(|f| f.abs() < f64::EPSILON) => None,
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_success() {
        assert!(is_success(&json!({"status": "success", "result": 1})));
        assert!(!is_success(&json!({"status": "error"})));
        assert!(!is_success(&json!({"status": "SUCCESS"})));
        assert!(!is_success(&json!({"result": 1})));
        assert!(!is_success(&json!([1, 2])));
    }

    #[test]
    fn test_field_text_truthiness() {
        let body = json!({
            "message": "Invalid",
            "empty": "",
            "zero": 0,
            "code": 1001,
            "null": null,
            "no": false,
            "detail": {"field": "id"},
        });
        assert_eq!(field_text(Some(&body), "message").as_deref(), Some("Invalid"));
        assert_eq!(field_text(Some(&body), "empty"), None);
        assert_eq!(field_text(Some(&body), "zero"), None);
        assert_eq!(field_text(Some(&body), "code").as_deref(), Some("1001"));
        assert_eq!(field_text(Some(&body), "null"), None);
        assert_eq!(field_text(Some(&body), "no"), None);
        assert_eq!(field_text(Some(&body), "missing"), None);
        assert_eq!(
            field_text(Some(&body), "detail").as_deref(),
            Some(r#"{"field":"id"}"#)
        );
        assert_eq!(field_text(None, "message"), None);
    }

    #[test]
    fn test_envelope_deserializes() {
        let envelope: Envelope<Vec<u32>> = serde_json::from_value(json!({
            "status": "success",
            "message": "ok",
            "result": [1, 2],
        }))
        .unwrap();
        assert_eq!(envelope.status, EnvelopeStatus::Success);
        assert_eq!(envelope.result, vec![1, 2]);
    }

    #[test]
    fn test_payload_accessors() {
        let payload: Payload<u32> = Payload::Result(7);
        assert_eq!(payload.result(), Some(&7));
        assert_eq!(payload.raw(), None);
        assert_eq!(payload.map(|n| n * 2).into_result(), Some(14));

        let raw: Payload<u32> = Payload::Raw(Bytes::from_static(b"<html></html>"));
        assert_eq!(raw.raw_str(), Some("<html></html>"));
        assert_eq!(raw.into_result(), None);

        let binary: Payload = Payload::Raw(Bytes::from_static(&[0x89, b'P', 0xff]));
        assert_eq!(binary.raw().map(Bytes::len), Some(3));
        assert_eq!(binary.raw_str(), None);
    }
}
