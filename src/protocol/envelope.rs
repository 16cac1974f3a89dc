//! Invocation envelope decoding.
//!
//! All defaults are applied here, once. Downstream code receives an
//! [`Invocation`] with a concrete request id and parameter value.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::correlation::CorrelationId;
use crate::error::{Result, RuntimeError};

/// Request id used when the envelope carries none.
pub const UNKNOWN_REQUEST_ID: &str = "unknown";

/// Platform metadata attached by the invoker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Value>,
}

/// Inbound request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvocationEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_metadata: Option<SystemMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_params: Option<Value>,
}

/// A decoded envelope with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub request_id: CorrelationId,
    pub params: Value,
}

impl InvocationEnvelope {
    /// Decode a request body.
    ///
    /// A zero-length body is an empty envelope. Anything else must be a JSON
    /// object.
    pub fn decode(body: &[u8]) -> Result<Self> {
        if body.is_empty() {
            return Ok(Self::default());
        }

        let value: Value = serde_json::from_slice(body)?;
        if !value.is_object() {
            return Err(RuntimeError::InvalidEnvelope(
                "invocation envelope must be a JSON object",
            ));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Decode a request body straight into an [`Invocation`].
    pub fn parse(body: &[u8]) -> Result<Invocation> {
        Ok(Self::decode(body)?.into_invocation())
    }

    /// Apply defaults for missing metadata and parameters.
    pub fn into_invocation(self) -> Invocation {
        let request_id = self
            .system_metadata
            .and_then(|meta| meta.request_id)
            .and_then(request_id_text)
            .map(CorrelationId::new)
            .unwrap_or_else(CorrelationId::unknown);

        let params = match self.user_params {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(params) => params,
        };

        Invocation { request_id, params }
    }
}

fn request_id_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_envelope() {
        let body = br#"{"system_metadata":{"request_id":"r1"},"user_params":{"x":1}}"#;
        let invocation = InvocationEnvelope::parse(body).unwrap();

        assert_eq!(invocation.request_id.as_str(), "r1");
        assert_eq!(invocation.params, json!({"x": 1}));
    }

    #[test]
    fn test_empty_body_defaults() {
        let invocation = InvocationEnvelope::parse(b"").unwrap();

        assert_eq!(invocation.request_id.as_str(), UNKNOWN_REQUEST_ID);
        assert_eq!(invocation.params, json!({}));
    }

    #[test]
    fn test_empty_object_defaults() {
        let invocation = InvocationEnvelope::parse(b"{}").unwrap();

        assert_eq!(invocation.request_id.as_str(), "unknown");
        assert_eq!(invocation.params, json!({}));
    }

    #[test]
    fn test_null_fields_default() {
        let body = br#"{"system_metadata":null,"user_params":null}"#;
        let invocation = InvocationEnvelope::parse(body).unwrap();

        assert_eq!(invocation.request_id.as_str(), "unknown");
        assert_eq!(invocation.params, json!({}));
    }

    #[test]
    fn test_empty_request_id_is_unknown() {
        let body = br#"{"system_metadata":{"request_id":""}}"#;
        let invocation = InvocationEnvelope::parse(body).unwrap();

        assert_eq!(invocation.request_id.as_str(), "unknown");
    }

    #[test]
    fn test_numeric_request_id() {
        let body = br#"{"system_metadata":{"request_id":42}}"#;
        let invocation = InvocationEnvelope::parse(body).unwrap();

        assert_eq!(invocation.request_id.as_str(), "42");
    }

    #[test]
    fn test_non_object_params_pass_through() {
        let body = br#"{"user_params":[1,2,3]}"#;
        let invocation = InvocationEnvelope::parse(body).unwrap();

        assert_eq!(invocation.params, json!([1, 2, 3]));
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let body = br#"{"system_metadata":{"request_id":"r","trace":"t"},"extra":true}"#;
        let invocation = InvocationEnvelope::parse(body).unwrap();

        assert_eq!(invocation.request_id.as_str(), "r");
    }

    #[test]
    fn test_malformed_json() {
        let err = InvocationEnvelope::parse(b"{not json").unwrap_err();

        assert!(matches!(err, RuntimeError::Json(_)));
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_whitespace_body_is_malformed() {
        let err = InvocationEnvelope::parse(b"   ").unwrap_err();
        assert!(matches!(err, RuntimeError::Json(_)));
    }

    #[test]
    fn test_non_object_envelope() {
        let err = InvocationEnvelope::parse(b"[1,2]").unwrap_err();
        assert_eq!(err.to_string(), "invocation envelope must be a JSON object");

        let err = InvocationEnvelope::parse(b"null").unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidEnvelope(_)));
    }

    #[test]
    fn test_wrong_metadata_type() {
        let err = InvocationEnvelope::parse(br#"{"system_metadata":"r1"}"#).unwrap_err();
        assert!(matches!(err, RuntimeError::Json(_)));
    }
}
