//! Invocation response encoding.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outbound response body.
///
/// All four fields are always serialized; absent values are `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationResponse {
    pub result: Option<String>,
    pub success: bool,
    pub memory_usage: u64,
    pub error_message: Option<String>,
}

impl InvocationResponse {
    /// A successful invocation.
    pub fn succeeded(result: String, memory_usage: u64) -> Self {
        Self {
            result: Some(result),
            success: true,
            memory_usage,
            error_message: None,
        }
    }

    /// A failed invocation.
    pub fn failed(error_message: String, memory_usage: u64) -> Self {
        Self {
            result: None,
            success: false,
            memory_usage,
            error_message: Some(error_message),
        }
    }

    /// Serialize to the response body.
    pub fn to_json(&self) -> Vec<u8> {
        // A struct of strings, bools and integers always serializes.
        serde_json::to_vec(self).unwrap_or_default()
    }
}

/// Convert a handler return value into the `result` string.
///
/// Strings are taken as-is, other scalars use their JSON text, arrays and
/// objects are serialized as compact JSON.
pub fn render_result(value: &Value) -> serde_json::Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Null => Ok("null".to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Array(_) | Value::Object(_) => serde_json::to_string(value),
    }
}
