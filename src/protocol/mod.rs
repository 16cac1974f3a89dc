//! Protocol module - the JSON wire contract with the invoker.
//!
//! - [`InvocationEnvelope`] - inbound request body
//! - [`InvocationResponse`] - outbound response body
//!
//! # Wire format
//!
//! ```text
//! request:  {"system_metadata":{"request_id":"r1"},"user_params":{...}}
//! response: {"result":"2","success":true,"memory_usage":0,"error_message":null}
//! ```

mod envelope;
mod response;

pub use envelope::{Invocation, InvocationEnvelope, SystemMetadata, UNKNOWN_REQUEST_ID};
pub use response::{render_result, InvocationResponse};
