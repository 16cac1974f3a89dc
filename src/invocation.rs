//! Per-request invocation lifecycle.
//!
//! ```text
//! Received -> Parsing -> ParseFailed ------------------------> Responding -> Sent
//!                     -> Invoking -> InvokeSucceeded/Failed -> Responding -> Sent
//! ```
//!
//! [`Invoker::handle`] turns one request body into exactly one
//! [`InvocationResponse`]. Nothing inside it returns early: parse errors,
//! handler errors and handler panics all end in a `success: false` body, and
//! the end marker is written on every path.

use std::any::Any;
use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;
use tokio::task::JoinError;
use tracing::Instrument;

use crate::correlation::{CorrelationId, LogMarker, MarkerSink, StdoutMarkers};
use crate::error::Result;
use crate::handler::{Handler, HandlerError};
use crate::protocol::{render_result, Invocation, InvocationEnvelope, InvocationResponse};
use crate::usage::{MemoryProbe, RssProbe, UsageBaseline};

/// Request lifecycle phase, recorded at debug level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Received,
    Parsing,
    ParseFailed,
    Invoking,
    InvokeSucceeded,
    InvokeFailed,
    Responding,
    Sent,
}

/// Tagged result of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Rendered `result` string.
    Succeeded(String),
    /// Text for `error_message`.
    Failed(String),
}

impl Outcome {
    /// Build the response body.
    pub fn into_response(self, memory_usage: u64) -> InvocationResponse {
        match self {
            Outcome::Succeeded(result) => InvocationResponse::succeeded(result, memory_usage),
            Outcome::Failed(message) => InvocationResponse::failed(message, memory_usage),
        }
    }
}

/// Wraps the resolved handler with correlation and accounting.
///
/// Cheap to clone; all state is shared and read-only.
#[derive(Clone)]
pub struct Invoker {
    handler: Arc<dyn Handler>,
    markers: Arc<dyn MarkerSink>,
    probe: Arc<dyn MemoryProbe>,
}

impl Invoker {
    /// Create an invoker writing markers to stdout and sampling RSS.
    pub fn new(handler: Arc<dyn Handler>) -> Self {
        Self {
            handler,
            markers: Arc::new(StdoutMarkers),
            probe: Arc::new(RssProbe),
        }
    }

    /// Replace the marker sink.
    pub fn with_markers(mut self, markers: Arc<dyn MarkerSink>) -> Self {
        self.markers = markers;
        self
    }

    /// Replace the memory probe.
    pub fn with_probe(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Run one request through the full lifecycle.
    ///
    /// `body` is the fully buffered request body, or the error that stopped
    /// it from being read.
    pub async fn handle(&self, body: Result<Bytes>) -> InvocationResponse {
        let baseline = UsageBaseline::take(&*self.probe);
        tracing::debug!(phase = ?Phase::Received, "request received");

        tracing::debug!(phase = ?Phase::Parsing, "decoding envelope");
        let (request_id, params) = match body.and_then(|b| InvocationEnvelope::parse(&b)) {
            Ok(Invocation { request_id, params }) => (request_id, Ok(params)),
            Err(e) => (CorrelationId::unknown(), Err(e)),
        };

        let span = tracing::info_span!("invocation", request_id = %request_id);
        async move {
            self.markers.emit(LogMarker::Start(&request_id));

            let outcome = match params {
                Ok(params) => self.invoke(params).await,
                Err(e) => {
                    tracing::debug!(phase = ?Phase::ParseFailed, "envelope rejected");
                    Outcome::Failed(e.to_string())
                }
            };

            let memory_usage = baseline.finish(&*self.probe);

            if let Outcome::Failed(message) = &outcome {
                tracing::error!("execution error: {}", message);
            }

            self.markers.emit(LogMarker::End(&request_id));
            tracing::debug!(phase = ?Phase::Responding, memory_usage, "invocation finished");

            outcome.into_response(memory_usage)
        }
        .instrument(span)
        .await
    }

    /// Call the handler on its own task so a panic is contained.
    async fn invoke(&self, params: Value) -> Outcome {
        tracing::debug!(phase = ?Phase::Invoking, "calling handler");

        let handler = Arc::clone(&self.handler);
        let task = tokio::spawn(async move { handler.call(params).await }.in_current_span());
        let result = match task.await {
            Ok(result) => result,
            Err(e) => Err(HandlerError::new(join_failure(e))),
        };

        match result.and_then(|value| render_result(&value).map_err(HandlerError::from)) {
            Ok(rendered) => {
                tracing::debug!(phase = ?Phase::InvokeSucceeded, "handler returned");
                Outcome::Succeeded(rendered)
            }
            Err(e) => {
                tracing::debug!(phase = ?Phase::InvokeFailed, "handler failed");
                Outcome::Failed(e.describe())
            }
        }
    }
}

fn join_failure(err: JoinError) -> String {
    if err.is_panic() {
        format!("handler panicked: {}", panic_text(err.into_panic()))
    } else {
        "handler task was cancelled".to_string()
    }
}

fn panic_text(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::RecordingMarkers;
    use crate::error::RuntimeError;
    use crate::handler::handler_fn;
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    /// Reports a shrinking heap: every sample is lower than the last.
    struct Shrinking(AtomicU64);

    impl MemoryProbe for Shrinking {
        fn sample(&self) -> u64 {
            self.0.fetch_sub(4096, Ordering::SeqCst)
        }
    }

    fn add_one() -> Arc<dyn Handler> {
        Arc::new(handler_fn(|params: Value| async move {
            let x = params["x"]
                .as_i64()
                .ok_or_else(|| HandlerError::new("x must be an integer"))?;
            Ok::<_, HandlerError>(json!(x + 1))
        }))
    }

    fn boom() -> Arc<dyn Handler> {
        Arc::new(handler_fn(|_: Value| async move {
            Err::<Value, _>(HandlerError::new("boom"))
        }))
    }

    fn invoker(handler: Arc<dyn Handler>) -> (Invoker, Arc<RecordingMarkers>) {
        let markers = Arc::new(RecordingMarkers::new());
        let invoker = Invoker::new(handler).with_markers(markers.clone());
        (invoker, markers)
    }

    fn body(s: &str) -> Result<Bytes> {
        Ok(Bytes::from(s.to_owned()))
    }

    #[tokio::test]
    async fn test_success_with_request_id() {
        let (invoker, markers) = invoker(add_one());

        let response = invoker
            .handle(body(
                r#"{"system_metadata":{"request_id":"r1"},"user_params":{"x":1}}"#,
            ))
            .await;

        assert!(response.success);
        assert_eq!(response.result.as_deref(), Some("2"));
        assert_eq!(response.error_message, None);
        assert_eq!(
            markers.lines(),
            vec!["===LOG_START:r1===", "===LOG_END:r1==="]
        );
    }

    #[tokio::test]
    async fn test_handler_error() {
        let (invoker, markers) = invoker(boom());

        let response = invoker.handle(body("{}")).await;

        assert!(!response.success);
        assert_eq!(response.result, None);
        assert_eq!(response.error_message.as_deref(), Some("boom"));
        assert_eq!(
            markers.lines(),
            vec!["===LOG_START:unknown===", "===LOG_END:unknown==="]
        );
    }

    #[tokio::test]
    async fn test_empty_body_invokes_with_empty_object() {
        let seen = Arc::new(Mutex::new(None));
        let captured = seen.clone();
        let handler: Arc<dyn Handler> = Arc::new(handler_fn(move |params: Value| {
            let captured = captured.clone();
            async move {
                *captured.lock().unwrap() = Some(params);
                Ok("done")
            }
        }));
        let (invoker, markers) = invoker(handler);

        let response = invoker.handle(body("")).await;

        assert!(response.success);
        assert_eq!(response.result.as_deref(), Some("done"));
        assert_eq!(*seen.lock().unwrap(), Some(json!({})));
        assert_eq!(markers.lines()[0], "===LOG_START:unknown===");
    }

    #[tokio::test]
    async fn test_malformed_body_then_recovery() {
        let (invoker, markers) = invoker(add_one());

        let bad = invoker.handle(body("{not json")).await;
        assert!(!bad.success);
        assert_eq!(bad.result, None);
        assert!(bad.error_message.unwrap().contains("line 1"));

        let good = invoker
            .handle(body(r#"{"system_metadata":{"request_id":"r2"},"user_params":{"x":41}}"#))
            .await;
        assert!(good.success);
        assert_eq!(good.result.as_deref(), Some("42"));

        assert_eq!(
            markers.lines(),
            vec![
                "===LOG_START:unknown===",
                "===LOG_END:unknown===",
                "===LOG_START:r2===",
                "===LOG_END:r2===",
            ]
        );
    }

    #[tokio::test]
    async fn test_body_error_is_failure() {
        let (invoker, markers) = invoker(add_one());

        let response = invoker
            .handle(Err(RuntimeError::BodyTooLarge { limit: 16 }))
            .await;

        assert!(!response.success);
        assert_eq!(
            response.error_message.as_deref(),
            Some("request body exceeds 16 bytes")
        );
        assert_eq!(markers.lines().len(), 2);
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let handler: Arc<dyn Handler> = Arc::new(handler_fn(|_: Value| async move {
            if true {
                panic!("handler blew up");
            }
            Ok(Value::Null)
        }));
        let (invoker, markers) = invoker(handler);

        let response = invoker.handle(body("{}")).await;

        assert!(!response.success);
        assert_eq!(
            response.error_message.as_deref(),
            Some("handler panicked: handler blew up")
        );
        assert_eq!(markers.lines().len(), 2);
    }

    #[tokio::test]
    async fn test_structured_result_is_json_text() {
        let handler: Arc<dyn Handler> =
            Arc::new(handler_fn(|params: Value| async move { Ok(json!({"echo": params})) }));
        let (invoker, _) = invoker(handler);

        let response = invoker.handle(body(r#"{"user_params":{"a":[1,2]}}"#)).await;

        assert_eq!(response.result.as_deref(), Some(r#"{"echo":{"a":[1,2]}}"#));
    }

    #[tokio::test]
    async fn test_memory_usage_never_negative() {
        let (invoker, _) = invoker(add_one());
        let invoker = invoker.with_probe(Arc::new(Shrinking(AtomicU64::new(1 << 30))));

        let ok = invoker.handle(body(r#"{"user_params":{"x":1}}"#)).await;
        let failed = invoker.handle(body("{not json")).await;

        assert_eq!(ok.memory_usage, 0);
        assert_eq!(failed.memory_usage, 0);
    }

    #[test]
    fn test_outcome_into_response() {
        let ok = Outcome::Succeeded("v".to_string()).into_response(3);
        assert_eq!(ok, InvocationResponse::succeeded("v".to_string(), 3));

        let err = Outcome::Failed("e".to_string()).into_response(0);
        assert_eq!(err, InvocationResponse::failed("e".to_string(), 0));
    }
}
