//! Handler trait and the typed closure adapter.
//!
//! Every kind of user code is normalized into [`Handler`] once, at load time.
//! After that the invoker only ever sees `Arc<dyn Handler>`.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result type for handler calls.
pub type HandlerResult = std::result::Result<Value, HandlerError>;

/// Trait for user handlers.
pub trait Handler: Send + Sync + 'static {
    /// Invoke the handler with the user parameters of one invocation.
    fn call(&self, params: Value) -> BoxFuture<'static, HandlerResult>;
}

/// Failure raised by user code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    /// Create an error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The raw message, possibly empty.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Text reported in `error_message`.
    ///
    /// Falls back to a generic description when the message is empty.
    pub fn describe(&self) -> String {
        if self.message.is_empty() {
            "unknown error".to_string()
        } else {
            self.message.clone()
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl std::error::Error for HandlerError {}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Wrapper that deserializes parameters before calling a closure and
/// serializes its output afterwards.
pub struct FnHandler<F, T, R, Fut>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    Fut: Future<Output = std::result::Result<R, HandlerError>> + Send + 'static,
{
    handler: F,
    _phantom: PhantomData<fn(T) -> (R, Fut)>,
}

impl<F, T, R, Fut> FnHandler<F, T, R, Fut>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    Fut: Future<Output = std::result::Result<R, HandlerError>> + Send + 'static,
{
    /// Create a new typed handler.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, T, R, Fut> Handler for FnHandler<F, T, R, Fut>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    Fut: Future<Output = std::result::Result<R, HandlerError>> + Send + 'static,
{
    fn call(&self, params: Value) -> BoxFuture<'static, HandlerResult> {
        let parsed: T = match serde_json::from_value(params) {
            Ok(v) => v,
            Err(e) => return Box::pin(async move { Err(HandlerError::from(e)) }),
        };

        let fut = (self.handler)(parsed);
        Box::pin(async move {
            let output = fut.await?;
            serde_json::to_value(output).map_err(HandlerError::from)
        })
    }
}

/// Wrap a typed async closure as a [`Handler`].
pub fn handler_fn<F, T, R, Fut>(handler: F) -> FnHandler<F, T, R, Fut>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    Fut: Future<Output = std::result::Result<R, HandlerError>> + Send + 'static,
{
    FnHandler::new(handler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct AddInput {
        x: i64,
    }

    #[tokio::test]
    async fn test_typed_params_and_output() {
        let handler = handler_fn(|input: AddInput| async move { Ok(input.x + 1) });

        let out = handler.call(json!({"x": 1})).await.unwrap();
        assert_eq!(out, json!(2));
    }

    #[tokio::test]
    async fn test_raw_value_params() {
        let handler = handler_fn(|params: Value| async move { Ok(params) });

        let out = handler.call(json!({"a": [1, 2]})).await.unwrap();
        assert_eq!(out, json!({"a": [1, 2]}));
    }

    #[tokio::test]
    async fn test_handler_error_passes_through() {
        let handler =
            handler_fn(|_: Value| async move { Err::<Value, _>(HandlerError::new("boom")) });

        let err = handler.call(json!({})).await.unwrap_err();
        assert_eq!(err.message(), "boom");
    }

    #[tokio::test]
    async fn test_param_mismatch_is_handler_error() {
        let handler = handler_fn(|input: AddInput| async move { Ok(input.x) });

        let err = handler.call(json!({})).await.unwrap_err();
        assert!(err.message().contains("missing field `x`"));
    }

    #[test]
    fn test_empty_message_described() {
        assert_eq!(HandlerError::new("").describe(), "unknown error");
        assert_eq!(HandlerError::new("bad").to_string(), "bad");
    }

    #[test]
    fn test_handler_is_object_safe() {
        let handler: Box<dyn Handler> = Box::new(handler_fn(|_: ()| async { Ok(()) }));
        let _ = handler;
    }
}
