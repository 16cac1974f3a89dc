//! Handler module - the user function as a callable capability.
//!
//! Provides:
//! - [`Handler`] - one callable contract for every kind of user code
//! - [`FnHandler`] / [`handler_fn`] - in-process typed async closures
//! - [`CommandHandler`] - user code run as a child process per invocation
//!
//! # Example
//!
//! ```ignore
//! use function_runtime::handler::{handler_fn, HandlerError};
//! use serde_json::{json, Value};
//!
//! let handler = handler_fn(|params: Value| async move {
//!     let x = params["x"].as_i64().ok_or_else(|| HandlerError::new("x is required"))?;
//!     Ok::<_, HandlerError>(json!(x + 1))
//! });
//! ```

mod command;
mod function;

pub use command::CommandHandler;
pub use function::{handler_fn, BoxFuture, FnHandler, Handler, HandlerError, HandlerResult};
