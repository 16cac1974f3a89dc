//! # function-runtime
//!
//! Invocation shim for serverless function containers.
//!
//! A supervisor starts one runtime process per container. The process loads
//! the user handler once, binds a Unix socket and answers each HTTP request
//! on it with exactly one invocation of the handler.
//!
//! ## Architecture
//!
//! - **Loader** ([`loader`]): resolves the user module into a [`Handler`],
//!   or fails the process before anything is bound
//! - **Server** ([`server`]): Unix socket + HTTP/1.1, one invocation per request
//! - **Invoker** ([`invocation`]): envelope decoding, correlation markers,
//!   memory accounting and response shaping around each call
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use function_runtime::{handler_fn, HandlerError, Server};
//! use serde_json::{json, Value};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let handler = handler_fn(|params: Value| async move {
//!         let x = params["x"].as_i64().ok_or_else(|| HandlerError::new("x is required"))?;
//!         Ok::<_, HandlerError>(json!(x + 1))
//!     });
//!
//!     Server::builder(Arc::new(handler)).bind()?.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod correlation;
pub mod error;
pub mod handler;
pub mod invocation;
pub mod loader;
pub mod logging;
pub mod protocol;
pub mod transport;
pub mod usage;

mod server;

pub use config::RuntimeConfig;
pub use error::RuntimeError;
pub use handler::{handler_fn, CommandHandler, Handler, HandlerError};
pub use invocation::Invoker;
pub use loader::{resolve, ExportShape, LoadError, LoadedHandler};
pub use protocol::{InvocationEnvelope, InvocationResponse};
pub use server::{Server, ServerBuilder};
