//! Embedded handler - serve a Rust closure instead of a user module.
//!
//! This demo shows:
//! - Wrapping a typed async closure with `handler_fn`
//! - Binding the runtime socket from `SOCK_PATH`
//! - Serving until Ctrl-C
//!
//! # Try it
//!
//! ```sh
//! SOCK_PATH=/tmp/fn.sock cargo run --example embedded
//! curl --unix-socket /tmp/fn.sock -d '{"system_metadata":{"request_id":"r1"},"user_params":{"x":1}}' http://localhost/
//! # {"result":"2","success":true,"memory_usage":0,"error_message":null}
//! ```

use std::sync::Arc;

use function_runtime::{handler_fn, logging, HandlerError, RuntimeConfig, Server};
use serde::Deserialize;

/// Input structure for the add-one function.
#[derive(Deserialize, Debug)]
struct AddInput {
    x: i64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let handler = handler_fn(|input: AddInput| async move {
        tracing::info!("adding one to {}", input.x);
        input
            .x
            .checked_add(1)
            .ok_or_else(|| HandlerError::new("x is too large"))
    });

    let config = RuntimeConfig::from_env();
    let server = Server::builder(Arc::new(handler)).config(&config).bind()?;

    // Serve until Ctrl-C
    server.run().await?;

    Ok(())
}
