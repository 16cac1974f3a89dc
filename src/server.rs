//! Server builder and accept loop.
//!
//! The [`ServerBuilder`] configures the handler, socket and per-request
//! collaborators. The [`Server`] manages the lifecycle:
//! 1. Bind the Unix socket (stale file removed, mode `0o777`)
//! 2. Accept connections until shutdown
//! 3. Serve HTTP/1.1 on each connection, one invocation per request
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use function_runtime::{handler_fn, HandlerError, Server};
//! use serde_json::Value;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let handler = handler_fn(|params: Value| async move { Ok::<_, HandlerError>(params) });
//!     let server = Server::builder(Arc::new(handler))
//!         .socket_path("/tmp/function.sock")
//!         .bind()?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

use std::convert::Infallible;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::UnixStream;

use crate::config::{RuntimeConfig, DEFAULT_MAX_BODY_BYTES, DEFAULT_SOCK_PATH};
use crate::correlation::MarkerSink;
use crate::error::{Result, RuntimeError};
use crate::handler::Handler;
use crate::invocation::{Invoker, Phase};
use crate::protocol::InvocationResponse;
use crate::transport::SocketListener;
use crate::usage::MemoryProbe;

/// Builder for configuring and binding a runtime server.
pub struct ServerBuilder {
    invoker: Invoker,
    socket_path: PathBuf,
    max_body_bytes: usize,
}

impl ServerBuilder {
    /// Create a builder serving the given handler.
    pub fn new(handler: Arc<dyn Handler>) -> Self {
        Self {
            invoker: Invoker::new(handler),
            socket_path: PathBuf::from(DEFAULT_SOCK_PATH),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Take socket path and body limit from a config.
    pub fn config(mut self, config: &RuntimeConfig) -> Self {
        self.socket_path = config.socket_path.clone();
        self.max_body_bytes = config.max_body_bytes;
        self
    }

    /// Set the socket path.
    ///
    /// Default: `/var/run/function.sock`
    pub fn socket_path(mut self, path: impl AsRef<Path>) -> Self {
        self.socket_path = path.as_ref().to_path_buf();
        self
    }

    /// Set the largest accepted request body.
    ///
    /// Default: 6 MiB
    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Set where correlation markers are written.
    ///
    /// Default: stdout
    pub fn markers(mut self, markers: Arc<dyn MarkerSink>) -> Self {
        self.invoker = self.invoker.with_markers(markers);
        self
    }

    /// Set the memory probe used for `memory_usage`.
    ///
    /// Default: process RSS
    pub fn memory_probe(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.invoker = self.invoker.with_probe(probe);
        self
    }

    /// Bind the socket.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(self) -> Result<Server> {
        let listener = SocketListener::bind(&self.socket_path)?;
        tracing::info!("runtime listening on unix:{}", listener.path().display());

        Ok(Server {
            listener,
            invoker: self.invoker,
            max_body_bytes: self.max_body_bytes,
        })
    }
}

/// A bound runtime server.
pub struct Server {
    listener: SocketListener,
    invoker: Invoker,
    max_body_bytes: usize,
}

impl Server {
    /// Create a new server builder.
    pub fn builder(handler: Arc<dyn Handler>) -> ServerBuilder {
        ServerBuilder::new(handler)
    }

    /// Path of the bound socket.
    pub fn path(&self) -> &Path {
        self.listener.path()
    }

    /// Serve until Ctrl-C / SIGINT.
    pub async fn run(self) -> Result<()> {
        self.serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for interrupt: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Serve until `shutdown` completes.
    ///
    /// Stops accepting new connections on shutdown and removes the socket
    /// file. Connections already accepted keep running on their own tasks.
    pub async fn serve<S>(self, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested, no longer accepting connections");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(stream) => self.spawn_connection(stream),
                    Err(e) => tracing::warn!("accept failed: {}", e),
                },
            }
        }
    }

    fn spawn_connection(&self, stream: UnixStream) {
        let invoker = self.invoker.clone();
        let limit = self.max_body_bytes;

        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let invoker = invoker.clone();
                async move { Ok::<_, Infallible>(handle_request(invoker, req, limit).await) }
            });

            let io = TokioIo::new(stream);
            if let Err(err) = http1::Builder::new()
                .keep_alive(true)
                .serve_connection(io, service)
                .await
            {
                tracing::warn!("unix connection failed: {}", err);
            }
        });
    }
}

/// One HTTP exchange: buffer, invoke, reply 200 with the JSON body.
///
/// The invocation runs on its own task. hyper drops this future when the
/// client goes away, and the lifecycle must still reach its end marker.
async fn handle_request(
    invoker: Invoker,
    req: Request<Incoming>,
    limit: usize,
) -> Response<Full<Bytes>> {
    let body = read_body(req, limit).await;
    let task = tokio::spawn(async move { invoker.handle(body).await });
    let response = match task.await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!("invocation task failed: {}", e);
            InvocationResponse::failed(format!("invocation task failed: {e}"), 0)
        }
    };

    let mut reply = Response::new(Full::new(Bytes::from(response.to_json())));
    *reply.status_mut() = StatusCode::OK;
    reply
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    tracing::debug!(phase = ?Phase::Sent, success = response.success, "response written");
    reply
}

async fn read_body(req: Request<Incoming>, limit: usize) -> Result<Bytes> {
    if req.method() != hyper::Method::POST {
        tracing::debug!(method = %req.method(), "non-POST request treated as invocation");
    }

    match Limited::new(req.into_body(), limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<http_body_util::LengthLimitError>() => {
            Err(RuntimeError::BodyTooLarge { limit })
        }
        Err(e) => Err(RuntimeError::Body(e.to_string())),
    }
}
