//! Unix domain socket listener.
//!
//! The socket file is owned by this process for its lifetime:
//! - a stale file left by a crashed predecessor is removed before bind
//! - after bind the file is opened to every local user (`0o777`), because
//!   the invoker may run under a different uid
//! - the file is removed again when the listener is dropped
//!
//! # Example
//!
//! ```ignore
//! use function_runtime::transport::SocketListener;
//!
//! let listener = SocketListener::bind("/var/run/function.sock")?;
//! let stream = listener.accept().await?;
//! ```

use std::fs::Permissions;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tokio::net::{UnixListener, UnixStream};

use crate::error::Result;

/// Permissions applied to the socket file after bind.
pub const SOCKET_MODE: u32 = 0o777;

/// Unix Domain Socket listener.
#[derive(Debug)]
pub struct SocketListener {
    listener: UnixListener,
    path: PathBuf,
}

impl SocketListener {
    /// Bind to a Unix socket path.
    ///
    /// Removes any existing socket file at the path before binding.
    /// Must be called from within a tokio runtime.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Remove old socket if it exists
        if path.exists() {
            std::fs::remove_file(path)?;
        }

        let listener = UnixListener::bind(path)?;
        std::fs::set_permissions(path, Permissions::from_mode(SOCKET_MODE))?;

        Ok(Self {
            listener,
            path: path.to_path_buf(),
        })
    }

    /// Accept a single connection.
    pub async fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self.listener.accept().await?;
        Ok(stream)
    }

    /// Get the socket path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SocketListener {
    fn drop(&mut self) {
        // Clean up socket file when listener is dropped
        let _ = std::fs::remove_file(&self.path);
    }
}
