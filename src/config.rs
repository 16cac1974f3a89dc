//! Runtime configuration.
//!
//! Only the socket path is read from the environment (`SOCK_PATH`). The user
//! code location is fixed for a container image; it is kept on the config so
//! embedders and tests can point elsewhere.

use std::path::{Path, PathBuf};

/// Environment variable selecting the socket path.
pub const SOCK_PATH_ENV: &str = "SOCK_PATH";

/// Socket path used when `SOCK_PATH` is unset.
pub const DEFAULT_SOCK_PATH: &str = "/var/run/function.sock";

/// Where the supervisor places user code.
pub const DEFAULT_USER_CODE_PATH: &str = "/var/task/index";

/// Default request body limit (6 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 6 * 1024 * 1024;

/// Settings for one runtime process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Filesystem path of the Unix socket to bind.
    pub socket_path: PathBuf,
    /// Filesystem path of the user module.
    pub user_code_path: PathBuf,
    /// Largest accepted request body, in bytes.
    pub max_body_bytes: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCK_PATH),
            user_code_path: PathBuf::from(DEFAULT_USER_CODE_PATH),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl RuntimeConfig {
    /// Build a config from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(path) = lookup(SOCK_PATH_ENV).filter(|v| !v.is_empty()) {
            config.socket_path = PathBuf::from(path);
        }
        config
    }

    /// Override the user code path.
    pub fn with_user_code_path(mut self, path: impl AsRef<Path>) -> Self {
        self.user_code_path = path.as_ref().to_path_buf();
        self
    }

    /// Override the socket path.
    pub fn with_socket_path(mut self, path: impl AsRef<Path>) -> Self {
        self.socket_path = path.as_ref().to_path_buf();
        self
    }
}
