//! Correlation module - per-invocation log bracketing.
//!
//! The platform log collector splits container output into invocations by
//! looking for two exact lines on stdout:
//!
//! ```text
//! ===LOG_START:<request_id>===
//! ...anything the handler logs...
//! ===LOG_END:<request_id>===
//! ```
//!
//! The request id is passed explicitly to every marker call; there is no
//! ambient "current request" state.

mod markers;
mod stdio;

use std::fmt;

pub use markers::{MarkerSink, RecordingMarkers, StdoutMarkers};
pub use stdio::write_stdout_line;

use crate::protocol::UNKNOWN_REQUEST_ID;

/// Identifier bracketing one invocation's log output.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Wrap a request id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id used when the envelope carries none.
    pub fn unknown() -> Self {
        Self(UNKNOWN_REQUEST_ID.to_string())
    }

    /// Borrow the id.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A bracket line for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMarker<'a> {
    Start(&'a CorrelationId),
    End(&'a CorrelationId),
}

impl LogMarker<'_> {
    /// The exact line written to the log, without the trailing newline.
    pub fn line(&self) -> String {
        match self {
            LogMarker::Start(id) => format!("===LOG_START:{}===", id),
            LogMarker::End(id) => format!("===LOG_END:{}===", id),
        }
    }
}
