//! Marker sinks.

use std::sync::Mutex;

use super::{write_stdout_line, LogMarker};

/// Destination for correlation markers.
pub trait MarkerSink: Send + Sync + 'static {
    /// Emit one marker. Must not fail the invocation.
    fn emit(&self, marker: LogMarker<'_>);
}

/// Writes markers to process stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutMarkers;

impl MarkerSink for StdoutMarkers {
    fn emit(&self, marker: LogMarker<'_>) {
        if let Err(e) = write_stdout_line(&marker.line()) {
            tracing::warn!("failed to write log marker: {}", e);
        }
    }
}

/// Keeps marker lines in memory, in emission order.
#[derive(Debug, Default)]
pub struct RecordingMarkers {
    lines: Mutex<Vec<String>>,
}

impl RecordingMarkers {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the lines emitted so far.
    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl MarkerSink for RecordingMarkers {
    fn emit(&self, marker: LogMarker<'_>) {
        let line = marker.line();
        match self.lines.lock() {
            Ok(mut lines) => lines.push(line),
            Err(poisoned) => poisoned.into_inner().push(line),
        }
    }
}
