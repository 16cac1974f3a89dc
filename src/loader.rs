//! Handler loader.
//!
//! Resolves the user module once at startup and normalizes its export into a
//! single [`Handler`]. Two export shapes are accepted:
//!
//! - **module**: the file itself is an executable program (a `#!` script or
//!   an ELF binary), so the module *is* the handler
//! - **handler field**: the file is a JSON manifest whose `handler` field
//!   names an executable, either as a path or as an argv array
//!
//! ```text
//! {"handler": "bin/main"}
//! {"handler": ["/usr/bin/python3", "main.py"]}
//! ```
//!
//! Relative programs are resolved against the manifest's directory, which is
//! also the handler's working directory.
//!
//! The execute bit alone does not make a module: a manifest that picked up
//! mode `0755` is still read as a manifest.

use std::fmt;
use std::io::Read;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::handler::{CommandHandler, Handler};

/// Why the user handler could not be resolved.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Nothing exists at the user code path.
    #[error("user code not found at {}", .0.display())]
    UserCodeNotFound(PathBuf),

    /// The module is neither invocable nor exposes an invocable `handler`.
    #[error("no valid handler found in {} (expected an executable module or a `handler` field)", .0.display())]
    NoValidHandler(PathBuf),

    /// The module exists but could not be inspected.
    #[error("failed to read user code at {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),
}

/// Which export shape produced the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportShape {
    /// The module itself is invocable.
    Module,
    /// The module's `handler` field is invocable.
    HandlerField,
}

impl fmt::Display for ExportShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportShape::Module => f.write_str("module"),
            ExportShape::HandlerField => f.write_str("handler field"),
        }
    }
}

/// A resolved handler.
pub struct LoadedHandler {
    pub handler: Arc<dyn Handler>,
    pub shape: ExportShape,
    /// Program that will run on each invocation.
    pub program: PathBuf,
}

impl fmt::Debug for LoadedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedHandler")
            .field("shape", &self.shape)
            .field("program", &self.program)
            .finish_non_exhaustive()
    }
}

/// Resolve the user handler at `path`.
pub fn resolve(path: impl AsRef<Path>) -> Result<LoadedHandler, LoadError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(LoadError::UserCodeNotFound(path.to_path_buf()));
    }

    if is_executable(path) && is_program_image(path) {
        let handler = CommandHandler::new(path);
        return Ok(LoadedHandler {
            handler: Arc::new(handler),
            shape: ExportShape::Module,
            program: path.to_path_buf(),
        });
    }

    if !path.is_file() {
        return Err(LoadError::NoValidHandler(path.to_path_buf()));
    }

    let bytes = std::fs::read(path).map_err(|e| LoadError::Io(path.to_path_buf(), e))?;
    let base = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let handler = serde_json::from_slice::<Value>(&bytes)
        .ok()
        .and_then(|manifest| handler_field(&manifest, base))
        .ok_or_else(|| LoadError::NoValidHandler(path.to_path_buf()))?;

    Ok(LoadedHandler {
        program: handler.program().to_path_buf(),
        handler: Arc::new(handler),
        shape: ExportShape::HandlerField,
    })
}

/// Build a handler from the manifest's `handler` field, if it is invocable.
fn handler_field(manifest: &Value, base: &Path) -> Option<CommandHandler> {
    let argv: Vec<&str> = match manifest.get("handler")? {
        Value::String(program) => vec![program.as_str()],
        Value::Array(items) => items.iter().map(Value::as_str).collect::<Option<_>>()?,
        _ => return None,
    };

    let (program, args) = argv.split_first()?;
    if program.is_empty() {
        return None;
    }

    let program = base.join(program);
    if !is_executable(&program) {
        return None;
    }

    Some(
        CommandHandler::new(program)
            .args(args.iter().copied())
            .working_dir(base),
    )
}

fn is_executable(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

/// Starts with an interpreter line or ELF magic.
fn is_program_image(path: &Path) -> bool {
    let mut head = Vec::with_capacity(4);
    let read = std::fs::File::open(path).and_then(|file| file.take(4).read_to_end(&mut head));
    read.is_ok() && (head.starts_with(b"#!") || head.starts_with(b"\x7fELF"))
}
