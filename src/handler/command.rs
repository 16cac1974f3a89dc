//! Child-process handler.
//!
//! Each invocation spawns the user program once:
//! - **stdin**: the user parameters as JSON, then EOF
//! - **stdout**: the return value (JSON, or plain text)
//! - **stderr**: inherited, so user log lines land inside the correlation markers
//!
//! A non-zero exit status is a failed invocation; the trimmed stdout becomes
//! the error message.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{BoxFuture, Handler, HandlerError, HandlerResult};

/// Runs user code as an executable.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    program: PathBuf,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl CommandHandler {
    /// Create a handler for the given program.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    /// Append arguments passed on every invocation.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run the program from this directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Program path.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Fixed arguments.
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        command
    }
}

impl Handler for CommandHandler {
    fn call(&self, params: Value) -> BoxFuture<'static, HandlerResult> {
        let mut command = self.command();
        let program = self.program.clone();

        Box::pin(async move {
            let input = serde_json::to_vec(&params)?;
            let mut child = command.spawn().map_err(|e| {
                HandlerError::new(format!("failed to start {}: {}", program.display(), e))
            })?;

            let stdin = child.stdin.take();
            let feed = async move {
                if let Some(mut stdin) = stdin {
                    match stdin.write_all(&input).await {
                        // The program may exit without reading its input.
                        Err(e) if e.kind() == ErrorKind::BrokenPipe => {}
                        other => other?,
                    }
                }
                Ok::<_, std::io::Error>(())
            };

            let (fed, output) = tokio::join!(feed, child.wait_with_output());
            let output = output?;
            fed?;

            let stdout = String::from_utf8_lossy(&output.stdout);
            let stdout = stdout.trim();
            if output.status.success() {
                Ok(parse_output(stdout))
            } else {
                Err(failure(stdout, output.status))
            }
        })
    }
}

fn parse_output(stdout: &str) -> Value {
    if stdout.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(stdout).unwrap_or_else(|_| Value::String(stdout.to_string()))
}

fn failure(stdout: &str, status: ExitStatus) -> HandlerError {
    if stdout.is_empty() {
        HandlerError::new(format!("handler exited with {}", status))
    } else {
        HandlerError::new(stdout)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::json;

    fn sh(script: &str) -> CommandHandler {
        CommandHandler::new("/bin/sh").args(["-c", script])
    }

    #[tokio::test]
    async fn test_json_stdout_is_result() {
        let handler = sh(r#"cat >/dev/null; echo '{"ok":true}'"#);

        let out = handler.call(json!({})).await.unwrap();
        assert_eq!(out, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_params_arrive_on_stdin() {
        let handler = sh("cat");

        let out = handler.call(json!({"x": 1})).await.unwrap();
        assert_eq!(out, json!({"x": 1}));
    }

    #[tokio::test]
    async fn test_plain_text_stdout() {
        let handler = sh("echo hello world");

        let out = handler.call(json!({})).await.unwrap();
        assert_eq!(out, json!("hello world"));
    }

    #[tokio::test]
    async fn test_empty_stdout_is_null() {
        let handler = sh("true");

        let out = handler.call(json!({})).await.unwrap();
        assert_eq!(out, Value::Null);
    }

    #[tokio::test]
    async fn test_nonzero_exit_uses_stdout_as_message() {
        let handler = sh("echo boom; exit 3");

        let err = handler.call(json!({})).await.unwrap_err();
        assert_eq!(err.message(), "boom");
    }

    #[tokio::test]
    async fn test_nonzero_exit_without_output() {
        let handler = sh("exit 2");

        let err = handler.call(json!({})).await.unwrap_err();
        assert!(err.message().starts_with("handler exited with"));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let handler = CommandHandler::new("/nonexistent/handler");

        let err = handler.call(json!({})).await.unwrap_err();
        assert!(err.message().starts_with("failed to start /nonexistent/handler"));
    }

    #[tokio::test]
    async fn test_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let handler = sh("pwd").working_dir(dir.path());

        let out = handler.call(json!({})).await.unwrap();
        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(out, json!(expected.to_string_lossy()));
    }
}
