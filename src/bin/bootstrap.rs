//! Runtime entry point started by the container supervisor.
//!
//! Exit status is 0 after an interrupt and 1 when the user handler cannot be
//! resolved or the socket cannot be bound.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use function_runtime::config::DEFAULT_USER_CODE_PATH;
use function_runtime::{logging, loader, RuntimeConfig, Server};

#[derive(Debug, Parser)]
#[command(name = "bootstrap", version, about = "Serve the user function over a Unix socket")]
struct Args {
    /// Path of the user module.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_USER_CODE_PATH)]
    code: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    logging::init();
    let args = Args::parse();
    let config = RuntimeConfig::from_env().with_user_code_path(&args.code);

    let loaded = match loader::resolve(&config.user_code_path) {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!("failed to load user function: {}", e);
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(
        shape = %loaded.shape,
        program = %loaded.program.display(),
        "user function loaded from {}",
        config.user_code_path.display()
    );

    let server = match Server::builder(loaded.handler).config(&config).bind() {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("failed to bind {}: {}", config.socket_path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    match server.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("server error: {}", e);
            ExitCode::FAILURE
        }
    }
}
