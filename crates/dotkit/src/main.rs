//! dotkit CLI entry point.
//!
//! Parses arguments, sets up tracing, and drives the toolchain pipeline
//! with a bounded deadline and Ctrl-C cancellation.

// The CLI binary intentionally writes to stdout/stderr.
#![allow(clippy::print_stdout, clippy::print_stderr)]

mod cli;
mod commands;

use std::time::Duration;

use miette::Report;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use cli::{Cli, CliError, Command, EXIT_OK};
use dotkit_core::InstallRoot;
use dotkit_toolchain::{ManagerConfig, ToolManager};

fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("dotkit panicked: {panic_info}");
        eprintln!("Run with RUST_LOG=debug for more information.");
    }));

    let cli = cli::parse();
    init_tracing();

    let exit_code = match run(cli) {
        Ok(()) => EXIT_OK,
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", Report::new(err));
            code
        }
    };
    std::process::exit(exit_code);
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    let root = cli
        .root
        .clone()
        .map_or_else(InstallRoot::default, InstallRoot::new);
    let manager = ToolManager::new(ManagerConfig::default().with_root(root))
        .map_err(|err| CliError::config(format!("failed to set up manager: {err}")))?;

    match cli.command {
        // Synchronous commands never need the runtime.
        Command::Status => commands::status(&manager),
        Command::Which { tool } => commands::which(&manager, tool),
        Command::Keyrings => commands::keyrings(&manager),
        Command::Install { tool } => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|err| CliError::config(format!("failed to create runtime: {err}")))?;
            runtime.block_on(run_install(&manager, tool, cli.timeout))
        }
    }
}

async fn run_install(
    manager: &ToolManager,
    tool: Option<dotkit_toolchain::Tool>,
    timeout_secs: u64,
) -> Result<(), CliError> {
    let cancel = CancellationToken::new();

    // Ctrl-C cancels in-flight downloads instead of killing the process
    // mid-write; the pipeline's atomic rename discipline does the rest.
    let ctrlc_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrlc_cancel.cancel();
        }
    });

    let deadline = Duration::from_secs(timeout_secs);
    match tokio::time::timeout(deadline, commands::install(manager, tool, &cancel)).await {
        Ok(result) => result,
        Err(_) => Err(CliError::pipeline(format!(
            "install did not finish within {timeout_secs}s"
        ))),
    }
}
