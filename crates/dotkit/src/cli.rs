//! Command-line interface definition and error-to-exit-code mapping.

use clap::{Parser, Subcommand};
use miette::Diagnostic;
use std::error::Error as _;
use std::path::PathBuf;
use thiserror::Error;

use dotkit_core::Redacted;
use dotkit_toolchain::Tool;

/// Exit code for success.
pub const EXIT_OK: i32 = 0;
/// CLI or configuration error exit code.
pub const EXIT_CLI: i32 = 2;
/// Pipeline (download/verify/install) error exit code.
pub const EXIT_PIPELINE: i32 = 3;

/// CLI-specific error types with proper exit code mapping.
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// Invalid invocation or configuration (exit code 2).
    #[error("{message}")]
    #[diagnostic(code(dotkit::cli::config))]
    Config {
        /// The error message.
        message: String,
        /// Optional help text.
        #[help]
        help: Option<String>,
    },

    /// A pipeline operation failed (exit code 3).
    #[error("{message}")]
    #[diagnostic(code(dotkit::cli::pipeline))]
    Pipeline {
        /// The error message.
        message: String,
        /// Optional help text.
        #[help]
        help: Option<String>,
    },
}

impl CliError {
    /// Create a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a pipeline error.
    #[must_use]
    pub fn pipeline(message: impl Into<String>) -> Self {
        Self::Pipeline {
            message: message.into(),
            help: None,
        }
    }

    /// Create a pipeline error with help text.
    #[must_use]
    pub fn pipeline_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Pipeline {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// The process exit code for this error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => EXIT_CLI,
            Self::Pipeline { .. } => EXIT_PIPELINE,
        }
    }
}

impl From<dotkit_toolchain::Error> for CliError {
    fn from(err: dotkit_toolchain::Error) -> Self {
        use dotkit_toolchain::Error;
        let message = err.to_string();
        match err {
            Error::VerificationFailed { .. }
            | Error::SignatureMissing { .. }
            | Error::ChecksumNotFound { .. }
            | Error::ChecksumMismatch { .. } => Self::pipeline_with_help(
                message,
                "The downloaded release could not be authenticated. Retry later; if this persists, the release host may be compromised.",
            ),
            Error::NotInstalled { tool } => Self::pipeline_with_help(
                message,
                format!("Run `dotkit install {tool}` first"),
            ),
            // Raw IO and keyring messages can embed absolute paths; show a
            // sanitized message and keep the cause in the log.
            Error::Io(io) => {
                let redacted = Redacted::wrap("a filesystem operation failed", io);
                tracing::debug!(cause = ?redacted.source(), "Redacted filesystem error");
                Self::pipeline(redacted.to_string())
            }
            _ => Self::pipeline(message),
        }
    }
}

/// dotkit - pin and bootstrap the developer tools an environment needs.
#[derive(Parser, Debug)]
#[command(name = "dotkit", version, about, long_about = None)]
pub struct Cli {
    /// Install root override (default: platform data directory).
    #[arg(long, global = true, env = "DOTKIT_ROOT")]
    pub root: Option<PathBuf>,

    /// Overall deadline for network operations, in seconds.
    #[arg(long, global = true, default_value_t = 600)]
    pub timeout: u64,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download, verify, and install the wrapped tools.
    Install {
        /// A single tool to install; both when omitted.
        tool: Option<Tool>,
    },
    /// Show the install state of each wrapped tool.
    Status,
    /// Print the managed path of a tool's binary.
    Which {
        /// The tool to locate.
        tool: Tool,
    },
    /// (Re)write the embedded verification keyrings.
    Keyrings,
}

/// Parse command-line arguments.
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}
