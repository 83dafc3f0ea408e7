//! Command-line surface: argument parsing, error categories and exit codes

use crate::tracing::{LogLevel, TracingFormat};
use clap::{Parser, Subcommand, ValueEnum};
use miette::{Diagnostic, Report};
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the CLI application
pub const EXIT_OK: i32 = 0;
/// CLI or configuration error exit code
pub const EXIT_CLI: i32 = 2;
/// Filesystem or runtime error exit code
pub const EXIT_RUNTIME: i32 = 3;

/// CLI-specific error types with proper exit code mapping
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum CliError {
    /// CLI or configuration error (exit code 2)
    #[error("CLI/configuration error: {message}")]
    #[diagnostic(code(jobport::cli::config))]
    Config {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// Filesystem or other runtime error (exit code 3)
    #[error("Runtime error: {message}")]
    #[diagnostic(code(jobport::cli::runtime))]
    Runtime {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
}

impl CliError {
    /// Create a new configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new configuration error with help text
    #[must_use]
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a new runtime error
    #[must_use]
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new runtime error with help text
    #[must_use]
    pub fn runtime_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
            help: Some(help.into()),
        }
    }
}

/// Map export errors onto CLI categories.
///
/// Configuration problems exit with 2; filesystem failures, including a
/// destination that may not be overwritten, exit with 3.
impl From<jobport_export::Error> for CliError {
    fn from(err: jobport_export::Error) -> Self {
        match err {
            jobport_export::Error::Configuration { message } => Self::config(message),
            jobport_export::Error::Io {
                source,
                path,
                operation,
            } => Self::runtime_with_help(
                format!("I/O {operation} failed on {}: {source}", path.display()),
                "Check file permissions and ensure the path exists",
            ),
            jobport_export::Error::DestinationExists { .. } => Self::runtime_with_help(
                err.to_string(),
                "Remove the existing file or set `export_overwrite = true`",
            ),
        }
    }
}

/// Map CLI error to appropriate exit code
#[must_use]
pub const fn exit_code_for(err: &CliError) -> i32 {
    match err {
        CliError::Config { .. } => EXIT_CLI,
        CliError::Runtime { .. } => EXIT_RUNTIME,
    }
}

/// Render an error for humans on stderr
#[allow(clippy::print_stderr)]
pub fn render_error(err: &CliError) {
    let report = Report::new(err.clone());
    eprintln!("{report:?}");
    let _ = io::stderr().flush();
}

/// Job status reported by the runner after a job finishes
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum StatusArg {
    /// The job ran and succeeded
    Succeeded,
    /// The job was satisfied from a cache
    Cached,
    /// The job failed
    Failed,
}

impl From<StatusArg> for jobport_export::JobStatus {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::Succeeded => Self::Succeeded,
            StatusArg::Cached => Self::Cached,
            StatusArg::Failed => Self::Failed,
        }
    }
}

/// Export finished job outputs and rebuild jobs from previous exports.
#[derive(Parser, Debug)]
#[command(name = "jobport")]
#[command(about = "Export pipeline job outputs and restore jobs from their exports")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Logging verbosity level.
    #[arg(
        short = 'L',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub log_level: LogLevel,

    /// Log output format.
    #[arg(
        long,
        global = true,
        help = "Set log output format",
        default_value = "compact",
        value_enum
    )]
    pub log_format: TracingFormat,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the export directory of a process.
    #[command(about = "Create the export directory before any job runs")]
    Prepare {
        /// Process configuration file (TOML with an `[export]` table)
        #[arg(long, short = 'c')]
        config: PathBuf,
    },
    /// Export a finished job's outputs.
    #[command(about = "Export the outputs of a finished job")]
    Export {
        /// Process configuration file (TOML with an `[export]` table)
        #[arg(long, short = 'c')]
        config: PathBuf,
        /// Job record file (JSON)
        #[arg(long, short = 'j')]
        job: PathBuf,
        /// Completion status of the job
        #[arg(long, short = 's', value_enum, default_value = "succeeded")]
        status: StatusArg,
    },
    /// Rebuild a job's outputs from its previous export.
    #[command(about = "Restore a job's outputs from its export instead of running it")]
    Restore {
        /// Process configuration file (TOML with an `[export]` table)
        #[arg(long, short = 'c')]
        config: PathBuf,
        /// Job record file (JSON)
        #[arg(long, short = 'j')]
        job: PathBuf,
        /// Write the updated job record back to the job file
        #[arg(long)]
        write_back: bool,
    },
}

/// Parse process arguments
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code_for(&CliError::config("bad")), EXIT_CLI);
        assert_eq!(exit_code_for(&CliError::runtime("io")), EXIT_RUNTIME);
    }

    #[test]
    fn test_parse_export_command() {
        let cli = Cli::try_parse_from([
            "jobport",
            "export",
            "--config",
            "proc.toml",
            "--job",
            "job.json",
            "--status",
            "cached",
        ])
        .unwrap();

        match cli.command {
            Commands::Export {
                config,
                job,
                status,
            } => {
                assert_eq!(config, Path::new("proc.toml"));
                assert_eq!(job, Path::new("job.json"));
                assert_eq!(status, StatusArg::Cached);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.log_level, LogLevel::Warn);
        assert_eq!(cli.log_format, TracingFormat::Compact);
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "jobport",
            "restore",
            "-c",
            "proc.toml",
            "-j",
            "job.json",
            "--write-back",
            "--log-level",
            "debug",
            "--log-format",
            "json",
        ])
        .unwrap();

        assert!(matches!(
            cli.command,
            Commands::Restore {
                write_back: true,
                ..
            }
        ));
        assert_eq!(cli.log_level, LogLevel::Debug);
        assert_eq!(cli.log_format, TracingFormat::Json);
    }

    #[test]
    fn test_export_requires_job() {
        let result = Cli::try_parse_from(["jobport", "export", "--config", "proc.toml"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_export_error_mapping() {
        let err: CliError = jobport_export::Error::configuration("unknown strategy").into();
        assert!(matches!(err, CliError::Config { .. }));

        let err: CliError = jobport_export::Error::destination_exists("/tmp/x").into();
        assert!(matches!(err, CliError::Runtime { .. }));

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: CliError = jobport_export::Error::io(io, "/tmp/y", "copy").into();
        assert!(err.to_string().contains("I/O copy failed on /tmp/y"));
    }
}
