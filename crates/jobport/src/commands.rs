//! Subcommand implementations

use crate::cli::{CliError, Commands};
use jobport_export::{
    CacheDecision, ExportConfig, ExportPolicy, ExportReport, JobRecord, JobStatus, PatternRenderer,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tracing::{debug, instrument};

/// Process configuration file
///
/// Only the `[export]` table is read; other tables belong to the runner.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcessFile {
    /// Export settings
    #[serde(default)]
    pub export: ExportConfig,
}

/// Renders `{key}` placeholders from the job's top-level template data
///
/// Unknown keys are left in place so that the pattern simply fails to match.
#[derive(Debug, Clone, Copy, Default)]
pub struct Placeholders;

impl PatternRenderer for Placeholders {
    fn render(&self, pattern: &str, data: &serde_json::Value) -> String {
        let Some(map) = data.as_object() else {
            return pattern.to_string();
        };

        let mut rendered = pattern.to_string();
        for (key, value) in map {
            let text = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(_) | serde_json::Value::Bool(_) => value.to_string(),
                _ => continue,
            };
            rendered = rendered.replace(&format!("{{{key}}}"), &text);
        }
        rendered
    }
}

/// Load the `[export]` table of a process configuration file
pub fn load_process(path: &Path) -> Result<ExportConfig, CliError> {
    let content = fs::read_to_string(path).map_err(|e| {
        CliError::config_with_help(
            format!("Cannot read process config {}: {e}", path.display()),
            "Pass an existing TOML file with --config",
        )
    })?;
    let process: ProcessFile = toml::from_str(&content).map_err(|e| {
        CliError::config(format!("Invalid process config {}: {e}", path.display()))
    })?;
    debug!(config = ?process.export, "Loaded process config");
    Ok(process.export)
}

/// Load a job record from a JSON job file
pub fn load_job(path: &Path) -> Result<JobRecord, CliError> {
    let content = fs::read_to_string(path).map_err(|e| {
        CliError::config_with_help(
            format!("Cannot read job file {}: {e}", path.display()),
            "Pass an existing JSON job record with --job",
        )
    })?;
    serde_json::from_str(&content)
        .map_err(|e| CliError::config(format!("Invalid job file {}: {e}", path.display())))
}

fn save_job(path: &Path, job: &JobRecord) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(job)
        .map_err(|e| CliError::runtime(format!("Cannot serialize job record: {e}")))?;
    fs::write(path, json)
        .map_err(|e| CliError::runtime(format!("Cannot write job file {}: {e}", path.display())))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string(value)
        .map_err(|e| CliError::runtime(format!("Cannot serialize result: {e}")))?;
    writeln!(io::stdout(), "{json}")
        .map_err(|e| CliError::runtime(format!("Cannot write to stdout: {e}")))
}

/// Create the export directory of a process
pub fn prepare(config: &Path) -> Result<(), CliError> {
    let policy = ExportPolicy::with_renderer(load_process(config)?, Placeholders);
    policy.prepare()?;
    Ok(())
}

/// Export a finished job and return the report
pub fn export(config: &Path, job: &Path, status: JobStatus) -> Result<ExportReport, CliError> {
    let policy = ExportPolicy::with_renderer(load_process(config)?, Placeholders);
    let record = load_job(job)?;
    let report = policy.post_job_completion(&record, status)?;
    if report.is_noop() {
        debug!(job = record.index, %status, "No outputs exported");
    }
    Ok(report)
}

/// Try to restore a job from its export
///
/// With `write_back` the updated record is saved whether or not the job was
/// restored, so the runner always reads a consistent file.
pub fn restore(config: &Path, job: &Path, write_back: bool) -> Result<CacheDecision, CliError> {
    let policy = ExportPolicy::with_renderer(load_process(config)?, Placeholders);
    let mut record = load_job(job)?;
    let decision = policy.pre_job_execution(&mut record)?;
    if write_back {
        save_job(job, &record)?;
    }
    Ok(decision)
}

/// Run one subcommand, printing its JSON result on stdout
#[instrument(level = "debug", skip_all)]
pub fn execute(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Prepare { config } => prepare(&config),
        Commands::Export {
            config,
            job,
            status,
        } => print_json(&export(&config, &job, status.into())?),
        Commands::Restore {
            config,
            job,
            write_back,
        } => print_json(&restore(&config, &job, write_back)?),
    }
}
