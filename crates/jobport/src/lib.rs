//! jobport command-line front end
//!
//! Wraps [`jobport_export`] for pipeline runners that drive export and
//! export-caching from the shell: one invocation per lifecycle hook, with
//! the process configuration in TOML and the job record in JSON.

pub mod cli;
pub mod commands;
pub mod tracing;
