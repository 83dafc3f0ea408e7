//! Error types for the export crate

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failures of export, restoration and their filesystem primitives
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// A filesystem primitive failed on `path`
    #[error("{operation} failed on {}", path.display())]
    #[diagnostic(
        code(jobport::export::io),
        help("Check permissions and free space under the export and output directories")
    )]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path the primitive was acting on
        path: PathBuf,
        /// Primitive that failed (e.g. "copy", "rename", "lock")
        operation: String,
    },

    /// Invalid export settings
    #[error("Invalid export configuration: {message}")]
    #[diagnostic(code(jobport::export::config))]
    Configuration {
        /// What is wrong with the settings
        message: String,
    },

    /// Destination already exists and overwriting is disabled
    #[error("Destination exists and overwrite is disabled: {}", path.display())]
    #[diagnostic(
        code(jobport::export::destination_exists),
        help("Remove the existing file or set `export_overwrite = true`")
    )]
    DestinationExists {
        /// The destination that would have been replaced
        path: PathBuf,
    },
}

impl Error {
    /// Invalid settings
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    /// `operation` failed on `path`
    #[must_use]
    pub fn io(source: std::io::Error, path: impl AsRef<Path>, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: path.as_ref().to_path_buf(),
            operation: operation.into(),
        }
    }

    /// Overwrite refused at `path`
    #[must_use]
    pub fn destination_exists(path: impl Into<PathBuf>) -> Self {
        Self::DestinationExists { path: path.into() }
    }
}

/// Result type for export operations
pub type Result<T> = std::result::Result<T, Error>;
