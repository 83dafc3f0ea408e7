//! Job output export and export-backed caching for jobport
//!
//! This crate lets a pipeline runner externalize the outputs of finished jobs
//! and later rebuild a job's outputs from that export instead of rerunning it:
//! - Output selection, full or by partial-export patterns
//! - Four transfer strategies: gzip, copy, link and move
//! - Export-caching, the inverse of the transfer, before a job runs
//!
//! # Overview
//!
//! The runner drives the crate through [`ExportPolicy`], built once per
//! process from an immutable [`ExportConfig`]:
//! - [`ExportPolicy::post_job_completion`] runs after a job finishes and
//!   exports the selected outputs
//! - [`ExportPolicy::pre_job_execution`] runs before a job starts and marks the
//!   job cached when every output could be restored from the export
//!
//! # Concurrency
//!
//! Calls are synchronous. Jobs in other processes may race on the same export
//! directory, so every transfer and restoration holds an exclusive advisory
//! lock keyed by the pair of paths involved.

mod error;

pub mod config;
pub mod events;
pub mod fsops;
pub mod job;
pub mod lock;
pub mod naming;
pub mod policy;
pub mod render;
pub mod restore;
pub mod select;
pub mod transfer;

// Re-export error types at crate root
pub use error::{Error, Result};

// Re-export main types
pub use config::{CacheMode, ExportConfig, ExportSpec, ExportStrategy};
pub use events::ExportEvent;
pub use job::{Job, JobOutput, JobRecord, JobStatus, OutputKind};
pub use naming::exported_path;
pub use policy::ExportPolicy;
pub use render::{PatternRenderer, Verbatim};
pub use restore::{CacheDecision, CacheRestorer, DeclineReason};
pub use select::select_outputs;
pub use transfer::{ExportReport, TransferEngine, TransferOutcome};
