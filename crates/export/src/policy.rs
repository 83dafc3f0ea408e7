//! Lifecycle entry points invoked by the pipeline runner

use crate::config::ExportConfig;
use crate::fsops;
use crate::job::{Job, JobStatus};
use crate::render::{PatternRenderer, Verbatim};
use crate::restore::{CacheDecision, CacheRestorer};
use crate::select::select_outputs;
use crate::transfer::{ExportReport, TransferEngine};
use crate::Result;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, instrument};

/// Export behaviour of one process
///
/// The runner builds one policy per process and calls
/// [`ExportPolicy::post_job_completion`] after each job finishes and
/// [`ExportPolicy::pre_job_execution`] before each job runs.
pub struct ExportPolicy {
    config: ExportConfig,
    renderer: Box<dyn PatternRenderer + Send + Sync>,
    lock_dir: PathBuf,
}

impl fmt::Debug for ExportPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportPolicy")
            .field("config", &self.config)
            .field("lock_dir", &self.lock_dir)
            .finish_non_exhaustive()
    }
}

impl ExportPolicy {
    /// Policy whose partial-export patterns are used verbatim
    #[must_use]
    pub fn new(config: ExportConfig) -> Self {
        Self::with_renderer(config, Verbatim)
    }

    /// Policy rendering partial-export patterns with `renderer`
    #[must_use]
    pub fn with_renderer<R>(config: ExportConfig, renderer: R) -> Self
    where
        R: PatternRenderer + Send + Sync + 'static,
    {
        let lock_dir = config.resolved_lock_dir();
        Self {
            config,
            renderer: Box::new(renderer),
            lock_dir,
        }
    }

    /// The process configuration
    #[must_use]
    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Create the export directory before any job of the process runs
    pub fn prepare(&self) -> Result<()> {
        match &self.config.export_dir {
            Some(dir) => fsops::create_dir_all(dir),
            None => Ok(()),
        }
    }

    /// Export a finished job's outputs
    ///
    /// Failed jobs and processes without an export directory are left alone.
    #[instrument(level = "debug", skip_all, fields(job = job.index(), %status))]
    pub fn post_job_completion(&self, job: &dyn Job, status: JobStatus) -> Result<ExportReport> {
        if status == JobStatus::Failed || !self.config.is_enabled() {
            return Ok(ExportReport::default());
        }

        let spec = self.config.spec_for(self.renderer.as_ref(), job.data());
        let sources = select_outputs(job.outputs(), &spec, &job.output_dir());
        if sources.is_empty() {
            debug!("Nothing selected for export");
            return Ok(ExportReport::default());
        }

        TransferEngine::new(&spec, &self.lock_dir, job.index())?.export_all(&sources, status)
    }

    /// Try to satisfy a job from its previous export instead of running it
    ///
    /// On success the job's return code is set to 0 and it is marked cached.
    #[instrument(level = "debug", skip_all, fields(job = job.index()))]
    pub fn pre_job_execution(&self, job: &mut dyn Job) -> Result<CacheDecision> {
        let spec = self.config.spec_for(self.renderer.as_ref(), job.data());
        let decision = CacheRestorer::new(&spec, &self.lock_dir, job.index())
            .restore(job.outputs(), self.config.cache)?;

        if decision.eligible() {
            job.set_return_code(0);
            job.mark_cached();
        }
        Ok(decision)
    }
}
