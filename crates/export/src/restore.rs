//! Reconstructing job outputs from a previous export
//!
//! Before a job runs, its outputs can sometimes be rebuilt from the artifacts
//! an earlier run exported, letting the runner skip the job. Restoration is
//! the inverse of [`crate::transfer`]: the artifact location is derived with
//! the same naming rules, gzip artifacts are decompressed and everything
//! else is linked back into place.

use crate::config::{CacheMode, ExportSpec, ExportStrategy};
use crate::events::{CACHE_TARGET, ExportEvent};
use crate::fsops;
use crate::job::{JobOutput, OutputKind};
use crate::lock::PathPairLock;
use crate::naming::exported_path;
use crate::Result;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Why restoration from export was declined
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "path", rename_all = "kebab-case")]
pub enum DeclineReason {
    /// The process cache mode does not ask for export caching
    CacheModeNotExport,
    /// No export directory is configured
    NoExportDir,
    /// Link exports share identity with the output and cannot be trusted
    SymlinkExport,
    /// A partial export cannot guarantee every output is present
    PartialExport,
    /// An expected artifact is absent
    ArtifactMissing(PathBuf),
}

impl fmt::Display for DeclineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CacheModeNotExport => f.write_str("cache mode is not export"),
            Self::NoExportDir => f.write_str("no export directory"),
            Self::SymlinkExport => f.write_str("symlink export"),
            Self::PartialExport => f.write_str("partial export"),
            Self::ArtifactMissing(path) => {
                write!(f, "exported file does not exist: {}", path.display())
            }
        }
    }
}

/// Result of checking whether a job can be satisfied from its export
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "kebab-case")]
pub enum CacheDecision {
    /// Every output was reconstructed
    Restored,
    /// The job must run normally
    Declined(DeclineReason),
}

impl CacheDecision {
    /// Whether the job was reconstructed
    #[must_use]
    pub fn eligible(&self) -> bool {
        matches!(self, Self::Restored)
    }

    /// Human-readable explanation
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Self::Restored => "restored from export".to_string(),
            Self::Declined(reason) => reason.to_string(),
        }
    }
}

/// Check the preconditions that do not depend on the filesystem
pub fn check_eligibility(
    spec: &ExportSpec,
    cache: CacheMode,
) -> std::result::Result<&Path, DeclineReason> {
    if cache != CacheMode::Export {
        return Err(DeclineReason::CacheModeNotExport);
    }
    let target_dir = spec
        .target_dir
        .as_deref()
        .ok_or(DeclineReason::NoExportDir)?;
    if spec.strategy == ExportStrategy::Link {
        return Err(DeclineReason::SymlinkExport);
    }
    if spec.is_partial() {
        return Err(DeclineReason::PartialExport);
    }
    Ok(target_dir)
}

/// Rebuilds outputs from exported artifacts
#[derive(Debug)]
pub struct CacheRestorer<'a> {
    spec: &'a ExportSpec,
    lock_dir: &'a Path,
    job: usize,
}

impl<'a> CacheRestorer<'a> {
    /// Restorer for one job
    #[must_use]
    pub fn new(spec: &'a ExportSpec, lock_dir: &'a Path, job: usize) -> Self {
        Self {
            spec,
            lock_dir,
            job,
        }
    }

    /// Decide eligibility and reconstruct every path output
    ///
    /// Outputs restored before a miss are left in place; the caller simply
    /// runs the job as if nothing had been cached.
    pub fn restore(&self, outputs: &[JobOutput], cache: CacheMode) -> Result<CacheDecision> {
        let target_dir = match check_eligibility(self.spec, cache) {
            Ok(dir) => dir,
            Err(reason) => {
                self.log_declined(&reason);
                return Ok(CacheDecision::Declined(reason));
            }
        };

        for output in outputs.iter().filter(|output| output.is_path()) {
            let is_dir = fsops::is_dir(&output.path) || output.kind == OutputKind::Dir;
            let artifact = exported_path(target_dir, &output.path, self.spec.strategy, is_dir)?;

            let _lock = PathPairLock::acquire(self.lock_dir, &artifact, &output.path)?;
            if !fsops::exists(&artifact) {
                let reason = DeclineReason::ArtifactMissing(artifact);
                self.log_declined(&reason);
                return Ok(CacheDecision::Declined(reason));
            }

            if self.spec.strategy == ExportStrategy::Gzip {
                self.warn_if_overwriting(&output.path);
                fsops::gunzip(&artifact, &output.path, is_dir)?;
            } else {
                if fsops::same_file(&artifact, &output.path) {
                    debug!(
                        target: CACHE_TARGET,
                        job = self.job,
                        output = %output.path.display(),
                        "Output already refers to its exported artifact"
                    );
                    continue;
                }
                self.warn_if_overwriting(&output.path);
                fsops::relink(&artifact, &output.path)?;
            }
        }

        info!(
            target: CACHE_TARGET,
            job = self.job,
            sublevel = %ExportEvent::CachedFromExport,
            strategy = %self.spec.strategy,
            "Job restored from export directory"
        );
        Ok(CacheDecision::Restored)
    }

    fn warn_if_overwriting(&self, output: &Path) {
        if fsops::exists(output) {
            warn!(
                target: CACHE_TARGET,
                job = self.job,
                sublevel = %ExportEvent::CacheOverwriteWarning,
                "Overwrite file for export-caching: {}",
                output.display()
            );
        }
    }

    fn log_declined(&self, reason: &DeclineReason) {
        match reason {
            DeclineReason::CacheModeNotExport => {
                debug!(
                    target: CACHE_TARGET,
                    job = self.job,
                    sublevel = %ExportEvent::CacheDeclinedMode,
                    "Job is not export-cached: {reason}"
                );
            }
            DeclineReason::NoExportDir => {
                debug!(
                    target: CACHE_TARGET,
                    job = self.job,
                    sublevel = %ExportEvent::CacheDeclinedNoExportDir,
                    "Job is not export-cached: {reason}"
                );
            }
            DeclineReason::SymlinkExport => {
                warn!(
                    target: CACHE_TARGET,
                    job = self.job,
                    sublevel = %ExportEvent::CacheDeclinedSymlinkExport,
                    "Job is not export-cached using symlink export."
                );
            }
            DeclineReason::PartialExport => {
                warn!(
                    target: CACHE_TARGET,
                    job = self.job,
                    sublevel = %ExportEvent::CacheDeclinedPartialExport,
                    "Job is not export-cached using partial export."
                );
            }
            DeclineReason::ArtifactMissing(path) => {
                debug!(
                    target: CACHE_TARGET,
                    job = self.job,
                    sublevel = %ExportEvent::CacheMissArtifactAbsent,
                    "Job is not export-cached since exported file not exists: {}",
                    path.display()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn spec(exdir: &Path, strategy: ExportStrategy, parts: &[&str]) -> ExportSpec {
        ExportSpec {
            target_dir: Some(exdir.to_path_buf()),
            strategy,
            partial_patterns: parts.iter().map(|p| (*p).to_string()).collect(),
            overwrite: true,
        }
    }

    // ==========================================================================
    // Eligibility tests
    // ==========================================================================

    #[test]
    fn test_requires_export_cache_mode() {
        let spec = spec(Path::new("/exports"), ExportStrategy::Copy, &[]);
        assert_eq!(
            check_eligibility(&spec, CacheMode::On),
            Err(DeclineReason::CacheModeNotExport)
        );
        assert_eq!(
            check_eligibility(&spec, CacheMode::Off),
            Err(DeclineReason::CacheModeNotExport)
        );
    }

    #[test]
    fn test_requires_export_dir() {
        let mut spec = spec(Path::new("/exports"), ExportStrategy::Copy, &[]);
        spec.target_dir = None;
        assert_eq!(
            check_eligibility(&spec, CacheMode::Export),
            Err(DeclineReason::NoExportDir)
        );
    }

    #[test]
    fn test_link_strategy_declined() {
        let spec = spec(Path::new("/exports"), ExportStrategy::Link, &[]);
        let reason = check_eligibility(&spec, CacheMode::Export).unwrap_err();
        assert_eq!(reason, DeclineReason::SymlinkExport);
        assert_eq!(reason.to_string(), "symlink export");
    }

    #[test]
    fn test_partial_export_declined() {
        let spec = spec(Path::new("/exports"), ExportStrategy::Copy, &["outfile"]);
        assert_eq!(
            check_eligibility(&spec, CacheMode::Export),
            Err(DeclineReason::PartialExport)
        );
    }

    #[test]
    fn test_single_empty_pattern_is_not_partial() {
        let spec = spec(Path::new("/exports"), ExportStrategy::Copy, &[""]);
        assert_eq!(
            check_eligibility(&spec, CacheMode::Export),
            Ok(Path::new("/exports"))
        );
    }

    // ==========================================================================
    // Restoration tests
    // ==========================================================================

    #[test]
    fn test_gzip_restoration() {
        let temp = TempDir::new().unwrap();
        let exdir = temp.path().join("exports");
        let locks = temp.path().join("locks");
        let staged = temp.path().join("staged.txt");
        fs::write(&staged, "payload").unwrap();
        fsops::gzip(&staged, &exdir.join("out.txt.gz"), true).unwrap();

        let output = temp.path().join("job/output/out.txt");
        let outputs = vec![
            JobOutput::new("out", OutputKind::File, &output),
            JobOutput::new("n", OutputKind::Var, "7"),
        ];
        let spec = spec(&exdir, ExportStrategy::Gzip, &[]);
        let decision = CacheRestorer::new(&spec, &locks, 0)
            .restore(&outputs, CacheMode::Export)
            .unwrap();

        assert!(decision.eligible());
        assert_eq!(fs::read_to_string(&output).unwrap(), "payload");
    }

    #[test]
    fn test_missing_artifact_declines() {
        let temp = TempDir::new().unwrap();
        let exdir = temp.path().join("exports");
        fs::create_dir_all(&exdir).unwrap();
        let output = temp.path().join("job/output/out.txt");
        let outputs = vec![JobOutput::new("out", OutputKind::File, &output)];
        let spec = spec(&exdir, ExportStrategy::Copy, &[]);

        let decision = CacheRestorer::new(&spec, &temp.path().join("locks"), 0)
            .restore(&outputs, CacheMode::Export)
            .unwrap();
        assert_eq!(
            decision,
            CacheDecision::Declined(DeclineReason::ArtifactMissing(exdir.join("out.txt")))
        );
        assert!(!decision.eligible());
    }

    #[test]
    fn test_copy_restoration_links_artifact() {
        let temp = TempDir::new().unwrap();
        let exdir = temp.path().join("exports");
        fs::create_dir_all(&exdir).unwrap();
        fs::write(exdir.join("out.txt"), "exported").unwrap();
        let output = temp.path().join("job/output/out.txt");
        fs::create_dir_all(output.parent().unwrap()).unwrap();
        fs::write(&output, "stale").unwrap();

        let outputs = vec![JobOutput::new("out", OutputKind::File, &output)];
        let spec = spec(&exdir, ExportStrategy::Copy, &[]);
        let decision = CacheRestorer::new(&spec, &temp.path().join("locks"), 0)
            .restore(&outputs, CacheMode::Export)
            .unwrap();

        assert_eq!(decision, CacheDecision::Restored);
        assert!(fsops::is_link(&output));
        assert_eq!(fs::read_to_string(&output).unwrap(), "exported");
    }

    #[test]
    fn test_same_file_is_already_satisfied() {
        let temp = TempDir::new().unwrap();
        let exdir = temp.path().join("exports");
        fs::create_dir_all(&exdir).unwrap();
        let artifact = exdir.join("out.txt");
        fs::write(&artifact, "exported").unwrap();
        let output = temp.path().join("out.txt");
        fsops::relink(&artifact, &output).unwrap();

        let outputs = vec![JobOutput::new("out", OutputKind::File, &output)];
        let spec = spec(&exdir, ExportStrategy::Move, &[]);
        let decision = CacheRestorer::new(&spec, &temp.path().join("locks"), 0)
            .restore(&outputs, CacheMode::Export)
            .unwrap();
        assert!(decision.eligible());
        assert!(fsops::same_file(&artifact, &output));
    }

    #[test]
    fn test_decision_serializes_reason() {
        let decision = CacheDecision::Declined(DeclineReason::SymlinkExport);
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["decision"], "declined");
        assert_eq!(json["reason"], "symlink-export");
    }
}
