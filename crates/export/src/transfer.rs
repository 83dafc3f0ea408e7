//! Transfer of job outputs into the export directory

use crate::config::{ExportSpec, ExportStrategy};
use crate::events::{EXPORT_TARGET, ExportEvent};
use crate::fsops;
use crate::job::JobStatus;
use crate::lock::PathPairLock;
use crate::naming::exported_path;
use crate::{Error, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Outcome of exporting a single source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The source was transferred to this destination
    Exported(PathBuf),
    /// The job was cached and the destination already existed
    AlreadyExported(PathBuf),
    /// The source does not exist (for example a dangling link)
    SourceMissing(PathBuf),
}

/// Summary of one export invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    /// Destinations written in this invocation
    pub exported: Vec<PathBuf>,
    /// Destinations left alone because the job was cached
    pub skipped: Vec<PathBuf>,
    /// Missing source that stopped the batch, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted_at: Option<PathBuf>,
}

impl ExportReport {
    /// True when nothing was written
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.exported.is_empty()
    }
}

/// Performs strategy-specific transfers for one export spec
#[derive(Debug)]
pub struct TransferEngine<'a> {
    spec: &'a ExportSpec,
    target_dir: &'a Path,
    lock_dir: &'a Path,
    job: usize,
}

impl<'a> TransferEngine<'a> {
    /// Engine exporting into the spec's target directory
    ///
    /// Fails when the spec has no target directory; callers are expected to
    /// skip exporting entirely in that case.
    pub fn new(spec: &'a ExportSpec, lock_dir: &'a Path, job: usize) -> Result<Self> {
        let target_dir = spec
            .target_dir
            .as_deref()
            .ok_or_else(|| Error::configuration("export directory is not configured"))?;
        Ok(Self {
            spec,
            target_dir,
            lock_dir,
            job,
        })
    }

    /// Export every source in order
    ///
    /// The first missing source stops the batch; artifacts already exported
    /// earlier in the batch stay in place.
    pub fn export_all<'p, I>(&self, sources: I, status: JobStatus) -> Result<ExportReport>
    where
        I: IntoIterator<Item = &'p PathBuf>,
    {
        fsops::create_dir_all(self.target_dir)?;

        let mut report = ExportReport::default();
        for source in sources {
            match self.export_one(source, status)? {
                TransferOutcome::Exported(dst) => report.exported.push(dst),
                TransferOutcome::AlreadyExported(dst) => report.skipped.push(dst),
                TransferOutcome::SourceMissing(src) => {
                    debug!(
                        target: EXPORT_TARGET,
                        job = self.job,
                        sublevel = %ExportEvent::ExportAbortedSourceMissing,
                        source = %src.display(),
                        "Export stopped, source does not exist: {}",
                        src.display()
                    );
                    report.aborted_at = Some(src);
                    break;
                }
            }
        }
        Ok(report)
    }

    /// Export a single source
    pub fn export_one(&self, source: &Path, status: JobStatus) -> Result<TransferOutcome> {
        if !fsops::exists(source) {
            return Ok(TransferOutcome::SourceMissing(source.to_path_buf()));
        }

        let dst = exported_path(
            self.target_dir,
            source,
            self.spec.strategy,
            fsops::is_dir(source),
        )?;

        if status == JobStatus::Cached && fsops::exists(&dst) {
            return Ok(TransferOutcome::AlreadyExported(dst));
        }

        {
            let _lock = PathPairLock::acquire(self.lock_dir, source, &dst)?;
            self.transfer(source, &dst)?;
        }

        info!(
            target: EXPORT_TARGET,
            job = self.job,
            sublevel = %ExportEvent::Exported,
            strategy = %self.spec.strategy,
            "Exported: {}",
            dst.display()
        );
        Ok(TransferOutcome::Exported(dst))
    }

    fn transfer(&self, source: &Path, dst: &Path) -> Result<()> {
        let overwrite = self.spec.overwrite;
        match self.spec.strategy {
            ExportStrategy::Gzip => fsops::gzip(source, dst, overwrite),
            ExportStrategy::Copy => fsops::copy(source, dst, overwrite),
            ExportStrategy::Link => fsops::link(source, dst, overwrite),
            // moving a link would orphan whatever it points to
            ExportStrategy::Move if fsops::is_link(source) => fsops::copy(source, dst, overwrite),
            ExportStrategy::Move => {
                fsops::move_path(source, dst, overwrite)?;
                fsops::relink(dst, source)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        outdir: PathBuf,
        exdir: PathBuf,
        locks: PathBuf,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let outdir = temp.path().join("job/output");
        let exdir = temp.path().join("exports");
        let locks = temp.path().join("locks");
        fs::create_dir_all(&outdir).unwrap();
        Fixture {
            outdir,
            exdir,
            locks,
            _temp: temp,
        }
    }

    fn spec(exdir: &Path, strategy: ExportStrategy) -> ExportSpec {
        ExportSpec {
            target_dir: Some(exdir.to_path_buf()),
            strategy,
            partial_patterns: Vec::new(),
            overwrite: true,
        }
    }

    #[test]
    fn test_engine_requires_target_dir() {
        let spec = ExportSpec {
            target_dir: None,
            strategy: ExportStrategy::Copy,
            partial_patterns: Vec::new(),
            overwrite: true,
        };
        assert!(TransferEngine::new(&spec, Path::new("/locks"), 0).is_err());
    }

    #[test]
    fn test_copy_export() {
        let f = fixture();
        let src = f.outdir.join("f.txt");
        fs::write(&src, "copied").unwrap();
        let spec = spec(&f.exdir, ExportStrategy::Copy);
        let engine = TransferEngine::new(&spec, &f.locks, 0).unwrap();

        let outcome = engine.export_one(&src, JobStatus::Succeeded).unwrap();
        let dst = f.exdir.join("f.txt");
        assert_eq!(outcome, TransferOutcome::Exported(dst.clone()));
        assert_eq!(fs::read_to_string(&dst).unwrap(), "copied");
        assert!(!fsops::is_link(&src));
    }

    #[test]
    fn test_move_export_leaves_backlink() {
        let f = fixture();
        let src = f.outdir.join("f.txt");
        fs::write(&src, "moved").unwrap();
        let spec = spec(&f.exdir, ExportStrategy::Move);
        let engine = TransferEngine::new(&spec, &f.locks, 0).unwrap();
        fs::create_dir_all(&f.exdir).unwrap();

        engine.export_one(&src, JobStatus::Succeeded).unwrap();
        let dst = f.exdir.join("f.txt");
        assert!(fsops::is_link(&src));
        assert!(!fsops::is_link(&dst));
        assert_eq!(fs::read_to_string(&src).unwrap(), "moved");
        assert!(fsops::same_file(&src, &dst));
    }

    #[test]
    fn test_move_of_link_copies_instead() {
        let f = fixture();
        let src = f.outdir.join("f.txt");
        fs::write(&src, "moved").unwrap();
        let spec = spec(&f.exdir, ExportStrategy::Move);
        let engine = TransferEngine::new(&spec, &f.locks, 0).unwrap();
        fs::create_dir_all(&f.exdir).unwrap();

        engine.export_one(&src, JobStatus::Succeeded).unwrap();
        engine.export_one(&src, JobStatus::Succeeded).unwrap();

        let dst = f.exdir.join("f.txt");
        assert!(fsops::is_link(&src));
        assert!(!fsops::is_link(&dst));
        assert_eq!(fs::read_to_string(&dst).unwrap(), "moved");
    }

    #[test]
    fn test_link_export() {
        let f = fixture();
        let src = f.outdir.join("f.txt");
        fs::write(&src, "linked").unwrap();
        let spec = spec(&f.exdir, ExportStrategy::Link);
        let engine = TransferEngine::new(&spec, &f.locks, 0).unwrap();
        fs::create_dir_all(&f.exdir).unwrap();

        engine.export_one(&src, JobStatus::Succeeded).unwrap();
        let dst = f.exdir.join("f.txt");
        assert!(fsops::is_link(&dst));
        assert!(fsops::same_file(&src, &dst));
    }

    #[test]
    fn test_gzip_names_by_kind() {
        let f = fixture();
        let file = f.outdir.join("f.txt");
        let dir = f.outdir.join("d");
        fs::write(&file, "f").unwrap();
        fs::create_dir_all(dir.join("sub")).unwrap();
        fs::write(dir.join("sub/x"), "x").unwrap();
        let spec = spec(&f.exdir, ExportStrategy::Gzip);
        let engine = TransferEngine::new(&spec, &f.locks, 0).unwrap();

        let sources = [dir.clone(), file.clone()];
        let report = engine.export_all(&sources, JobStatus::Succeeded).unwrap();
        assert_eq!(
            report.exported,
            vec![f.exdir.join("d.tgz"), f.exdir.join("f.txt.gz")]
        );
        assert!(report.aborted_at.is_none());
    }

    #[test]
    fn test_cached_status_skips_existing_destination() {
        let f = fixture();
        let src = f.outdir.join("f.txt");
        fs::write(&src, "new").unwrap();
        fs::create_dir_all(&f.exdir).unwrap();
        fs::write(f.exdir.join("f.txt"), "old").unwrap();
        let spec = spec(&f.exdir, ExportStrategy::Copy);
        let engine = TransferEngine::new(&spec, &f.locks, 0).unwrap();

        let outcome = engine.export_one(&src, JobStatus::Cached).unwrap();
        assert_eq!(outcome, TransferOutcome::AlreadyExported(f.exdir.join("f.txt")));
        assert_eq!(fs::read_to_string(f.exdir.join("f.txt")).unwrap(), "old");
        assert!(!f.locks.exists(), "no lock should be taken on the fast path");
    }

    #[test]
    fn test_missing_source_stops_batch_without_rollback() {
        let f = fixture();
        let first = f.outdir.join("a.txt");
        let missing = f.outdir.join("b.txt");
        let last = f.outdir.join("c.txt");
        fs::write(&first, "a").unwrap();
        fs::write(&last, "c").unwrap();
        let spec = spec(&f.exdir, ExportStrategy::Copy);
        let engine = TransferEngine::new(&spec, &f.locks, 0).unwrap();

        let sources = [first, missing.clone(), last];
        let report = engine.export_all(&sources, JobStatus::Succeeded).unwrap();
        assert_eq!(report.exported, vec![f.exdir.join("a.txt")]);
        assert_eq!(report.aborted_at, Some(missing));
        assert!(f.exdir.join("a.txt").exists());
        assert!(!f.exdir.join("c.txt").exists());
    }

    #[test]
    fn test_overwrite_disallowed_propagates() {
        let f = fixture();
        let src = f.outdir.join("f.txt");
        fs::write(&src, "new").unwrap();
        fs::create_dir_all(&f.exdir).unwrap();
        fs::write(f.exdir.join("f.txt"), "old").unwrap();
        let mut spec = spec(&f.exdir, ExportStrategy::Copy);
        spec.overwrite = false;
        let engine = TransferEngine::new(&spec, &f.locks, 0).unwrap();

        let err = engine.export_one(&src, JobStatus::Succeeded).unwrap_err();
        assert!(matches!(err, Error::DestinationExists { .. }));
    }
}
