//! The job seam between the pipeline runner and the export layer

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Kind of a declared job output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// Scalar value; never exported or restored
    #[serde(alias = "variable")]
    Var,
    /// Regular file
    #[serde(alias = "path")]
    File,
    /// Directory
    #[serde(alias = "directory")]
    Dir,
}

/// A declared output of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutput {
    /// Output name as declared by the process
    pub name: String,
    /// Output kind
    pub kind: OutputKind,
    /// Output path (for `Var` outputs, the value itself)
    pub path: PathBuf,
}

impl JobOutput {
    /// Create a new output
    pub fn new(name: impl Into<String>, kind: OutputKind, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            kind,
            path: path.into(),
        }
    }

    /// Whether this output refers to something on disk
    #[must_use]
    pub fn is_path(&self) -> bool {
        self.kind != OutputKind::Var
    }
}

/// Final status of a job as reported by the runner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// The job ran and succeeded
    Succeeded,
    /// The job was satisfied from cache without running
    Cached,
    /// The job failed
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Succeeded => "succeeded",
            Self::Cached => "cached",
            Self::Failed => "failed",
        })
    }
}

/// What the export layer needs from a runner's job
pub trait Job {
    /// Index of the job within its process
    fn index(&self) -> usize;

    /// Declared outputs, in declaration order
    fn outputs(&self) -> &[JobOutput];

    /// Directory that partial-export globs are evaluated under
    fn output_dir(&self) -> PathBuf;

    /// Data that partial-export patterns are rendered against
    fn data(&self) -> &serde_json::Value;

    /// Record the job's return code
    fn set_return_code(&mut self, rc: i32);

    /// Transition the job into the cached state, skipping execution
    fn mark_cached(&mut self);
}

/// A plain job record, as loaded from a job file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Index of the job within its process
    #[serde(default)]
    pub index: usize,
    /// Job working directory; outputs live under `<dir>/output`
    pub dir: PathBuf,
    /// Declared outputs
    #[serde(default)]
    pub outputs: Vec<JobOutput>,
    /// Template data for pattern rendering
    #[serde(default)]
    pub data: serde_json::Value,
    /// Return code, once known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rc: Option<i32>,
    /// Whether the job has been marked cached
    #[serde(default)]
    pub cached: bool,
}

impl JobRecord {
    /// Create an empty job record rooted at `dir`
    pub fn new(index: usize, dir: impl Into<PathBuf>) -> Self {
        Self {
            index,
            dir: dir.into(),
            outputs: Vec::new(),
            data: serde_json::Value::Null,
            rc: None,
            cached: false,
        }
    }

    /// Add a declared output
    #[must_use]
    pub fn with_output(mut self, name: &str, kind: OutputKind, path: impl AsRef<Path>) -> Self {
        self.outputs
            .push(JobOutput::new(name, kind, path.as_ref().to_path_buf()));
        self
    }

    /// Set the template data
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

impl Job for JobRecord {
    fn index(&self) -> usize {
        self.index
    }

    fn outputs(&self) -> &[JobOutput] {
        &self.outputs
    }

    fn output_dir(&self) -> PathBuf {
        self.dir.join("output")
    }

    fn data(&self) -> &serde_json::Value {
        &self.data
    }

    fn set_return_code(&mut self, rc: i32) {
        self.rc = Some(rc);
    }

    fn mark_cached(&mut self) {
        self.cached = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_record_from_json() {
        let record: JobRecord = serde_json::from_str(
            r#"{
                "index": 3,
                "dir": "/work/p/3",
                "outputs": [
                    {"name": "outfile", "kind": "file", "path": "/work/p/3/output/a.txt"},
                    {"name": "outdir", "kind": "directory", "path": "/work/p/3/output/d"},
                    {"name": "n", "kind": "var", "path": "42"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(record.index(), 3);
        assert_eq!(record.output_dir(), PathBuf::from("/work/p/3/output"));
        assert_eq!(record.outputs().len(), 3);
        assert_eq!(record.outputs()[1].kind, OutputKind::Dir);
        assert!(!record.outputs()[2].is_path());
        assert!(!record.cached);
        assert!(record.rc.is_none());
    }

    #[test]
    fn test_mark_cached_sets_state() {
        let mut record = JobRecord::new(0, "/job");
        record.set_return_code(0);
        record.mark_cached();
        assert_eq!(record.rc, Some(0));
        assert!(record.cached);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(JobStatus::Cached.to_string(), "cached");
        let parsed: JobStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(parsed, JobStatus::Failed);
    }
}
