//! Selection of the outputs a job exports

use crate::config::ExportSpec;
use crate::job::JobOutput;
use globset::GlobBuilder;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Resolve the source paths to export for one job
///
/// With no partial patterns every non-variable output is selected. Otherwise
/// each pattern selects the output it names, or, when it names none, every
/// path under `output_dir` matching it as a glob. A pattern naming a
/// variable output selects nothing. Duplicates collapse.
#[must_use]
pub fn select_outputs(
    outputs: &[JobOutput],
    spec: &ExportSpec,
    output_dir: &Path,
) -> BTreeSet<PathBuf> {
    if spec.exports_everything() {
        return outputs
            .iter()
            .filter(|output| output.is_path())
            .map(|output| output.path.clone())
            .collect();
    }

    let mut selected = BTreeSet::new();
    for pattern in &spec.partial_patterns {
        if let Some(output) = outputs.iter().find(|output| &output.name == pattern) {
            // a variable's value is not a path and never leaves the job
            if output.is_path() {
                selected.insert(output.path.clone());
            }
        } else {
            selected.extend(glob_under(output_dir, pattern));
        }
    }
    debug!(count = selected.len(), patterns = ?spec.partial_patterns, "Selected partial export");
    selected
}

/// Paths under `root` whose relative path matches `pattern`
///
/// `*` does not cross directory separators; `**` does.
fn glob_under(root: &Path, pattern: &str) -> Vec<PathBuf> {
    let matcher = match GlobBuilder::new(pattern).literal_separator(true).build() {
        Ok(glob) => glob.compile_matcher(),
        Err(e) => {
            warn!(pattern, "Ignoring invalid export pattern: {e}");
            return Vec::new();
        }
    };

    let max_depth = if pattern.contains("**") {
        usize::MAX
    } else {
        pattern.split('/').filter(|part| !part.is_empty()).count()
    };

    WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .path()
                .strip_prefix(root)
                .is_ok_and(|rel| matcher.is_match(rel))
        })
        .map(|entry| entry.into_path())
        .collect()
}
