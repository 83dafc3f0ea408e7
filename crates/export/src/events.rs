//! Named log categories emitted by the export layer
//!
//! Every log record carries a `sublevel` field holding one of these names so
//! that downstream filters can match on the category rather than the text.

use std::fmt;

/// Tracing target for export transfers
pub const EXPORT_TARGET: &str = "jobport::export";
/// Tracing target for export-cache decisions
pub const CACHE_TARGET: &str = "jobport::cache";

/// Category of an export log record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportEvent {
    /// An output was transferred into the export directory
    Exported,
    /// A selected output did not exist; the rest of the batch was skipped
    ExportAbortedSourceMissing,
    /// A job was reconstructed from its exported artifacts
    CachedFromExport,
    /// Restoration skipped because the process cache mode is not `export`
    CacheDeclinedMode,
    /// Restoration skipped because no export directory is configured
    CacheDeclinedNoExportDir,
    /// Restoration refused for link-based exports
    CacheDeclinedSymlinkExport,
    /// Restoration refused for partial exports
    CacheDeclinedPartialExport,
    /// An expected artifact was not found
    CacheMissArtifactAbsent,
    /// An existing output is about to be replaced during restoration
    CacheOverwriteWarning,
}

impl ExportEvent {
    /// Kebab-case name used as the `sublevel` field
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exported => "exported",
            Self::ExportAbortedSourceMissing => "export-aborted-source-missing",
            Self::CachedFromExport => "cached-from-export",
            Self::CacheDeclinedMode => "cache-declined-mode",
            Self::CacheDeclinedNoExportDir => "cache-declined-no-export-dir",
            Self::CacheDeclinedSymlinkExport => "cache-declined-symlink-export",
            Self::CacheDeclinedPartialExport => "cache-declined-partial-export",
            Self::CacheMissArtifactAbsent => "cache-miss-artifact-absent",
            Self::CacheOverwriteWarning => "cache-overwrite-warning",
        }
    }
}

impl fmt::Display for ExportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
