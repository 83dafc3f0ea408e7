//! Export artifact naming
//!
//! Export and restoration must agree on where an artifact lives, so both go
//! through [`exported_path`]. Only gzip exports rename: directories gain a
//! `.tgz` suffix and files a `.gz` suffix, appended to the full file name.

use crate::config::ExportStrategy;
use crate::{Error, Result};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Suffix appended to gzip-exported directories
pub const DIR_ARCHIVE_SUFFIX: &str = ".tgz";
/// Suffix appended to gzip-exported files
pub const FILE_ARCHIVE_SUFFIX: &str = ".gz";

/// File name of the exported artifact for an output named `name`
#[must_use]
pub fn exported_name(name: &OsStr, strategy: ExportStrategy, is_dir: bool) -> OsString {
    let mut exported = name.to_os_string();
    if strategy == ExportStrategy::Gzip {
        exported.push(if is_dir {
            DIR_ARCHIVE_SUFFIX
        } else {
            FILE_ARCHIVE_SUFFIX
        });
    }
    exported
}

/// Path of the exported artifact for `source` under `target_dir`
pub fn exported_path(
    target_dir: &Path,
    source: &Path,
    strategy: ExportStrategy,
    is_dir: bool,
) -> Result<PathBuf> {
    let name = source.file_name().ok_or_else(|| {
        Error::configuration(format!(
            "cannot derive an export name from {}",
            source.display()
        ))
    })?;
    Ok(target_dir.join(exported_name(name, strategy, is_dir)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gzip_file_gets_gz_suffix() {
        let path = exported_path(
            Path::new("/exports"),
            Path::new("/job/output/f.txt"),
            ExportStrategy::Gzip,
            false,
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/exports/f.txt.gz"));
    }

    #[test]
    fn test_gzip_dir_gets_tgz_suffix() {
        let path = exported_path(
            Path::new("/exports"),
            Path::new("/job/output/d/"),
            ExportStrategy::Gzip,
            true,
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/exports/d.tgz"));
    }

    #[test]
    fn test_other_strategies_keep_name() {
        for strategy in [
            ExportStrategy::Copy,
            ExportStrategy::Link,
            ExportStrategy::Move,
        ] {
            for is_dir in [true, false] {
                let path = exported_path(
                    Path::new("/exports"),
                    Path::new("/job/output/r.tar.gz"),
                    strategy,
                    is_dir,
                )
                .unwrap();
                assert_eq!(path, PathBuf::from("/exports/r.tar.gz"));
            }
        }
    }

    #[test]
    fn test_suffix_is_appended_not_replaced() {
        assert_eq!(
            exported_name(OsStr::new("archive.tar"), ExportStrategy::Gzip, false),
            OsString::from("archive.tar.gz")
        );
        assert_eq!(
            exported_name(OsStr::new("noext"), ExportStrategy::Gzip, true),
            OsString::from("noext.tgz")
        );
    }

    #[test]
    fn test_nameless_source_is_rejected() {
        let err = exported_path(
            Path::new("/exports"),
            Path::new("/"),
            ExportStrategy::Copy,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }
}
