//! Cross-process advisory locks keyed by a pair of paths

use crate::{Error, Result};
use fs4::fs_std::FileExt;
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::trace;

/// Exclusive lock over a pair of paths, held until dropped
///
/// The pair is unordered: locking `(a, b)` and `(b, a)` contend for the same
/// lock file, so an export of `output -> artifact` and a restoration of
/// `artifact -> output` never overlap. The lock file is removed on drop.
#[derive(Debug)]
pub struct PathPairLock {
    // Unlock happens automatically when the file is closed
    file: File,
    path: PathBuf,
}

impl PathPairLock {
    /// Block until the lock for `(a, b)` is held
    pub fn acquire(lock_dir: &Path, a: &Path, b: &Path) -> Result<Self> {
        fs::create_dir_all(lock_dir).map_err(|e| Error::io(e, lock_dir, "create_dir_all"))?;

        let path = lock_dir.join(lock_file_name(a, b));
        loop {
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&path)
                .map_err(|e| Error::io(e, &path, "open lock file"))?;

            FileExt::lock_exclusive(&file).map_err(|e| Error::io(e, &path, "lock"))?;

            // The previous holder may have unlinked the file while we waited
            if still_linked(&file, &path) {
                trace!(
                    lock = %path.display(),
                    a = %a.display(),
                    b = %b.display(),
                    "Acquired path lock"
                );
                return Ok(Self { file, path });
            }
            trace!(lock = %path.display(), "Lock file replaced while waiting, retrying");
        }
    }
}

impl Drop for PathPairLock {
    fn drop(&mut self) {
        // Unlink while still holding the lock; waiters notice and reopen
        if let Err(e) = fs::remove_file(&self.path) {
            trace!(lock = %self.path.display(), "Lock file not removed: {e}");
        }
        if let Err(e) = FileExt::unlock(&self.file) {
            trace!(lock = %self.path.display(), "Unlock failed: {e}");
        }
    }
}

/// Whether `path` still names the open `file`
#[cfg(unix)]
fn still_linked(file: &File, path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (file.metadata(), fs::metadata(path)) {
        (Ok(held), Ok(named)) => held.dev() == named.dev() && held.ino() == named.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn still_linked(_file: &File, path: &Path) -> bool {
    path.exists()
}

fn lock_file_name(a: &Path, b: &Path) -> String {
    let a = a.as_os_str().as_encoded_bytes();
    let b = b.as_os_str().as_encoded_bytes();
    let (first, second) = if a <= b { (a, b) } else { (b, a) };

    let mut hasher = Sha256::new();
    hasher.update(first);
    hasher.update([0u8]);
    hasher.update(second);
    let digest = hex::encode(hasher.finalize());
    format!("{}.lock", &digest[..32])
}
