//! Filesystem primitives used by export and restoration
//!
//! These wrap `std::fs`, `tar` and `flate2` with the overwrite discipline the
//! transfer strategies share: an existing destination is removed first when
//! overwriting is allowed and reported as [`Error::DestinationExists`]
//! otherwise.

use crate::{Error, Result};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

#[cfg(unix)]
use std::os::unix::fs::symlink as symlink_any;

#[cfg(windows)]
fn symlink_any(original: &Path, link: &Path) -> io::Result<()> {
    if original.is_dir() {
        std::os::windows::fs::symlink_dir(original, link)
    } else {
        std::os::windows::fs::symlink_file(original, link)
    }
}

/// Whether `path` exists, following links (a dangling link does not exist)
#[must_use]
pub fn exists(path: &Path) -> bool {
    path.exists()
}

/// Whether anything, including a dangling link, occupies `path`
#[must_use]
pub fn occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Whether `path` is a directory, following links
#[must_use]
pub fn is_dir(path: &Path) -> bool {
    path.is_dir()
}

/// Whether `path` itself is a symbolic link
#[must_use]
pub fn is_link(path: &Path) -> bool {
    path.is_symlink()
}

/// Whether both paths resolve to the same underlying file
///
/// Missing paths are never the same file.
#[must_use]
pub fn same_file(a: &Path, b: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        match (fs::metadata(a), fs::metadata(b)) {
            (Ok(ma), Ok(mb)) => ma.dev() == mb.dev() && ma.ino() == mb.ino(),
            _ => false,
        }
    }
    #[cfg(not(unix))]
    {
        match (fs::canonicalize(a), fs::canonicalize(b)) {
            (Ok(ca), Ok(cb)) => ca == cb,
            _ => false,
        }
    }
}

/// Absolute, link-resolved form of `path`
pub fn resolve(path: &Path) -> Result<PathBuf> {
    fs::canonicalize(path).map_err(|e| Error::io(e, path, "canonicalize"))
}

/// Remove whatever occupies `path`; a vacant path is not an error
pub fn remove(path: &Path) -> Result<()> {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return Ok(());
    };
    if meta.is_dir() {
        fs::remove_dir_all(path).map_err(|e| Error::io(e, path, "remove_dir_all"))
    } else {
        fs::remove_file(path).map_err(|e| Error::io(e, path, "remove_file"))
    }
}

/// Create `path` and its parents, tolerating concurrent creation
pub fn create_dir_all(path: &Path) -> Result<()> {
    match fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(e) => Err(Error::io(e, path, "create_dir_all")),
    }
}

/// Clear `dst` for a new artifact according to the overwrite policy
pub fn prepare_destination(dst: &Path, overwrite: bool) -> Result<()> {
    if !occupied(dst) {
        return ensure_parent(dst);
    }
    if !overwrite {
        return Err(Error::destination_exists(dst));
    }
    trace!(path = %dst.display(), "Removing existing destination");
    remove(dst)
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Copy a file or directory tree, following a linked source
pub fn copy(src: &Path, dst: &Path, overwrite: bool) -> Result<()> {
    if same_file(src, dst) {
        if !is_link(dst) {
            debug!(
                src = %src.display(),
                dst = %dst.display(),
                "Copy target already holds the source"
            );
            return Ok(());
        }
        // dst links back to src: replace the link with real content
        fs::remove_file(dst).map_err(|e| Error::io(e, dst, "remove_file"))?;
    } else {
        prepare_destination(dst, overwrite)?;
    }

    if is_dir(src) {
        copy_tree(src, dst)
    } else {
        fs::copy(src, dst)
            .map(|_| ())
            .map_err(|e| Error::io(e, dst, "copy"))
    }
}

fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src).follow_links(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| src.to_path_buf());
            Error::io(
                e.into_io_error()
                    .unwrap_or_else(|| io::Error::other("filesystem loop")),
                path,
                "walk",
            )
        })?;
        let rel = entry.path().strip_prefix(src).map_err(|_| {
            Error::configuration(format!(
                "path {} is not under {}",
                entry.path().display(),
                src.display()
            ))
        })?;
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| Error::io(e, &target, "copy"))?;
        }
    }
    Ok(())
}

/// Relocate `src` to `dst`, copying across filesystems when needed
pub fn move_path(src: &Path, dst: &Path, overwrite: bool) -> Result<()> {
    prepare_destination(dst, overwrite)?;
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!(src = %src.display(), dst = %dst.display(), "Rename crosses devices, copying");
            copy(src, dst, overwrite)?;
            remove(src)
        }
        Err(e) => Err(Error::io(e, dst, "rename")),
    }
}

/// Create a symbolic link at `link` pointing to `target`
///
/// When `target` is itself a link whose content lives at `link` (the state a
/// move export leaves behind), the content is first moved back to `target`.
/// A `link` that already points at `target` is left untouched.
pub fn link(target: &Path, link: &Path, overwrite: bool) -> Result<()> {
    if same_file(target, link) {
        if is_link(link) {
            return Ok(());
        }
        if !is_link(target) {
            // hard link or the very same path
            return Ok(());
        }
        fs::remove_file(target).map_err(|e| Error::io(e, target, "remove_file"))?;
        fs::rename(link, target).map_err(|e| Error::io(e, target, "rename"))?;
    } else {
        prepare_destination(link, overwrite)?;
    }

    let original = resolve(target)?;
    symlink_any(&original, link).map_err(|e| Error::io(e, link, "symlink"))
}

/// Compress `src` into `dst`
///
/// Directories become a gzip-compressed tar of their contents; files become
/// a plain gzip stream. The archive is written beside `dst` and renamed into
/// place once complete.
pub fn gzip(src: &Path, dst: &Path, overwrite: bool) -> Result<()> {
    prepare_destination(dst, overwrite)?;
    let parent = dst
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let staged = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| Error::io(e, parent, "create temp file"))?;

    let encoder = GzEncoder::new(BufWriter::new(staged.as_file()), Compression::default());
    let encoder = if is_dir(src) {
        let mut builder = tar::Builder::new(encoder);
        builder.follow_symlinks(true);
        builder
            .append_dir_all(".", src)
            .map_err(|e| Error::io(e, src, "tar append"))?;
        builder
            .into_inner()
            .map_err(|e| Error::io(e, dst, "tar finalize"))?
    } else {
        let mut encoder = encoder;
        let mut reader =
            BufReader::new(File::open(src).map_err(|e| Error::io(e, src, "open"))?);
        io::copy(&mut reader, &mut encoder).map_err(|e| Error::io(e, src, "compress"))?;
        encoder
    };
    let mut writer = encoder
        .finish()
        .map_err(|e| Error::io(e, dst, "gzip finish"))?;
    io::Write::flush(&mut writer).map_err(|e| Error::io(e, dst, "flush"))?;
    drop(writer);

    staged
        .persist(dst)
        .map_err(|e| Error::io(e.error, dst, "persist"))?;
    Ok(())
}

/// Decompress an artifact produced by [`gzip`] into `dst`
///
/// Whatever occupies `dst` is replaced. `is_dir` selects between unpacking
/// a tar archive into a directory and decoding a single file.
pub fn gunzip(src: &Path, dst: &Path, is_dir: bool) -> Result<()> {
    prepare_destination(dst, true)?;
    let reader = BufReader::new(File::open(src).map_err(|e| Error::io(e, src, "open"))?);
    let mut decoder = GzDecoder::new(reader);

    if is_dir {
        create_dir_all(dst)?;
        tar::Archive::new(decoder)
            .unpack(dst)
            .map_err(|e| Error::io(e, src, "unpack"))
    } else {
        let mut out =
            BufWriter::new(File::create(dst).map_err(|e| Error::io(e, dst, "create"))?);
        io::copy(&mut decoder, &mut out).map_err(|e| Error::io(e, src, "decompress"))?;
        io::Write::flush(&mut out).map_err(|e| Error::io(e, dst, "flush"))
    }
}

/// Point a fresh link at `dst` to the existing `target`, replacing `dst`
pub fn relink(target: &Path, dst: &Path) -> Result<()> {
    let original = resolve(target)?;
    prepare_destination(dst, true)?;
    symlink_any(&original, dst).map_err(|e| Error::io(e, dst, "symlink"))
}
