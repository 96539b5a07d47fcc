//! Chunked byte copy of files, links and directory trees.

use std::fs::{self, File, Metadata};
use std::io::{ErrorKind, Read, Write};
use std::path::Path;

use tracing::debug;

use wayfile_core::meta::is_reparse_point;
use wayfile_core::FsError;

use crate::engine::Batch;

/// Copy whatever `source` is to the free path `target`.
///
/// A link to a file is copied as the file it points to. Other links are
/// recreated as links, directories are mirrored depth-first and files are
/// copied chunk by chunk. On any error, cancellation included, whatever
/// this call created at `target` is removed again.
pub(crate) fn copy_entry(
    source: &Path,
    meta: &Metadata,
    target: &Path,
    batch: &mut Batch<'_>,
) -> Result<u64, FsError> {
    if is_reparse_point(meta) {
        return match fs::metadata(source) {
            Ok(followed) if followed.is_file() => copy_file(source, &followed, target, batch),
            _ => copy_link(source, target).map(|()| 0),
        };
    }
    if !meta.is_dir() {
        return copy_file(source, meta, target, batch);
    }

    fs::create_dir(target).map_err(|e| FsError::io(target, e))?;
    let result = copy_children(source, target, batch);
    if let Err(err) = &result {
        discard_partial(target, err);
    }
    result
}

fn copy_children(source: &Path, target: &Path, batch: &mut Batch<'_>) -> Result<u64, FsError> {
    let mut bytes = 0;
    let reader = fs::read_dir(source).map_err(|e| FsError::io(source, e))?;
    for item in reader {
        batch.checkpoint()?;
        let entry = item.map_err(|e| FsError::io(source, e))?;
        let child = entry.path();
        let child_target = target.join(entry.file_name());
        let meta = fs::symlink_metadata(&child).map_err(|e| FsError::io(&child, e))?;

        if is_reparse_point(&meta) {
            // Links inside a tree are never followed.
            if let Err(err) = copy_link(&child, &child_target) {
                debug!(path = %child.display(), error = %err, "skipping link that cannot be recreated");
            }
        } else if meta.is_dir() {
            fs::create_dir(&child_target).map_err(|e| FsError::io(&child_target, e))?;
            bytes += copy_children(&child, &child_target, batch)?;
        } else {
            bytes += copy_file(&child, &meta, &child_target, batch)?;
        }
    }

    if batch.config.preserve_timestamps {
        // Set after the children, whose creation touches the folder.
        if let Ok(modified) = fs::metadata(source).and_then(|m| m.modified()) {
            if let Ok(dir) = File::open(target) {
                let _ = dir.set_modified(modified);
            }
        }
    }
    Ok(bytes)
}

fn copy_file(
    source: &Path,
    meta: &Metadata,
    target: &Path,
    batch: &mut Batch<'_>,
) -> Result<u64, FsError> {
    let mut input = File::open(source).map_err(|e| FsError::io(source, e))?;
    let mut output = File::options()
        .write(true)
        .create_new(true)
        .open(target)
        .map_err(|e| FsError::io(target, e))?;

    let copied = match pump(&mut input, &mut output, source, target, batch) {
        Ok(copied) => copied,
        Err(err) => {
            drop(output);
            if let Err(rm) = fs::remove_file(target) {
                debug!(path = %target.display(), error = %rm, "could not remove partial file");
            }
            return Err(err);
        }
    };

    if batch.config.preserve_timestamps {
        if let Ok(modified) = meta.modified() {
            if let Err(err) = output.set_modified(modified) {
                debug!(path = %target.display(), error = %err, "could not set modification time");
            }
        }
    }
    drop(output);
    if let Err(err) = fs::set_permissions(target, meta.permissions()) {
        debug!(path = %target.display(), error = %err, "could not copy permissions");
    }

    batch.counters.record_byte_copy(copied);
    Ok(copied)
}

/// Move bytes one chunk at a time, reporting and checking for cancellation
/// after every chunk. A chunk that has started is always written in full.
fn pump(
    input: &mut File,
    output: &mut File,
    source: &Path,
    target: &Path,
    batch: &mut Batch<'_>,
) -> Result<u64, FsError> {
    let mut buf = vec![0u8; batch.config.copy_chunk_size];
    let mut copied = 0u64;
    loop {
        batch.checkpoint()?;
        let n = match input.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(FsError::io(source, e)),
        };
        output
            .write_all(&buf[..n])
            .map_err(|e| FsError::io(target, e))?;
        copied += n as u64;
        batch.advance(n as u64)?;
    }
    Ok(copied)
}

#[cfg(unix)]
fn copy_link(source: &Path, target: &Path) -> Result<(), FsError> {
    let link = fs::read_link(source).map_err(|e| FsError::io(source, e))?;
    std::os::unix::fs::symlink(&link, target).map_err(|e| FsError::io(target, e))
}

#[cfg(windows)]
fn copy_link(source: &Path, target: &Path) -> Result<(), FsError> {
    let link = fs::read_link(source).map_err(|e| FsError::io(source, e))?;
    let points_to_dir = wayfile_core::meta::link_targets_directory(
        source,
        &fs::symlink_metadata(source).map_err(|e| FsError::io(source, e))?,
    );
    let created = if points_to_dir {
        std::os::windows::fs::symlink_dir(&link, target)
    } else {
        std::os::windows::fs::symlink_file(&link, target)
    };
    created.map_err(|e| FsError::io(target, e))
}

#[cfg(not(any(unix, windows)))]
fn copy_link(source: &Path, _target: &Path) -> Result<(), FsError> {
    Err(FsError::InvalidPath {
        path: source.to_path_buf(),
        reason: "links are not supported on this platform".to_string(),
    })
}

fn discard_partial(target: &Path, cause: &FsError) {
    if !wayfile_core::path::occupied(target) {
        return;
    }
    debug!(path = %target.display(), cause = %cause, "removing partial copy");
    if let Err(err) = crate::remove::remove_path(target) {
        debug!(path = %target.display(), error = %err, "could not remove partial copy");
    }
}
