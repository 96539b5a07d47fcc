//! Robust removal of files, links and directory trees.
//!
//! Each object is removed with the plain call first. If that fails, its
//! read-only (and on Windows system/hidden) attributes are cleared and the
//! call is retried once. On Windows a last resort asks the OS to delete it
//! at the next restart. Links, including linked directories, are removed as
//! links; their targets are never visited.

use std::fs::{self, Metadata};
use std::io;
use std::path::Path;

use tracing::{debug, warn};

use wayfile_core::meta::is_reparse_point;
use wayfile_core::FsError;

/// How a removal ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// Gone now.
    Removed,
    /// Scheduled for deletion at the next restart.
    RebootPending,
}

impl Removal {
    fn merge(self, other: Removal) -> Removal {
        if self == Removal::RebootPending || other == Removal::RebootPending {
            Removal::RebootPending
        } else {
            Removal::Removed
        }
    }
}

/// Removes sources after a cross-volume copy and delete targets.
pub trait EntryRemover: Send + Sync {
    /// Remove `path` and everything below it, see [`remove_path`].
    fn remove(&self, path: &Path) -> Result<(Removal, u64), FsError>;
}

impl<F> EntryRemover for F
where
    F: Fn(&Path) -> Result<(Removal, u64), FsError> + Send + Sync,
{
    fn remove(&self, path: &Path) -> Result<(Removal, u64), FsError> {
        self(path)
    }
}

/// The default remover, backed by [`remove_path`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RobustRemover;

impl EntryRemover for RobustRemover {
    fn remove(&self, path: &Path) -> Result<(Removal, u64), FsError> {
        remove_path(path)
    }
}

/// Remove `path` and everything below it. Returns the number of objects
/// removed (or scheduled) alongside the outcome.
///
/// A child that cannot be removed does not stop its siblings; the first
/// error is returned once everything removable is gone.
pub fn remove_path(path: &Path) -> Result<(Removal, u64), FsError> {
    remove_with(path, &plain_remove)
}

type Attempt<'a> = &'a dyn Fn(&Path, Kind) -> io::Result<()>;

fn remove_with(path: &Path, attempt: Attempt<'_>) -> Result<(Removal, u64), FsError> {
    let meta = fs::symlink_metadata(path).map_err(|e| FsError::io(path, e))?;
    let mut count = 0;
    let removal = remove_node(path, &meta, false, attempt, &mut count)?;
    Ok((removal, count))
}

fn remove_node(
    path: &Path,
    meta: &Metadata,
    inside_tree: bool,
    attempt: Attempt<'_>,
    count: &mut u64,
) -> Result<Removal, FsError> {
    if is_reparse_point(meta) {
        return remove_one(path, Kind::Link, inside_tree, attempt, count);
    }
    if !meta.is_dir() {
        return remove_one(path, Kind::File, inside_tree, attempt, count);
    }

    let mut outcome = Removal::Removed;
    let mut first_error = None;
    for item in read_children(path)? {
        let child = match item {
            Ok(entry) => entry.path(),
            Err(e) => {
                first_error.get_or_insert(FsError::io(path, e));
                continue;
            }
        };
        let result = fs::symlink_metadata(&child)
            .map_err(|e| FsError::io(&child, e))
            .and_then(|child_meta| remove_node(&child, &child_meta, true, attempt, count));
        match result {
            Ok(removal) => outcome = outcome.merge(removal),
            Err(err) => {
                debug!(path = %child.display(), error = %err, "could not remove, continuing");
                first_error.get_or_insert(err);
            }
        }
    }

    if let Some(err) = first_error {
        return Err(err);
    }
    Ok(outcome.merge(remove_one(path, Kind::Dir, inside_tree, attempt, count)?))
}

/// List a folder, clearing its attributes and retrying once when the
/// first attempt is refused.
fn read_children(path: &Path) -> Result<fs::ReadDir, FsError> {
    match fs::read_dir(path) {
        Ok(reader) => Ok(reader),
        Err(first) => {
            debug!(path = %path.display(), error = %first, "cannot list, clearing attributes");
            clear_readonly(path);
            fs::read_dir(path).map_err(|_| FsError::io(path, first))
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    File,
    Dir,
    Link,
}

fn remove_one(
    path: &Path,
    kind: Kind,
    inside_tree: bool,
    attempt: Attempt<'_>,
    count: &mut u64,
) -> Result<Removal, FsError> {
    let first = match attempt(path, kind) {
        Ok(()) => {
            *count += 1;
            return Ok(Removal::Removed);
        }
        Err(err) => err,
    };
    debug!(path = %path.display(), error = %first, "remove failed, clearing attributes");

    clear_readonly(path);
    if inside_tree {
        if let Some(parent) = path.parent() {
            clear_readonly(parent);
        }
    }
    if attempt(path, kind).is_ok() {
        *count += 1;
        return Ok(Removal::Removed);
    }

    if schedule_on_reboot(path) {
        warn!(path = %path.display(), "scheduled for deletion at next restart");
        *count += 1;
        return Ok(Removal::RebootPending);
    }
    Err(FsError::io(path, first))
}

fn plain_remove(path: &Path, kind: Kind) -> io::Result<()> {
    match kind {
        Kind::File => fs::remove_file(path),
        Kind::Dir => fs::remove_dir(path),
        Kind::Link => remove_link(path),
    }
}

#[cfg(windows)]
fn remove_link(path: &Path) -> io::Result<()> {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_DIRECTORY: u32 = 0x10;

    let meta = fs::symlink_metadata(path)?;
    if meta.file_attributes() & FILE_ATTRIBUTE_DIRECTORY != 0 {
        fs::remove_dir(path)
    } else {
        fs::remove_file(path)
    }
}

#[cfg(not(windows))]
fn remove_link(path: &Path) -> io::Result<()> {
    fs::remove_file(path)
}

#[cfg(windows)]
fn clear_readonly(path: &Path) {
    use windows_sys::Win32::Storage::FileSystem::{SetFileAttributesW, FILE_ATTRIBUTE_NORMAL};

    let wide = wide(path);
    // SAFETY: `wide` is a NUL-terminated UTF-16 path.
    unsafe {
        SetFileAttributesW(wide.as_ptr(), FILE_ATTRIBUTE_NORMAL);
    }
}

#[cfg(not(windows))]
fn clear_readonly(path: &Path) {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return;
    };
    if meta.file_type().is_symlink() {
        return;
    }
    let mut permissions = meta.permissions();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        permissions.set_mode(permissions.mode() | 0o700);
    }
    #[cfg(not(unix))]
    permissions.set_readonly(false);
    if let Err(err) = fs::set_permissions(path, permissions) {
        debug!(path = %path.display(), error = %err, "could not clear read-only flag");
    }
}

#[cfg(windows)]
fn schedule_on_reboot(path: &Path) -> bool {
    use windows_sys::Win32::Storage::FileSystem::{MoveFileExW, MOVEFILE_DELAY_UNTIL_REBOOT};

    let wide = wide(path);
    // SAFETY: `wide` is NUL-terminated; a null new name means "delete".
    unsafe { MoveFileExW(wide.as_ptr(), std::ptr::null(), MOVEFILE_DELAY_UNTIL_REBOOT) != 0 }
}

#[cfg(not(windows))]
fn schedule_on_reboot(_path: &Path) -> bool {
    false
}

#[cfg(windows)]
fn wide(path: &Path) -> Vec<u16> {
    use std::os::windows::ffi::OsStrExt;
    path.as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}
