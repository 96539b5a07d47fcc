//! In-place rename.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use wayfile_core::FsError;

/// Rename `path` within its folder. Returns the new path.
///
/// The name is trimmed before validation. Renaming to the current name is a
/// no-op; an existing target is refused unless it is `path` itself under a
/// different case.
pub fn rename_entry(path: &Path, new_name: &str) -> Result<PathBuf, FsError> {
    let new_name = new_name.trim();
    validate_filename(new_name)?;

    let parent = path.parent().ok_or_else(|| FsError::InvalidPath {
        path: path.to_path_buf(),
        reason: "cannot rename a volume root".to_string(),
    })?;
    if path.file_name().and_then(|n| n.to_str()) == Some(new_name) {
        return Ok(path.to_path_buf());
    }

    let target = parent.join(new_name);
    fs::symlink_metadata(path).map_err(|e| FsError::io(path, e))?;
    if target.symlink_metadata().is_ok() && !same_object(path, &target) {
        return Err(FsError::AlreadyExists { path: target });
    }

    fs::rename(path, &target).map_err(|e| FsError::io(path, e))?;
    debug!(from = %path.display(), to = %target.display(), "renamed");
    Ok(target)
}

/// On case-insensitive filesystems `Clip.mp4` and `clip.mp4` are one object.
#[cfg(unix)]
fn same_object(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (a.symlink_metadata(), b.symlink_metadata()) {
        (Ok(x), Ok(y)) => x.dev() == y.dev() && x.ino() == y.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn same_object(a: &Path, b: &Path) -> bool {
    let a = a.file_name().and_then(|n| n.to_str()).map(str::to_lowercase);
    let b = b.file_name().and_then(|n| n.to_str()).map(str::to_lowercase);
    a.is_some() && a == b
}

/// Validate a filename for cross-platform compatibility.
pub fn validate_filename(name: &str) -> Result<(), FsError> {
    let invalid = |reason: &str| FsError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("name cannot be empty"));
    }
    if name.len() > 255 {
        return Err(invalid("name is too long (max 255 bytes)"));
    }
    if name == "." || name == ".." {
        return Err(invalid("'.' and '..' are reserved names"));
    }
    if let Some(c) = name.chars().find(|c| matches!(c, '/' | '\0')) {
        return Err(invalid(&format!("name cannot contain {c:?}")));
    }

    #[cfg(windows)]
    {
        if let Some(c) = name
            .chars()
            .find(|c| matches!(c, '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        {
            return Err(invalid(&format!("name cannot contain {c:?}")));
        }
        const RESERVED: [&str; 22] = [
            "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7",
            "COM8", "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
        ];
        let upper = name.to_uppercase();
        let stem = upper.split('.').next().unwrap_or_default();
        if RESERVED.contains(&stem) {
            return Err(invalid("reserved device name"));
        }
    }

    if name.ends_with('.') || name.ends_with(' ') {
        return Err(invalid("name cannot end with a dot or a space"));
    }
    Ok(())
}
