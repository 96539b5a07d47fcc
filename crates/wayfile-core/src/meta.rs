//! Cross-platform metadata helpers.

use std::fs::Metadata;
use std::path::Path;

/// Whether the object is a link of any kind: a symlink, or on Windows any
/// reparse point (junctions, mount points).
pub fn is_reparse_point(metadata: &Metadata) -> bool {
    metadata.file_type().is_symlink() || has_reparse_attribute(metadata)
}

#[cfg(windows)]
fn has_reparse_attribute(metadata: &Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_REPARSE_POINT: u32 = 0x400;
    metadata.file_attributes() & FILE_ATTRIBUTE_REPARSE_POINT != 0
}

#[cfg(not(windows))]
fn has_reparse_attribute(_metadata: &Metadata) -> bool {
    false
}

/// Whether a link (as seen by `symlink_metadata`) points at a directory.
pub fn link_targets_directory(path: &Path, metadata: &Metadata) -> bool {
    if metadata.is_dir() {
        // Junctions and directory symlinks on Windows report as directories.
        return true;
    }
    std::fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}

/// Get the device ID from metadata.
#[cfg(unix)]
pub fn device_id(metadata: &Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(metadata.dev())
}

#[cfg(not(unix))]
pub fn device_id(_metadata: &Metadata) -> Option<u64> {
    None // Windows resolves volumes by path instead
}
