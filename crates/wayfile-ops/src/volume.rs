//! Volume identity, used to choose between rename and copy-then-delete.

use std::path::Path;

/// Decides whether two paths live on the same volume.
pub trait VolumeProbe: Send + Sync {
    /// `true` when a rename from `a` into `b` can stay on one volume.
    fn same_volume(&self, a: &Path, b: &Path) -> bool;
}

impl<F> VolumeProbe for F
where
    F: Fn(&Path, &Path) -> bool + Send + Sync,
{
    fn same_volume(&self, a: &Path, b: &Path) -> bool {
        self(a, b)
    }
}

/// Asks the operating system which volume each path belongs to.
///
/// Paths that do not exist yet are judged by their nearest existing
/// ancestor. When either side cannot be resolved the answer is "different",
/// which only costs a byte copy instead of a rename.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceVolumes;

impl VolumeProbe for DeviceVolumes {
    fn same_volume(&self, a: &Path, b: &Path) -> bool {
        match (volume_of(a), volume_of(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }
}

fn nearest_existing(path: &Path) -> Option<&Path> {
    path.ancestors().find(|p| p.symlink_metadata().is_ok())
}

#[cfg(unix)]
fn volume_of(path: &Path) -> Option<u64> {
    let existing = nearest_existing(path)?;
    let meta = existing.symlink_metadata().ok()?;
    wayfile_core::meta::device_id(&meta)
}

#[cfg(windows)]
fn volume_of(path: &Path) -> Option<String> {
    use std::os::windows::ffi::OsStrExt;
    use windows_sys::Win32::Storage::FileSystem::GetVolumePathNameW;

    let existing = nearest_existing(path)?;
    let wide: Vec<u16> = existing
        .as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();
    let mut buf = [0u16; 1024];

    // SAFETY: `wide` is NUL-terminated and `buf` is writable for its full length.
    let ok = unsafe { GetVolumePathNameW(wide.as_ptr(), buf.as_mut_ptr(), buf.len() as u32) };
    if ok == 0 {
        return None;
    }
    let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    Some(String::from_utf16_lossy(&buf[..len]).to_lowercase())
}

#[cfg(not(any(unix, windows)))]
fn volume_of(_path: &Path) -> Option<u8> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_same_folder_is_same_volume() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a"), "x").unwrap();
        assert!(DeviceVolumes.same_volume(&temp.path().join("a"), temp.path()));
    }

    #[test]
    fn test_missing_paths_use_existing_ancestor() {
        let temp = TempDir::new().unwrap();
        let not_yet = temp.path().join("new/deeper");
        assert!(DeviceVolumes.same_volume(temp.path(), &not_yet));
    }

    #[test]
    fn test_closure_probe() {
        let never = |_: &Path, _: &Path| false;
        assert!(!never.same_volume(Path::new("/a"), Path::new("/a")));
    }
}
