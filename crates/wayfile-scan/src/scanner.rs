//! Single-level directory listing.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use tracing::debug;

use wayfile_core::meta::{is_reparse_point, link_targets_directory};
use wayfile_core::{EngineConfig, Entry, FsError, Generation, Listing, ScanWarning, WarningKind};

/// Lists the direct children of a folder.
///
/// The whole listing is built before returning so callers can count and
/// sort it. Linked directories are reported as directories with
/// [`Entry::reparse`] set and are never descended into.
#[derive(Debug, Clone, Default)]
pub struct DirectoryScanner {
    config: EngineConfig,
}

impl DirectoryScanner {
    /// Create a scanner.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Configuration in use.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// List `folder` for the scope identified by `generation`.
    ///
    /// Fails when the folder itself cannot be opened. Children that cannot be
    /// inspected are skipped and reported in [`Listing::warnings`].
    pub fn list(&self, folder: &Path, generation: Generation) -> Result<Listing, FsError> {
        let metadata = fs::metadata(folder).map_err(|e| FsError::io(folder, e))?;
        if !metadata.is_dir() {
            return Err(FsError::NotADirectory {
                path: folder.to_path_buf(),
            });
        }

        let reader = fs::read_dir(folder).map_err(|e| FsError::io(folder, e))?;

        let mut entries = Vec::new();
        let mut warnings = Vec::new();

        for item in reader {
            let dir_entry = match item {
                Ok(e) => e,
                Err(err) => {
                    warnings.push(ScanWarning::from_io(folder, &err, WarningKind::ReadError));
                    continue;
                }
            };

            let name = dir_entry.file_name();
            if self.config.should_skip_hidden(&name.to_string_lossy()) {
                continue;
            }

            let path = dir_entry.path();
            match classify(&path) {
                Ok(entry) => entries.push(entry),
                Err(err) => {
                    warnings.push(ScanWarning::from_io(&path, &err, WarningKind::MetadataError));
                }
            }
        }

        debug!(
            folder = %folder.display(),
            entries = entries.len(),
            warnings = warnings.len(),
            %generation,
            "listed folder"
        );

        Ok(Listing::new(folder.to_path_buf(), generation, entries, warnings))
    }

    /// List every mounted volume root as a directory entry.
    pub fn list_volumes(&self, generation: Generation) -> Listing {
        let entries = volume_roots()
            .into_iter()
            .map(|root| {
                let modified = fs::metadata(&root)
                    .and_then(|m| m.modified())
                    .unwrap_or(UNIX_EPOCH);
                Entry::directory(root, modified, false)
            })
            .collect();
        Listing::new(PathBuf::new(), generation, entries, Vec::new())
    }
}

/// Build an entry for `path` without following directory links.
pub(crate) fn classify(path: &Path) -> std::io::Result<Entry> {
    let link_meta = fs::symlink_metadata(path)?;
    let modified = link_meta.modified().unwrap_or(UNIX_EPOCH);

    if is_reparse_point(&link_meta) {
        if link_targets_directory(path, &link_meta) {
            return Ok(Entry::directory(path, modified, true));
        }
        // Link to a file: report the target's size when it resolves.
        let (size, modified) = fs::metadata(path)
            .map(|m| (m.len(), m.modified().unwrap_or(modified)))
            .unwrap_or((0, modified));
        return Ok(Entry::file(path, size, modified));
    }

    if link_meta.is_dir() {
        Ok(Entry::directory(path, modified, false))
    } else {
        Ok(Entry::file(path, link_meta.len(), modified))
    }
}

/// Roots of all mounted volumes.
#[cfg(windows)]
pub fn volume_roots() -> Vec<PathBuf> {
    (b'A'..=b'Z')
        .map(|letter| PathBuf::from(format!("{}:\\", letter as char)))
        .filter(|root| root.exists())
        .collect()
}

/// Roots of all mounted volumes.
#[cfg(not(windows))]
pub fn volume_roots() -> Vec<PathBuf> {
    vec![PathBuf::from("/")]
}
