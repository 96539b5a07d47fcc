//! Parallel size measuring of operation sources.

use std::path::{Path, PathBuf};

use jwalk::{Parallelism, WalkDir};
use rayon::prelude::*;

use wayfile_core::meta::is_reparse_point;

/// File and byte totals for a set of sources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    /// Regular files (links are counted as files of size 0).
    pub files: u64,
    /// Directories, including the sources themselves.
    pub dirs: u64,
    /// Sum of regular file sizes.
    pub bytes: u64,
}

impl Totals {
    fn merge(self, other: Totals) -> Totals {
        Totals {
            files: self.files + other.files,
            dirs: self.dirs + other.dirs,
            bytes: self.bytes + other.bytes,
        }
    }
}

/// Measure all sources in parallel. Links are never followed, matching how
/// the operation engine treats them.
pub fn measure(sources: &[PathBuf]) -> Totals {
    sources
        .par_iter()
        .map(|p| measure_one(p))
        .reduce(Totals::default, Totals::merge)
}

fn measure_one(source: &Path) -> Totals {
    let Ok(meta) = std::fs::symlink_metadata(source) else {
        return Totals::default();
    };
    if is_reparse_point(&meta) {
        return Totals {
            files: 1,
            ..Totals::default()
        };
    }
    if !meta.is_dir() {
        return Totals {
            files: 1,
            dirs: 0,
            bytes: meta.len(),
        };
    }

    let walker = WalkDir::new(source)
        .parallelism(Parallelism::RayonDefaultPool {
            busy_timeout: std::time::Duration::from_millis(100),
        })
        .skip_hidden(false)
        .follow_links(false);

    let mut totals = Totals::default();
    for entry in walker.into_iter().flatten() {
        let file_type = entry.file_type();
        if file_type.is_dir() {
            totals.dirs += 1;
        } else if file_type.is_symlink() {
            totals.files += 1;
        } else if let Ok(m) = entry.metadata() {
            totals.files += 1;
            totals.bytes += m.len();
        }
    }
    totals
}
