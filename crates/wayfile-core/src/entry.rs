//! Listed filesystem entries.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Type of a listed filesystem object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    /// Regular file (or a link to one).
    File,
    /// Directory, including links to directories.
    Directory,
}

impl EntryKind {
    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Directory)
    }

    /// Check if this is a file.
    pub fn is_file(&self) -> bool {
        matches!(self, Self::File)
    }
}

/// Media properties of a file. All-zero means "unknown".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Playback duration.
    pub duration: Duration,
}

impl MediaInfo {
    /// The "not yet known" value.
    pub const UNKNOWN: MediaInfo = MediaInfo {
        width: 0,
        height: 0,
        duration: Duration::ZERO,
    };

    /// Create media info from its parts.
    pub fn new(width: u32, height: u32, duration: Duration) -> Self {
        Self {
            width,
            height,
            duration,
        }
    }

    /// Whether nothing is known yet.
    pub fn is_unknown(&self) -> bool {
        self.width == 0 && self.height == 0 && self.duration.is_zero()
    }

    /// Pixel count, used for resolution ordering.
    pub fn pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// One listed filesystem object.
///
/// The kind is fixed when the entry is created. Media properties start out
/// unknown and can be filled once, by the indexer of the generation that
/// produced the entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    path: PathBuf,
    name: CompactString,
    kind: EntryKind,

    /// Size in bytes. Always 0 for directories.
    pub size: u64,

    /// Last modification time.
    pub modified: SystemTime,

    /// Directory that is itself a link (symlink, junction, reparse point).
    pub reparse: bool,

    media: MediaInfo,
}

impl Entry {
    /// Create a file entry.
    pub fn file(path: impl Into<PathBuf>, size: u64, modified: SystemTime) -> Self {
        let path = path.into();
        Self {
            name: display_name(&path),
            path,
            kind: EntryKind::File,
            size,
            modified,
            reparse: false,
            media: MediaInfo::UNKNOWN,
        }
    }

    /// Create a directory entry. Directory sizes are never computed.
    pub fn directory(path: impl Into<PathBuf>, modified: SystemTime, reparse: bool) -> Self {
        let path = path.into();
        Self {
            name: display_name(&path),
            path,
            kind: EntryKind::Directory,
            size: 0,
            modified,
            reparse,
            media: MediaInfo::UNKNOWN,
        }
    }

    /// Absolute path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base name (the whole path for volume roots).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entry kind.
    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// Check if this entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Check if this entry is a file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Media properties (unknown until indexed).
    pub fn media(&self) -> MediaInfo {
        self.media
    }

    /// Record media properties.
    ///
    /// Returns `false` without changing anything for directories and for
    /// entries whose media was already filled.
    pub fn fill_media(&mut self, media: MediaInfo) -> bool {
        if !self.is_file() || !self.media.is_unknown() {
            return false;
        }
        self.media = media;
        true
    }

    /// Lowercase extension without the dot, empty when there is none.
    pub fn extension(&self) -> String {
        if self.is_dir() {
            return String::new();
        }
        self.path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }
}

fn display_name(path: &Path) -> CompactString {
    path.file_name()
        .map(|n| CompactString::new(n.to_string_lossy()))
        .unwrap_or_else(|| CompactString::new(path.to_string_lossy()))
}
