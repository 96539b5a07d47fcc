//! Directory listing container, ordering and metadata application.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::entry::Entry;
use crate::error::ScanWarning;
use crate::generation::{Generation, MediaUpdate};

/// Column a listing can be ordered by.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SortKey {
    /// File name, case-insensitive.
    #[default]
    Name,
    /// Type label: extension for files.
    Type,
    /// Size in bytes.
    Size,
    /// Modification time.
    Modified,
    /// Pixel count, then width.
    Resolution,
    /// Media duration.
    Duration,
}

/// Summary counters for a listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingStats {
    /// Number of files.
    pub files: u64,
    /// Number of directories.
    pub dirs: u64,
    /// Number of directories that are links.
    pub reparse_dirs: u64,
    /// Sum of file sizes.
    pub total_size: u64,
    /// Newest file (path, time).
    pub newest_file: Option<(PathBuf, SystemTime)>,
}

impl ListingStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats with an entry.
    pub fn record(&mut self, entry: &Entry) {
        if entry.is_dir() {
            self.dirs += 1;
            if entry.reparse {
                self.reparse_dirs += 1;
            }
            return;
        }

        self.files += 1;
        self.total_size += entry.size;
        if self
            .newest_file
            .as_ref()
            .is_none_or(|(_, t)| entry.modified > *t)
        {
            self.newest_file = Some((entry.path().to_path_buf(), entry.modified));
        }
    }
}

/// The materialized contents of one folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    /// Folder that was listed.
    pub folder: PathBuf,

    /// Generation the listing was produced for.
    pub generation: Generation,

    /// Entries, directories first.
    pub entries: Vec<Entry>,

    /// Summary counters.
    pub stats: ListingStats,

    /// Children that could not be read.
    pub warnings: Vec<ScanWarning>,
}

impl Listing {
    /// Create a listing; entries are put in the default order.
    pub fn new(
        folder: PathBuf,
        generation: Generation,
        mut entries: Vec<Entry>,
        warnings: Vec<ScanWarning>,
    ) -> Self {
        let mut stats = ListingStats::new();
        for entry in &entries {
            stats.record(entry);
        }
        sort_entries(&mut entries, SortKey::Name, true);
        Self {
            folder,
            generation,
            entries,
            stats,
            warnings,
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the folder is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reorder the entries. Directories always stay in front.
    pub fn sort_by(&mut self, key: SortKey, ascending: bool) {
        sort_entries(&mut self.entries, key, ascending);
    }

    /// Apply a background metadata result if it belongs to this listing.
    pub fn apply_media(&mut self, update: &MediaUpdate, live: Generation) -> bool {
        apply_media_update(&mut self.entries, self.generation, update, live)
    }

    /// Apply many background results in one pass. Returns how many entries
    /// were filled.
    pub fn apply_media_batch(&mut self, updates: &[MediaUpdate], live: Generation) -> usize {
        apply_media_updates(&mut self.entries, self.generation, updates, live)
    }

    /// Check if there were any warnings while listing.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Apply `update` to the matching entry of a result set owned by `owner`.
///
/// Nothing changes unless the update, the owning result set and the live
/// scope all carry the same generation, so a stale probe can never write
/// into entries of a newer view.
///
/// The entry is found by a linear scan; use [`apply_media_updates`] when
/// draining many results at once.
pub fn apply_media_update(
    entries: &mut [Entry],
    owner: Generation,
    update: &MediaUpdate,
    live: Generation,
) -> bool {
    if update.generation != live || owner != live {
        return false;
    }
    entries
        .iter_mut()
        .find(|e| e.path() == update.path)
        .map(|e| e.fill_media(update.media))
        .unwrap_or(false)
}

/// Batch form of [`apply_media_update`]: one pass over `entries` with the
/// updates looked up by path. Returns the number of entries filled.
pub fn apply_media_updates(
    entries: &mut [Entry],
    owner: Generation,
    updates: &[MediaUpdate],
    live: Generation,
) -> usize {
    if owner != live {
        return 0;
    }
    let by_path: HashMap<&Path, &MediaUpdate> = updates
        .iter()
        .filter(|u| u.generation == live)
        .map(|u| (u.path.as_path(), u))
        .collect();
    if by_path.is_empty() {
        return 0;
    }

    let mut filled = 0;
    for entry in entries.iter_mut() {
        let Some(media) = by_path.get(entry.path()).map(|u| u.media) else {
            continue;
        };
        if entry.fill_media(media) {
            filled += 1;
        }
    }
    filled
}

/// Sort entries by `key`, directories first, ties broken by name.
pub fn sort_entries(entries: &mut [Entry], key: SortKey, ascending: bool) {
    entries.sort_by(|a, b| {
        if a.is_dir() != b.is_dir() {
            return if a.is_dir() {
                Ordering::Less
            } else {
                Ordering::Greater
            };
        }

        let primary = match key {
            SortKey::Name => Ordering::Equal,
            SortKey::Type => type_label(a).cmp(&type_label(b)),
            SortKey::Size => a.size.cmp(&b.size),
            SortKey::Modified => a.modified.cmp(&b.modified),
            SortKey::Resolution => a
                .media()
                .pixels()
                .cmp(&b.media().pixels())
                .then(a.media().width.cmp(&b.media().width)),
            SortKey::Duration => a.media().duration.cmp(&b.media().duration),
        };

        let by_name = fold_name(a).cmp(&fold_name(b));
        match (key, ascending) {
            (SortKey::Name, true) => by_name,
            (SortKey::Name, false) => by_name.reverse(),
            (_, true) => primary.then(by_name),
            (_, false) => primary.reverse().then(by_name),
        }
    });
}

fn fold_name(entry: &Entry) -> String {
    entry.name().to_lowercase()
}

fn type_label(entry: &Entry) -> String {
    if entry.is_dir() {
        return "folder".to_string();
    }
    let ext = entry.extension();
    if ext.is_empty() { "file".to_string() } else { ext }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::MediaInfo;
    use std::time::Duration;

    fn sample() -> Vec<Entry> {
        vec![
            Entry::file("/f/b.txt", 30, SystemTime::UNIX_EPOCH),
            Entry::directory("/f/Zeta", SystemTime::UNIX_EPOCH, false),
            Entry::file("/f/A.mp4", 10, SystemTime::UNIX_EPOCH + Duration::from_secs(5)),
            Entry::directory("/f/alpha", SystemTime::UNIX_EPOCH, true),
        ]
    }

    #[test]
    fn test_listing_directories_first_by_name() {
        let listing = Listing::new(PathBuf::from("/f"), Generation(1), sample(), vec![]);
        let names: Vec<&str> = listing.entries.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["alpha", "Zeta", "A.mp4", "b.txt"]);
        assert_eq!(listing.stats.files, 2);
        assert_eq!(listing.stats.dirs, 2);
        assert_eq!(listing.stats.reparse_dirs, 1);
        assert_eq!(listing.stats.total_size, 40);
    }

    #[test]
    fn test_sort_by_size_descending_keeps_dirs_first() {
        let mut listing = Listing::new(PathBuf::from("/f"), Generation(1), sample(), vec![]);
        listing.sort_by(SortKey::Size, false);
        assert!(listing.entries[0].is_dir());
        assert!(listing.entries[1].is_dir());
        assert_eq!(listing.entries[2].name(), "b.txt");
    }

    #[test]
    fn test_apply_media_requires_matching_generation() {
        let mut listing = Listing::new(PathBuf::from("/f"), Generation(2), sample(), vec![]);
        let update = MediaUpdate {
            path: PathBuf::from("/f/A.mp4"),
            media: MediaInfo::new(1280, 720, Duration::from_secs(3)),
            generation: Generation(1),
        };
        assert!(!listing.apply_media(&update, Generation(2)));

        let fresh = MediaUpdate {
            generation: Generation(2),
            ..update
        };
        assert!(listing.apply_media(&fresh, Generation(2)));
        assert!(!listing.apply_media(&fresh, Generation(3)));
    }

    #[test]
    fn test_apply_media_batch_fills_matching_entries() {
        let mut listing = Listing::new(PathBuf::from("/f"), Generation(4), sample(), vec![]);
        let media = MediaInfo::new(640, 480, Duration::from_secs(9));
        let updates = vec![
            MediaUpdate {
                path: PathBuf::from("/f/A.mp4"),
                media,
                generation: Generation(4),
            },
            MediaUpdate {
                path: PathBuf::from("/f/b.txt"),
                media,
                generation: Generation(3),
            },
            MediaUpdate {
                path: PathBuf::from("/f/missing.mp4"),
                media,
                generation: Generation(4),
            },
        ];

        assert_eq!(listing.apply_media_batch(&updates, Generation(4)), 1);
        let filled: Vec<_> = listing
            .entries
            .iter()
            .filter(|e| e.media() == media)
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(filled, vec!["A.mp4".to_string()]);
        assert_eq!(listing.apply_media_batch(&updates, Generation(5)), 0);
    }

    #[test]
    fn test_sort_key_parse() {
        assert_eq!("Resolution".parse::<SortKey>().unwrap(), SortKey::Resolution);
        assert_eq!(SortKey::Modified.to_string(), "modified");
    }
}
