//! Recursive multi-term filename search.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use tracing::debug;

use wayfile_core::meta::{is_reparse_point, link_targets_directory};
use wayfile_core::path::{fold_case, name_contains_all};
use wayfile_core::{apply_media_update, EngineConfig, Entry, Generation, MediaUpdate};

use crate::progress::{Checkpoint, ProgressTracker, SearchProgress};
use crate::scanner::volume_roots;

/// Where a search looks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchScope {
    /// Everything below one folder.
    Subtree(PathBuf),
    /// Everything below every volume root.
    AllVolumes,
    /// A pre-selected set: files are tested directly, folders are walked.
    Explicit {
        folders: Vec<PathBuf>,
        files: Vec<PathBuf>,
    },
}

impl SearchScope {
    /// Build a scope from a selection, falling back to the origin folder
    /// (or all volumes when there is none) if nothing is selected.
    pub fn from_selection(
        origin: Option<PathBuf>,
        folders: Vec<PathBuf>,
        files: Vec<PathBuf>,
    ) -> Self {
        if !folders.is_empty() || !files.is_empty() {
            return Self::Explicit { folders, files };
        }
        match origin {
            Some(folder) => Self::Subtree(folder),
            None => Self::AllVolumes,
        }
    }
}

/// Case-folded terms that must all appear in a file's base name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    terms: Vec<String>,
    /// Only consider files with a configured media extension.
    pub media_only: bool,
}

impl SearchQuery {
    /// Create a query. Terms are trimmed and case-folded; blank ones are dropped.
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut query = Self::default();
        for term in terms {
            query.push_term(term.as_ref());
        }
        query
    }

    /// Restrict matches to media files.
    pub fn media_only(mut self, media_only: bool) -> Self {
        self.media_only = media_only;
        self
    }

    /// The active folded terms.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Add a term; returns the folded form, or `None` if it was blank.
    fn push_term(&mut self, term: &str) -> Option<String> {
        let folded = fold_case(term.trim());
        if folded.is_empty() {
            return None;
        }
        self.terms.push(folded.clone());
        Some(folded)
    }

    fn matches(&self, path: &Path, config: &EngineConfig) -> bool {
        if self.media_only && !config.is_media_path(path) {
            return false;
        }
        name_contains_all(path, &self.terms)
    }
}

/// Files found by a search.
#[derive(Debug, Clone)]
pub struct SearchResults {
    /// Scope that was searched.
    pub scope: SearchScope,
    /// Query the entries satisfy, including narrowing terms.
    pub query: SearchQuery,
    /// Generation the results were produced for.
    pub generation: Generation,
    /// Matching files, in walk order.
    pub entries: Vec<Entry>,
    /// Final counters of the walk.
    pub progress: SearchProgress,
    /// The checkpoint asked to stop before the walk finished.
    pub stopped: bool,
}

impl SearchResults {
    /// Narrow the results with one more term, in place and without rescanning.
    ///
    /// Every entry already matches the previous terms, so keeping the ones
    /// that also contain the new term gives exactly the rerun result.
    /// Returns the number of entries removed.
    pub fn narrow(&mut self, term: &str) -> usize {
        let Some(folded) = self.query.push_term(term) else {
            return 0;
        };
        let before = self.entries.len();
        let single = [folded];
        self.entries.retain(|e| name_contains_all(e.path(), &single));
        before - self.entries.len()
    }

    /// Apply a background metadata result if it belongs to these results.
    pub fn apply_media(&mut self, update: &MediaUpdate, live: Generation) -> bool {
        apply_media_update(&mut self.entries, self.generation, update, live)
    }

    /// Number of matches.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing matched.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Walks directory trees collecting files whose names match a query.
#[derive(Debug, Clone, Default)]
pub struct SearchEngine {
    config: EngineConfig,
}

impl SearchEngine {
    /// Create a search engine.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Run a search to completion.
    pub fn search(&self, scope: SearchScope, query: SearchQuery, generation: Generation) -> SearchResults {
        self.search_with(scope, query, generation, |_| Checkpoint::Continue)
    }

    /// Run a search, calling `checkpoint` every time a directory is entered.
    ///
    /// The checkpoint is where a host event loop gets control back; returning
    /// [`Checkpoint::Stop`] ends the walk with the results gathered so far.
    pub fn search_with<F>(
        &self,
        scope: SearchScope,
        query: SearchQuery,
        generation: Generation,
        mut checkpoint: F,
    ) -> SearchResults
    where
        F: FnMut(&SearchProgress) -> Checkpoint,
    {
        let mut walk = Walk {
            config: &self.config,
            query: &query,
            tracker: ProgressTracker::new(),
            out: Vec::new(),
            stopped: false,
        };

        match &scope {
            SearchScope::Subtree(root) => walk.tree(root, &mut checkpoint),
            SearchScope::AllVolumes => {
                for root in volume_roots() {
                    if walk.stopped {
                        break;
                    }
                    walk.tree(&root, &mut checkpoint);
                }
            }
            SearchScope::Explicit { folders, files } => {
                for file in files {
                    walk.selected_file(file);
                }
                for folder in folders {
                    if walk.stopped {
                        break;
                    }
                    walk.tree(folder, &mut checkpoint);
                }
            }
        }

        let Walk {
            tracker,
            out,
            stopped,
            ..
        } = walk;
        let progress = tracker.finish();

        debug!(
            terms = ?query.terms(),
            dirs = progress.dirs_visited,
            files = progress.files_seen,
            matches = out.len(),
            stopped,
            "search finished"
        );

        SearchResults {
            scope,
            query,
            generation,
            entries: out,
            progress,
            stopped,
        }
    }
}

struct Walk<'a> {
    config: &'a EngineConfig,
    query: &'a SearchQuery,
    tracker: ProgressTracker,
    out: Vec<Entry>,
    stopped: bool,
}

impl Walk<'_> {
    /// Depth-first, pre-order walk with an explicit stack of open directories.
    ///
    /// Siblings are handled in enumeration order and a subdirectory is fully
    /// walked before the next sibling, exactly like the recursive form.
    fn tree<F>(&mut self, root: &Path, checkpoint: &mut F)
    where
        F: FnMut(&SearchProgress) -> Checkpoint,
    {
        let mut stack: Vec<fs::ReadDir> = Vec::new();
        if let Some(reader) = self.enter(root, checkpoint) {
            stack.push(reader);
        }

        while let Some(reader) = stack.last_mut() {
            let Some(item) = reader.next() else {
                stack.pop();
                continue;
            };
            let Ok(dir_entry) = item else {
                continue;
            };
            if self
                .config
                .should_skip_hidden(&dir_entry.file_name().to_string_lossy())
            {
                continue;
            }

            let path = dir_entry.path();
            let Ok(link_meta) = fs::symlink_metadata(&path) else {
                continue;
            };

            if is_reparse_point(&link_meta) {
                if link_targets_directory(&path, &link_meta) {
                    // Linked directories are opaque leaves.
                    continue;
                }
                self.test_file(&path);
            } else if link_meta.is_dir() {
                match self.enter(&path, checkpoint) {
                    Some(reader) => stack.push(reader),
                    None if self.stopped => return,
                    None => {}
                }
            } else {
                self.test_file(&path);
            }
        }
    }

    /// Run the checkpoint for `dir` and open it.
    fn enter<F>(&mut self, dir: &Path, checkpoint: &mut F) -> Option<fs::ReadDir>
    where
        F: FnMut(&SearchProgress) -> Checkpoint,
    {
        if self.stopped {
            return None;
        }
        self.tracker.enter_dir(dir.to_path_buf());
        if checkpoint(self.tracker.snapshot()) == Checkpoint::Stop {
            self.stopped = true;
            return None;
        }
        match fs::read_dir(dir) {
            Ok(reader) => Some(reader),
            Err(err) => {
                debug!(dir = %dir.display(), error = %err, "skipping unreadable directory");
                None
            }
        }
    }

    fn test_file(&mut self, path: &Path) {
        let matched = self.query.matches(path, self.config);
        self.tracker.record_file(matched);
        if !matched {
            return;
        }
        // Fast metadata only; media properties are left to the indexer.
        let (size, modified) = fs::metadata(path)
            .map(|m| (m.len(), m.modified().unwrap_or(UNIX_EPOCH)))
            .unwrap_or((0, UNIX_EPOCH));
        self.out.push(Entry::file(path, size, modified));
    }

    fn selected_file(&mut self, path: &Path) {
        if !self.query.matches(path, self.config) {
            self.tracker.record_file(false);
            return;
        }
        match fs::metadata(path) {
            Ok(meta) if meta.is_file() => {
                self.tracker.record_file(true);
                self.out.push(Entry::file(
                    path,
                    meta.len(),
                    meta.modified().unwrap_or(UNIX_EPOCH),
                ));
            }
            _ => self.tracker.record_file(false),
        }
    }
}
