//! Directory listing and recursive search for wayfile.
//!
//! # Overview
//!
//! `wayfile-scan` answers the two read-only questions the browser asks:
//!
//! - **What is in this folder?** [`DirectoryScanner::list`] builds a
//!   complete, sorted [`Listing`] (directories first, linked directories
//!   reported but never entered).
//! - **Where are the files named like this?** [`SearchEngine`] walks a
//!   subtree, every volume, or an explicit selection and keeps files whose
//!   names contain every search term. Results can be narrowed in place.
//!
//! It also measures operation sources ([`measure`]) so progress can show
//! byte totals.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use wayfile_scan::{Generation, SearchEngine, SearchQuery, SearchScope};
//!
//! let engine = SearchEngine::default();
//! let mut results = engine.search(
//!     SearchScope::Subtree(PathBuf::from("/videos")),
//!     SearchQuery::new(["trip"]),
//!     Generation(1),
//! );
//! results.narrow("2023");
//! for entry in &results.entries {
//!     println!("{}", entry.path().display());
//! }
//! ```

mod measure;
mod progress;
mod scanner;
mod search;

pub use measure::{measure, Totals};
pub use progress::{Checkpoint, SearchProgress};
pub use scanner::{volume_roots, DirectoryScanner};
pub use search::{SearchEngine, SearchQuery, SearchResults, SearchScope};

// Re-export core types for convenience
pub use wayfile_core::{
    EngineConfig, Entry, EntryKind, FsError, Generation, Listing, ListingStats, MediaInfo,
    ScanWarning, SortKey, WarningKind,
};
