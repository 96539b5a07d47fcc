//! Core types and traits for wayfile.
//!
//! This crate provides the fundamental data structures shared by the
//! scanner, the metadata indexer and the operation engine: listed entries,
//! generation tags, listings, configuration and pure path helpers.

mod config;
mod entry;
mod error;
mod generation;
mod listing;
pub mod meta;
pub mod path;

pub use config::{EngineConfig, EngineConfigBuilder, DEFAULT_MEDIA_EXTENSIONS};
pub use entry::{Entry, EntryKind, MediaInfo};
pub use error::{FailureKind, FsError, ScanWarning, WarningKind};
pub use generation::{Generation, MediaUpdate};
pub use listing::{
    apply_media_update, apply_media_updates, sort_entries, Listing, ListingStats, SortKey,
};
