//! Background media metadata indexing for wayfile.
//!
//! Listing a folder is fast; learning a video's resolution and duration is
//! not. This crate moves the slow part to a single background thread:
//!
//! - [`IndexScope`] owns the live [`Generation`] and the queue of paths
//!   waiting for metadata. Changing the viewed folder calls
//!   [`IndexScope::advance`], which empties the queue.
//! - [`IndexWorker`] starts at most one thread per generation. The thread
//!   pops the newest path first, runs the [`MetadataProbe`] and posts a
//!   [`MediaUpdate`] tagged with the generation that queued it.
//! - [`FfprobeProbe`] asks `ffprobe` for width, height and duration.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wayfile_core::EngineConfig;
//! use wayfile_index::{FfprobeProbe, IndexScope, IndexWorker};
//! use wayfile_scan::DirectoryScanner;
//!
//! let config = EngineConfig::default();
//! let scope = Arc::new(IndexScope::new());
//! let (worker, mut updates) = IndexWorker::new(
//!     scope.clone(),
//!     Arc::new(FfprobeProbe::from_config(&config)),
//!     config.clone(),
//! );
//!
//! let generation = scope.advance();
//! let mut listing = DirectoryScanner::new(config)
//!     .list("/videos".as_ref(), generation)
//!     .unwrap();
//! worker.queue_missing(&listing);
//! while let Some(update) = updates.blocking_recv() {
//!     listing.apply_media(&update, scope.generation());
//! }
//! ```

mod probe;
mod scope;
mod worker;

pub use probe::{parse_ffprobe_json, FfprobeProbe, MetadataProbe, NullProbe, ProbeError};
pub use scope::{IndexScope, IndexState};
pub use worker::IndexWorker;

pub use wayfile_core::{Generation, MediaInfo, MediaUpdate};
