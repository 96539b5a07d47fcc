//! File operations engine for wayfile.
//!
//! This crate runs ordered copy, move and delete batches with per-chunk
//! progress and cooperative cancellation, exchanges file lists through a
//! clipboard medium, and renames entries in place.
//!
//! Batches run synchronously through [`OperationEngine`], or on the blocking
//! pool with results delivered over a channel via [`start_transfer`] and
//! [`start_delete`].
//!
//! ```no_run
//! use tokio_util::sync::CancellationToken;
//! use wayfile_ops::{IgnoreProgress, OperationEngine, TransferRequest};
//!
//! let engine = OperationEngine::default();
//! let report = engine.execute(
//!     TransferRequest::copy(vec!["/videos/a.mp4".into()], "/backup"),
//!     IgnoreProgress,
//!     &CancellationToken::new(),
//! );
//! println!("{}", report.summary());
//! ```

mod clipboard;
mod copy;
mod engine;
mod executor;
mod operation;
mod progress;
mod remove;
mod rename;
mod volume;

pub use clipboard::{
    ClipSource, ClipboardBridge, ClipboardError, ClipboardPayload, ExchangeMedium, FileMedium,
    MemoryMedium, PathList,
};
pub use engine::{CounterSnapshot, EngineCounters, OperationEngine};
pub use executor::{start_delete, start_transfer, OperationResult};
pub use operation::{DeleteRequest, TransferMode, TransferRequest};
pub use progress::{
    BatchReport, BatchStatus, IgnoreProgress, ItemFailure, OperationType, ProgressEvent,
    ProgressFlow, ProgressSink,
};
pub use remove::{remove_path, EntryRemover, Removal, RobustRemover};
pub use rename::{rename_entry, validate_filename};
pub use volume::{DeviceVolumes, VolumeProbe};

pub use tokio_util::sync::CancellationToken;
pub use wayfile_core::{EngineConfig, FailureKind, FsError};

/// Default channel buffer size for operation progress updates.
pub const OPERATION_CHANNEL_SIZE: usize = 100;
