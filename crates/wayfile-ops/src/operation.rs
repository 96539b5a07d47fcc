//! Batch request types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Whether a transfer keeps or removes its sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TransferMode {
    /// Duplicate the sources.
    Copy,
    /// Relocate the sources.
    Move,
}

/// An ordered copy or move of several sources into one folder.
///
/// The engine takes the request by value, so a finished batch cannot be
/// run a second time by accident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Files and folders to transfer, in order.
    pub sources: Vec<PathBuf>,
    /// Copy or move.
    pub mode: TransferMode,
    /// Folder the sources land in.
    pub destination: PathBuf,
}

impl TransferRequest {
    /// Create a request.
    pub fn new(sources: Vec<PathBuf>, mode: TransferMode, destination: impl Into<PathBuf>) -> Self {
        Self {
            sources,
            mode,
            destination: destination.into(),
        }
    }

    /// Create a copy request.
    pub fn copy(sources: Vec<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self::new(sources, TransferMode::Copy, destination)
    }

    /// Create a move request.
    pub fn move_to(sources: Vec<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self::new(sources, TransferMode::Move, destination)
    }

    /// Number of sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether there is nothing to transfer.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// An ordered, permanent delete of several paths.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeleteRequest {
    /// Paths to remove, in order.
    pub targets: Vec<PathBuf>,
}

impl DeleteRequest {
    /// Create a delete request.
    pub fn new(targets: Vec<PathBuf>) -> Self {
        Self { targets }
    }
}
