//! Clipboard exchange of file lists between processes.
//!
//! A payload is encoded as the UTF-8 mode tag (`copy` or `move`), a NUL,
//! then every path followed by a NUL, then one more NUL:
//!
//! ```text
//! move\0/videos/a.mp4\0/videos/b.mp4\0\0
//! ```
//!
//! The bridge keeps the last published payload in memory as well. When both
//! exist, the external medium wins.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use wayfile_core::FsError;

use crate::engine::OperationEngine;
use crate::operation::{TransferMode, TransferRequest};
use crate::progress::{BatchReport, ProgressSink};

/// Errors from clipboard access.
#[derive(Debug, Error)]
pub enum ClipboardError {
    /// A path cannot be carried by the exchange format.
    #[error(transparent)]
    Path(#[from] FsError),

    /// The exchange medium could not be read or written.
    #[error("clipboard medium: {0}")]
    Medium(#[from] io::Error),
}

/// Ordered paths that are valid UTF-8 and free of NUL bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathList(Vec<PathBuf>);

impl PathList {
    /// Validate `paths`.
    pub fn new(paths: Vec<PathBuf>) -> Result<Self, FsError> {
        for path in &paths {
            let Some(text) = path.to_str() else {
                return Err(FsError::InvalidPath {
                    path: path.clone(),
                    reason: "not valid UTF-8".to_string(),
                });
            };
            if text.is_empty() || text.contains('\0') {
                return Err(FsError::InvalidPath {
                    path: path.clone(),
                    reason: "empty or contains a NUL byte".to_string(),
                });
            }
        }
        Ok(Self(paths))
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.0
    }

    pub fn into_paths(self) -> Vec<PathBuf> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A mode plus the paths it applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardPayload {
    mode: TransferMode,
    paths: PathList,
}

impl ClipboardPayload {
    /// Build a payload, rejecting paths the format cannot carry.
    pub fn new(mode: TransferMode, paths: Vec<PathBuf>) -> Result<Self, FsError> {
        Ok(Self {
            mode,
            paths: PathList::new(paths)?,
        })
    }

    pub fn mode(&self) -> TransferMode {
        self.mode
    }

    pub fn paths(&self) -> &[PathBuf] {
        self.paths.paths()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Serialize to the exchange format.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(self.mode.to_string().as_bytes());
        out.push(0);
        for path in self.paths.paths() {
            // PathList guarantees UTF-8.
            out.extend_from_slice(path.to_string_lossy().as_bytes());
            out.push(0);
        }
        out.push(0);
        out
    }

    /// Parse the exchange format. Foreign or malformed data yields `None`.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(bytes).ok()?;
        let (tag, rest) = text.split_once('\0')?;
        let mode = TransferMode::from_str(tag).ok()?;

        let body = rest.strip_suffix('\0')?;
        let paths = if body.is_empty() {
            Vec::new()
        } else {
            let body = body.strip_suffix('\0')?;
            body.split('\0')
                .map(|p| (!p.is_empty()).then(|| PathBuf::from(p)))
                .collect::<Option<Vec<_>>>()?
        };
        Self::new(mode, paths).ok()
    }

    fn into_request(self, destination: PathBuf) -> TransferRequest {
        TransferRequest::new(self.paths.into_paths(), self.mode, destination)
    }
}

/// Where the clipboard bytes live.
pub trait ExchangeMedium {
    /// Current content, `None` when empty.
    fn read(&self) -> io::Result<Option<Vec<u8>>>;
    /// Replace the content.
    fn write(&self, bytes: &[u8]) -> io::Result<()>;
    /// Empty the medium.
    fn clear(&self) -> io::Result<()>;
}

/// In-process medium. Clones share the same content.
#[derive(Debug, Clone, Default)]
pub struct MemoryMedium {
    content: Arc<Mutex<Option<Vec<u8>>>>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Vec<u8>>> {
        self.content
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ExchangeMedium for MemoryMedium {
    fn read(&self) -> io::Result<Option<Vec<u8>>> {
        Ok(self.slot().clone())
    }

    fn write(&self, bytes: &[u8]) -> io::Result<()> {
        *self.slot() = Some(bytes.to_vec());
        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        *self.slot() = None;
        Ok(())
    }
}

/// A shared exchange file, visible to every process that knows the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMedium {
    path: PathBuf,
}

impl FileMedium {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `wayfile-clipboard` in the system temp folder.
    pub fn default_location() -> Self {
        Self::new(std::env::temp_dir().join("wayfile-clipboard"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ExchangeMedium for FileMedium {
    fn read(&self) -> io::Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(None),
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, bytes: &[u8]) -> io::Result<()> {
        fs::write(&self.path, bytes)
    }

    fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// Which copy of the clipboard a paste used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipSource {
    /// The shared medium.
    External,
    /// This process's own last selection.
    Internal,
}

/// Internal selection plus an external medium.
#[derive(Debug)]
pub struct ClipboardBridge<M> {
    medium: M,
    internal: Option<ClipboardPayload>,
}

impl<M: ExchangeMedium> ClipboardBridge<M> {
    pub fn new(medium: M) -> Self {
        Self {
            medium,
            internal: None,
        }
    }

    pub fn medium(&self) -> &M {
        &self.medium
    }

    /// The selection this bridge last published, if it is still held.
    pub fn internal(&self) -> Option<&ClipboardPayload> {
        self.internal.as_ref()
    }

    /// Write `payload` to the medium and hold it internally.
    pub fn publish(&mut self, payload: ClipboardPayload) -> Result<(), ClipboardError> {
        self.medium.write(&payload.encode())?;
        debug!(mode = %payload.mode(), items = payload.paths().len(), "clipboard published");
        self.internal = Some(payload);
        Ok(())
    }

    /// Read the medium. Empty lists and foreign content count as nothing.
    pub fn consume(&self) -> Result<Option<ClipboardPayload>, ClipboardError> {
        let Some(bytes) = self.medium.read()? else {
            return Ok(None);
        };
        match ClipboardPayload::decode(&bytes) {
            Some(payload) if !payload.is_empty() => Ok(Some(payload)),
            Some(_) => Ok(None),
            None => {
                debug!(len = bytes.len(), "ignoring foreign clipboard content");
                Ok(None)
            }
        }
    }

    /// The payload a paste would use, external medium first.
    pub fn resolve(&self) -> Option<(ClipSource, ClipboardPayload)> {
        match self.consume() {
            Ok(Some(payload)) => return Some((ClipSource::External, payload)),
            Ok(None) => {}
            Err(err) => warn!(error = %err, "clipboard medium unreadable"),
        }
        self.internal
            .clone()
            .filter(|p| !p.is_empty())
            .map(|p| (ClipSource::Internal, p))
    }

    /// Drop the internal selection and empty the medium.
    pub fn clear(&mut self) -> Result<(), ClipboardError> {
        self.internal = None;
        self.medium.clear()?;
        Ok(())
    }

    /// Transfer the resolved payload into `destination`.
    ///
    /// The internal selection is dropped whatever happens. After a fully
    /// successful move taken from the medium, the medium is cleared too.
    /// Returns `None` when there was nothing to paste.
    pub fn paste<S: ProgressSink>(
        &mut self,
        engine: &OperationEngine,
        destination: impl Into<PathBuf>,
        sink: S,
        token: &CancellationToken,
    ) -> Option<BatchReport> {
        let resolved = self.resolve();
        self.internal = None;
        let (source, payload) = resolved?;

        let mode = payload.mode();
        let report = engine.execute(payload.into_request(destination.into()), sink, token);

        if mode == TransferMode::Move && source == ClipSource::External && report.is_success() {
            if let Err(err) = self.medium.clear() {
                warn!(error = %err, "could not clear clipboard medium after move");
            }
        }
        Some(report)
    }
}
