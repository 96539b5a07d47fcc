//! The batch engine: ordered copy, move and delete with progress and
//! cooperative cancellation.

use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use wayfile_core::meta::is_reparse_point;
use wayfile_core::path::{base_name, is_same_or_inside, resolve, unique_destination};
use wayfile_core::{EngineConfig, FailureKind, FsError};
use wayfile_scan::measure;

use crate::copy::copy_entry;
use crate::operation::{DeleteRequest, TransferMode, TransferRequest};
use crate::progress::{
    BatchReport, BatchStatus, ItemFailure, OperationType, ProgressEvent, ProgressFlow,
    ProgressSink,
};
use crate::remove::{EntryRemover, Removal, RobustRemover};
use crate::volume::{DeviceVolumes, VolumeProbe};

/// Running totals of the primitive filesystem actions an engine performed.
#[derive(Debug, Default)]
pub struct EngineCounters {
    renames: AtomicU64,
    byte_copies: AtomicU64,
    bytes_copied: AtomicU64,
    removals: AtomicU64,
}

/// Point-in-time copy of [`EngineCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    /// Same-volume moves done with a single rename.
    pub renames: u64,
    /// Files copied byte by byte.
    pub byte_copies: u64,
    /// Bytes written by those copies.
    pub bytes_copied: u64,
    /// Files, links and folders removed (or scheduled for removal).
    pub removals: u64,
}

impl EngineCounters {
    /// Read all counters.
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            renames: self.renames.load(Ordering::Relaxed),
            byte_copies: self.byte_copies.load(Ordering::Relaxed),
            bytes_copied: self.bytes_copied.load(Ordering::Relaxed),
            removals: self.removals.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_rename(&self) {
        self.renames.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_byte_copy(&self, bytes: u64) {
        self.byte_copies.fetch_add(1, Ordering::Relaxed);
        self.bytes_copied.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_removals(&self, count: u64) {
        self.removals.fetch_add(count, Ordering::Relaxed);
    }
}

/// Per-batch state shared with the copy routines.
pub(crate) struct Batch<'a> {
    pub(crate) config: &'a EngineConfig,
    pub(crate) counters: &'a EngineCounters,
    token: &'a CancellationToken,
    sink: &'a mut dyn ProgressSink,
    aborted: bool,
    bytes_written: u64,
    event: ProgressEvent,
}

impl<'a> Batch<'a> {
    fn new(
        engine: &'a OperationEngine,
        operation: OperationType,
        item_count: usize,
        sink: &'a mut dyn ProgressSink,
        token: &'a CancellationToken,
    ) -> Self {
        Self {
            config: &engine.config,
            counters: &engine.counters,
            token,
            sink,
            aborted: false,
            bytes_written: 0,
            event: ProgressEvent::new(operation, item_count),
        }
    }

    /// Fail with [`FsError::Cancelled`] once the token fires or the sink aborts.
    pub(crate) fn checkpoint(&self) -> Result<(), FsError> {
        if self.aborted || self.token.is_cancelled() {
            Err(FsError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Report `bytes` more written for the current item.
    pub(crate) fn advance(&mut self, bytes: u64) -> Result<(), FsError> {
        self.bytes_written += bytes;
        self.event.bytes_done += bytes;
        self.emit()
    }

    /// Fill in the byte total once a byte copy turns out to be needed.
    fn set_bytes_total(&mut self, bytes_total: u64) {
        self.event.bytes_total = bytes_total;
    }

    fn begin_item(&mut self, index: usize, name: String, bytes_total: u64) -> Result<(), FsError> {
        self.event.item_index = index;
        self.event.item_name = name;
        self.event.bytes_done = 0;
        self.event.bytes_total = bytes_total;
        self.event.done = false;
        self.emit()
    }

    fn finish_item(&mut self) {
        self.event.done = true;
        let _ = self.emit();
    }

    fn emit(&mut self) -> Result<(), FsError> {
        if self.sink.on_progress(&self.event) == ProgressFlow::Abort {
            self.aborted = true;
        }
        self.checkpoint()
    }
}

struct ItemOutcome {
    target: PathBuf,
    reboot_pending: bool,
}

/// Runs copy, move and delete batches.
///
/// Batches run synchronously on the caller's thread; see
/// [`start_transfer`](crate::start_transfer) for the channel-based wrapper.
/// Items are processed in order. A failing item is recorded and the batch
/// moves on; cancellation stops the batch at once and leaves finished items
/// as they are.
pub struct OperationEngine {
    config: EngineConfig,
    volumes: Box<dyn VolumeProbe>,
    remover: Box<dyn EntryRemover>,
    counters: EngineCounters,
}

impl OperationEngine {
    /// Create an engine that asks the OS about volumes.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            volumes: Box::new(DeviceVolumes),
            remover: Box::new(RobustRemover),
            counters: EngineCounters::default(),
        }
    }

    /// Replace the volume probe.
    pub fn with_volume_probe(mut self, probe: impl VolumeProbe + 'static) -> Self {
        self.volumes = Box::new(probe);
        self
    }

    /// Replace how sources and delete targets are removed.
    pub fn with_remover(mut self, remover: impl EntryRemover + 'static) -> Self {
        self.remover = Box::new(remover);
        self
    }

    /// Configuration in use.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Totals of renames, byte copies and removals so far.
    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    /// Copy or move every source of `request` into its destination folder.
    pub fn execute<S: ProgressSink>(
        &self,
        request: TransferRequest,
        mut sink: S,
        token: &CancellationToken,
    ) -> BatchReport {
        let TransferRequest {
            sources,
            mode,
            destination,
        } = request;
        let operation = match mode {
            TransferMode::Copy => OperationType::Copy,
            TransferMode::Move => OperationType::Move,
        };
        let mut report = BatchReport::new(operation, sources.len());

        info!(
            %operation,
            items = sources.len(),
            destination = %destination.display(),
            "starting transfer"
        );

        if let Err(failure) = prepare_destination(&destination) {
            report.failures.push(failure);
            report.status = BatchStatus::Failed;
            warn!(destination = %destination.display(), "destination unusable");
            return report;
        }

        let mut batch = Batch::new(self, operation, sources.len(), &mut sink, token);
        for (index, source) in sources.iter().enumerate() {
            if batch.checkpoint().is_err() {
                report.status = BatchStatus::Cancelled;
                break;
            }
            // Only byte copies get a total; a rename needs no walk.
            let bytes_total = if mode == TransferMode::Copy
                || !self.volumes.same_volume(source, &destination)
            {
                item_bytes(source)
            } else {
                0
            };
            if batch
                .begin_item(index, base_name(source).into_owned(), bytes_total)
                .is_err()
            {
                report.status = BatchStatus::Cancelled;
                break;
            }

            match self.transfer_item(source, &destination, mode, &mut batch) {
                Ok(outcome) => {
                    debug!(source = %source.display(), target = %outcome.target.display(), "item done");
                    report.created.push(outcome.target);
                    if outcome.reboot_pending {
                        report.defer_to_restart(source);
                    } else {
                        report.succeeded += 1;
                    }
                }
                Err(FsError::Cancelled) => {
                    report.status = BatchStatus::Cancelled;
                    break;
                }
                Err(err) => {
                    warn!(source = %source.display(), error = %err, "item failed");
                    report.failures.push(ItemFailure::from_error(source, &err));
                }
            }
            batch.finish_item();
        }

        report.bytes_copied = batch.bytes_written;
        finish(report)
    }

    /// Permanently delete every target of `request`.
    pub fn delete<S: ProgressSink>(
        &self,
        request: DeleteRequest,
        mut sink: S,
        token: &CancellationToken,
    ) -> BatchReport {
        let targets = request.targets;
        let mut report = BatchReport::new(OperationType::Delete, targets.len());
        info!(items = targets.len(), "starting delete");

        let mut batch = Batch::new(self, OperationType::Delete, targets.len(), &mut sink, token);
        for (index, target) in targets.iter().enumerate() {
            if batch
                .begin_item(index, base_name(target).into_owned(), 0)
                .is_err()
            {
                report.status = BatchStatus::Cancelled;
                break;
            }

            match self.remover.remove(target) {
                Ok((removal, count)) => {
                    self.counters.record_removals(count);
                    if removal == Removal::RebootPending {
                        warn!(target = %target.display(), "delete deferred to next restart");
                        report.defer_to_restart(target);
                    } else {
                        report.succeeded += 1;
                    }
                }
                Err(err) => {
                    warn!(target = %target.display(), error = %err, "delete failed");
                    report.failures.push(ItemFailure::from_error(target, &err));
                }
            }
            batch.finish_item();
        }

        finish(report)
    }

    fn transfer_item(
        &self,
        source: &Path,
        dest_dir: &Path,
        mode: TransferMode,
        batch: &mut Batch<'_>,
    ) -> Result<ItemOutcome, FsError> {
        let meta = fs::symlink_metadata(source).map_err(|e| FsError::io(source, e))?;
        let is_dir = meta.is_dir() && !is_reparse_point(&meta);

        if is_dir && is_same_or_inside(&resolve(source), &resolve(dest_dir)) {
            return Err(FsError::InsideSource {
                source_path: source.to_path_buf(),
                destination: dest_dir.to_path_buf(),
            });
        }

        if mode == TransferMode::Move
            && source.parent().map(resolve) == Some(resolve(dest_dir))
        {
            // Already where it should be.
            return Ok(ItemOutcome {
                target: source.to_path_buf(),
                reboot_pending: false,
            });
        }

        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| FsError::InvalidPath {
                path: source.to_path_buf(),
                reason: "no usable file name".to_string(),
            })?;
        let target = unique_destination(dest_dir, name, is_dir, self.config.max_unique_suffix)?;

        match mode {
            TransferMode::Copy => {
                copy_entry(source, &meta, &target, batch)?;
                Ok(ItemOutcome {
                    target,
                    reboot_pending: false,
                })
            }
            TransferMode::Move => self.move_entry(source, &meta, dest_dir, target, batch),
        }
    }

    fn move_entry(
        &self,
        source: &Path,
        meta: &Metadata,
        dest_dir: &Path,
        target: PathBuf,
        batch: &mut Batch<'_>,
    ) -> Result<ItemOutcome, FsError> {
        if self.volumes.same_volume(source, dest_dir) {
            match fs::rename(source, &target) {
                Ok(()) => {
                    self.counters.record_rename();
                    return Ok(ItemOutcome {
                        target,
                        reboot_pending: false,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                    debug!(source = %source.display(), "rename crossed devices, copying instead");
                    batch.set_bytes_total(item_bytes(source));
                }
                Err(e) => return Err(FsError::io(source, e)),
            }
        }

        // A failed copy has already removed its partial destination.
        copy_entry(source, meta, &target, batch)?;

        match self.remover.remove(source) {
            Ok((removal, count)) => {
                self.counters.record_removals(count);
                Ok(ItemOutcome {
                    target,
                    reboot_pending: removal == Removal::RebootPending,
                })
            }
            Err(err) => {
                warn!(source = %source.display(), error = %err, "copied but source kept");
                Err(FsError::SourceKept {
                    path: source.to_path_buf(),
                    source: Box::new(err),
                })
            }
        }
    }
}

impl Default for OperationEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl std::fmt::Debug for OperationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationEngine")
            .field("config", &self.config)
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}

fn prepare_destination(destination: &Path) -> Result<(), ItemFailure> {
    match fs::metadata(destination) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(ItemFailure::new(
            destination,
            FailureKind::InvalidDestination,
            "destination is not a folder",
        )),
        Err(err) if err.kind() == io::ErrorKind::NotFound => fs::create_dir_all(destination)
            .map_err(|e| ItemFailure::from_error(destination, &FsError::io(destination, e))),
        Err(err) => Err(ItemFailure::from_error(
            destination,
            &FsError::io(destination, err),
        )),
    }
}

/// Bytes a byte copy of `source` writes. A link to a file counts as the
/// file it points to.
fn item_bytes(source: &Path) -> u64 {
    match fs::symlink_metadata(source) {
        Ok(meta) if is_reparse_point(&meta) => fs::metadata(source)
            .ok()
            .filter(|followed| followed.is_file())
            .map_or(0, |followed| followed.len()),
        Ok(_) => measure(&[source.to_path_buf()]).bytes,
        Err(_) => 0,
    }
}

fn finish(mut report: BatchReport) -> BatchReport {
    if report.status != BatchStatus::Cancelled {
        report.status = if report.failures.is_empty() {
            BatchStatus::Success
        } else {
            BatchStatus::Failed
        };
    }
    info!(
        operation = %report.operation,
        status = ?report.status,
        succeeded = report.succeeded,
        failed = report.failures.len(),
        "{}",
        report.summary()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::IgnoreProgress;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, PathBuf, PathBuf) {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(&dst).unwrap();
        (temp, src, dst)
    }

    fn small_chunks() -> OperationEngine {
        OperationEngine::new(EngineConfig::builder().copy_chunk_size(4usize).build().unwrap())
    }

    #[test]
    fn test_copy_file_reports_chunks() {
        let (_temp, src, dst) = fixture();
        fs::write(src.join("a.bin"), vec![7u8; 10]).unwrap();

        let mut events = Vec::new();
        let report = small_chunks().execute(
            TransferRequest::copy(vec![src.join("a.bin")], &dst),
            |e: &ProgressEvent| {
                events.push(e.clone());
                ProgressFlow::Continue
            },
            &CancellationToken::new(),
        );

        assert!(report.is_success());
        assert_eq!(report.bytes_copied, 10);
        assert_eq!(fs::read(dst.join("a.bin")).unwrap(), vec![7u8; 10]);
        // start, three chunks (4 + 4 + 2), done
        assert_eq!(events.len(), 5);
        assert_eq!(events[0].bytes_total, 10);
        assert_eq!(events[3].bytes_done, 10);
        assert!(events[4].done);
        assert!(events.iter().all(|e| e.item_name == "a.bin"));
    }

    #[test]
    fn test_copy_into_same_folder_gets_suffix() {
        let (_temp, src, _dst) = fixture();
        fs::write(src.join("movie.mp4"), "x").unwrap();
        fs::create_dir(src.join("v1.2")).unwrap();

        let report = OperationEngine::default().execute(
            TransferRequest::copy(vec![src.join("movie.mp4"), src.join("v1.2")], &src),
            IgnoreProgress,
            &CancellationToken::new(),
        );
        assert!(report.is_success());
        assert_eq!(
            report.created,
            vec![src.join("movie (1).mp4"), src.join("v1.2 (1)")]
        );
    }

    #[test]
    fn test_folder_into_itself_is_invalid_and_batch_continues() {
        let (_temp, src, _dst) = fixture();
        let folder = src.join("folder");
        fs::create_dir_all(folder.join("inner")).unwrap();
        fs::write(src.join("ok.txt"), "x").unwrap();

        let report = OperationEngine::default().execute(
            TransferRequest::copy(vec![folder.clone(), src.join("ok.txt")], folder.join("inner")),
            IgnoreProgress,
            &CancellationToken::new(),
        );
        assert_eq!(report.status, BatchStatus::Failed);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, FailureKind::InvalidDestination);
        assert_eq!(report.succeeded, 1);
        assert!(folder.join("inner/ok.txt").exists());
    }

    #[test]
    fn test_missing_source_is_not_found() {
        let (_temp, src, dst) = fixture();
        let report = OperationEngine::default().execute(
            TransferRequest::copy(vec![src.join("gone.txt")], &dst),
            IgnoreProgress,
            &CancellationToken::new(),
        );
        assert_eq!(report.failures[0].kind, FailureKind::NotFound);
        assert!(report.warning().unwrap().contains("not found"));
    }

    #[test]
    fn test_cancelled_token_stops_before_first_item() {
        let (_temp, src, dst) = fixture();
        fs::write(src.join("a.txt"), "x").unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let report = OperationEngine::default().execute(
            TransferRequest::copy(vec![src.join("a.txt")], &dst),
            IgnoreProgress,
            &token,
        );
        assert_eq!(report.status, BatchStatus::Cancelled);
        assert_eq!(report.succeeded, 0);
        assert!(!dst.join("a.txt").exists());
        assert!(report.warning().is_none());
    }

    #[test]
    fn test_move_within_folder_is_noop() {
        let (_temp, src, _dst) = fixture();
        fs::write(src.join("a.txt"), "x").unwrap();
        let engine = OperationEngine::default();
        let report = engine.execute(
            TransferRequest::move_to(vec![src.join("a.txt")], &src),
            IgnoreProgress,
            &CancellationToken::new(),
        );
        assert!(report.is_success());
        assert!(src.join("a.txt").exists());
        assert!(!src.join("a (1).txt").exists());
        assert_eq!(engine.counters(), CounterSnapshot::default());
    }

    #[test]
    fn test_destination_is_created() {
        let (_temp, src, dst) = fixture();
        fs::write(src.join("a.txt"), "x").unwrap();
        let nested = dst.join("new/folder");
        let report = OperationEngine::default().execute(
            TransferRequest::copy(vec![src.join("a.txt")], &nested),
            IgnoreProgress,
            &CancellationToken::new(),
        );
        assert!(report.is_success());
        assert!(nested.join("a.txt").exists());
    }

    #[test]
    fn test_delete_counts_removals() {
        let (_temp, src, _dst) = fixture();
        fs::create_dir_all(src.join("tree/sub")).unwrap();
        fs::write(src.join("tree/sub/f.txt"), "x").unwrap();
        fs::write(src.join("single.txt"), "x").unwrap();

        let engine = OperationEngine::default();
        let report = engine.delete(
            DeleteRequest::new(vec![src.join("tree"), src.join("single.txt"), src.join("gone")]),
            IgnoreProgress,
            &CancellationToken::new(),
        );
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.status, BatchStatus::Failed);
        assert_eq!(engine.counters().removals, 4);
        assert!(!src.join("tree").exists());
    }
}
