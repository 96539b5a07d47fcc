//! Background metadata worker.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use wayfile_core::{EngineConfig, Entry, Generation, Listing, MediaUpdate};

use crate::probe::MetadataProbe;
use crate::scope::{IndexScope, IndexState};

/// Starts and tracks the background thread that fills in media metadata.
///
/// Results are posted as [`MediaUpdate`]s on the channel returned by
/// [`IndexWorker::new`]. The consumer applies them with
/// [`Listing::apply_media`], which drops anything from an older generation.
pub struct IndexWorker {
    scope: Arc<IndexScope>,
    probe: Arc<dyn MetadataProbe>,
    config: EngineConfig,
    updates: mpsc::UnboundedSender<MediaUpdate>,
    handle: Mutex<Option<JoinHandle<()>>>,
    spawned: AtomicU64,
}

impl IndexWorker {
    /// Create a worker bound to `scope`, and the receiver for its results.
    pub fn new(
        scope: Arc<IndexScope>,
        probe: Arc<dyn MetadataProbe>,
        config: EngineConfig,
    ) -> (Self, mpsc::UnboundedReceiver<MediaUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Self {
            scope,
            probe,
            config,
            updates: tx,
            handle: Mutex::new(None),
            spawned: AtomicU64::new(0),
        };
        (worker, rx)
    }

    /// The scope this worker serves.
    pub fn scope(&self) -> &Arc<IndexScope> {
        &self.scope
    }

    /// Lifecycle state for the live generation.
    pub fn state(&self) -> IndexState {
        self.scope.state()
    }

    /// Number of worker threads started so far.
    pub fn workers_spawned(&self) -> u64 {
        self.spawned.load(Ordering::Relaxed)
    }

    /// Queue paths for the live generation, starting a worker if none is
    /// running for it. Returns the number of paths queued.
    pub fn enqueue<I>(&self, paths: I) -> usize
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let paths: Vec<PathBuf> = paths.into_iter().collect();
        let count = paths.len();
        if let Some(generation) = self.scope.push(paths) {
            self.spawn(generation);
        }
        count
    }

    /// Queue every media file of `listing` whose metadata is still unknown.
    ///
    /// Listings from an older generation are ignored.
    pub fn queue_missing(&self, listing: &Listing) -> usize {
        if !self.scope.is_live(listing.generation) {
            return 0;
        }
        self.queue_missing_entries(&listing.entries)
    }

    /// Same as [`queue_missing`](Self::queue_missing) for a bare entry slice,
    /// such as search results of the live generation.
    pub fn queue_missing_entries(&self, entries: &[Entry]) -> usize {
        let missing = entries
            .iter()
            .filter(|e| e.is_file() && e.media().is_unknown())
            .filter(|e| self.config.is_media_path(e.path()))
            .map(|e| e.path().to_path_buf());
        self.enqueue(missing)
    }

    /// Block until the most recently started worker thread has exited.
    pub fn wait(&self) {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("index worker panicked");
            }
        }
    }

    fn spawn(&self, generation: Generation) {
        let scope = Arc::clone(&self.scope);
        let probe = Arc::clone(&self.probe);
        let updates = self.updates.clone();

        let spawned = thread::Builder::new()
            .name(format!("wayfile-index-{}", generation.0))
            .spawn(move || run(&scope, probe.as_ref(), &updates, generation));

        match spawned {
            Ok(handle) => {
                self.spawned.fetch_add(1, Ordering::Relaxed);
                // Replacing the handle detaches a superseded worker; it exits
                // on its own at its next queue check.
                let mut slot = self.handle.lock().unwrap_or_else(|p| p.into_inner());
                *slot = Some(handle);
            }
            Err(err) => {
                warn!(%generation, error = %err, "failed to start index worker");
                self.scope.release(generation);
            }
        }
    }
}

impl std::fmt::Debug for IndexWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexWorker")
            .field("scope", &self.scope)
            .field("spawned", &self.workers_spawned())
            .finish_non_exhaustive()
    }
}

fn run(
    scope: &IndexScope,
    probe: &dyn MetadataProbe,
    updates: &mpsc::UnboundedSender<MediaUpdate>,
    generation: Generation,
) {
    debug!(%generation, "index worker started");
    let mut posted = 0u64;

    while let Some(path) = scope.next_item(generation) {
        let Some(media) = probe.probe(&path) else {
            continue;
        };
        if !scope.is_live(generation) {
            trace!(path = %path.display(), %generation, "dropping stale probe result");
            continue;
        }
        let update = MediaUpdate {
            path,
            media,
            generation,
        };
        if updates.send(update).is_err() {
            scope.release(generation);
            break;
        }
        posted += 1;
    }

    debug!(%generation, posted, "index worker finished");
}
