//! Generation counter and metadata work queue.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use strum::Display;
use tracing::debug;

use wayfile_core::Generation;

/// Lifecycle of the indexer for the live generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum IndexState {
    /// No worker is running.
    Idle,
    /// A worker for the live generation has queued paths left.
    Running,
    /// The queue is empty and the last probe is finishing.
    Draining,
    /// Only a worker of an older generation is still winding down.
    Superseded,
}

#[derive(Debug, Default)]
struct Queue {
    items: Vec<PathBuf>,
    active: Option<Generation>,
}

/// Owns the live generation and the pending metadata work.
///
/// Every queue operation happens under one mutex and is short. Bumping the
/// generation clears the queue in the same critical section, so a worker
/// can never pop an item that was queued for an older view.
#[derive(Debug, Default)]
pub struct IndexScope {
    generation: AtomicU64,
    queue: Mutex<Queue>,
}

impl IndexScope {
    /// Create a scope starting at generation 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// The live generation.
    pub fn generation(&self) -> Generation {
        Generation(self.generation.load(Ordering::Acquire))
    }

    /// Whether `generation` is still the live one.
    pub fn is_live(&self, generation: Generation) -> bool {
        self.generation() == generation
    }

    /// Move to a new view: bump the generation and drop all queued work.
    pub fn advance(&self) -> Generation {
        let mut queue = self.lock();
        let dropped = queue.items.len();
        queue.items.clear();
        let next = Generation(self.generation.fetch_add(1, Ordering::AcqRel).wrapping_add(1));
        debug!(%next, dropped, "index scope advanced");
        next
    }

    /// Number of queued paths.
    pub fn pending(&self) -> usize {
        self.lock().items.len()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> IndexState {
        let live = self.generation();
        let queue = self.lock();
        match queue.active {
            None => IndexState::Idle,
            Some(g) if g != live => IndexState::Superseded,
            Some(_) if queue.items.is_empty() => IndexState::Draining,
            Some(_) => IndexState::Running,
        }
    }

    /// Queue paths for the live generation.
    ///
    /// Returns the generation a new worker must be started for, or `None`
    /// when one is already running for it (or nothing was queued).
    pub(crate) fn push(&self, paths: Vec<PathBuf>) -> Option<Generation> {
        if paths.is_empty() {
            return None;
        }
        let mut queue = self.lock();
        let live = self.generation();
        queue.items.extend(paths);
        if queue.active == Some(live) {
            return None;
        }
        queue.active = Some(live);
        Some(live)
    }

    /// Take the most recently queued path for a worker of `generation`.
    ///
    /// When the queue is empty or the generation is stale the worker's
    /// claim is released in the same critical section and `None` is
    /// returned; the worker must then exit.
    pub(crate) fn next_item(&self, generation: Generation) -> Option<PathBuf> {
        let mut queue = self.lock();
        if self.is_live(generation) {
            if let Some(path) = queue.items.pop() {
                return Some(path);
            }
        }
        if queue.active == Some(generation) {
            queue.active = None;
        }
        None
    }

    /// Give up the worker claim of `generation` without draining.
    pub(crate) fn release(&self, generation: Generation) {
        let mut queue = self.lock();
        if queue.active == Some(generation) {
            queue.active = None;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_push_claims_once_per_generation() {
        let scope = IndexScope::new();
        assert_eq!(scope.push(paths(&["a"])), Some(Generation(0)));
        assert_eq!(scope.push(paths(&["b"])), None);
        assert_eq!(scope.push(Vec::new()), None);
        assert_eq!(scope.pending(), 2);
        assert_eq!(scope.state(), IndexState::Running);
    }

    #[test]
    fn test_items_pop_lifo() {
        let scope = IndexScope::new();
        let generation = scope.push(paths(&["a", "b", "c"])).unwrap();
        assert_eq!(scope.next_item(generation), Some(PathBuf::from("c")));
        assert_eq!(scope.next_item(generation), Some(PathBuf::from("b")));
        assert_eq!(scope.state(), IndexState::Running);
        assert_eq!(scope.next_item(generation), Some(PathBuf::from("a")));
        assert_eq!(scope.state(), IndexState::Draining);
        assert_eq!(scope.next_item(generation), None);
        assert_eq!(scope.state(), IndexState::Idle);
    }

    #[test]
    fn test_advance_clears_queue_and_supersedes() {
        let scope = IndexScope::new();
        let old = scope.push(paths(&["a", "b"])).unwrap();
        let new = scope.advance();
        assert_eq!(new, Generation(1));
        assert_eq!(scope.pending(), 0);
        assert_eq!(scope.state(), IndexState::Superseded);

        // The old worker gets nothing and gives up its claim.
        assert_eq!(scope.next_item(old), None);
        assert_eq!(scope.state(), IndexState::Idle);
    }

    #[test]
    fn test_new_generation_claims_while_old_winds_down() {
        let scope = IndexScope::new();
        let old = scope.push(paths(&["a"])).unwrap();
        scope.advance();
        let new = scope.push(paths(&["b"])).unwrap();
        assert_ne!(old, new);

        // Releasing the old claim must not clear the new one.
        scope.release(old);
        assert_eq!(scope.state(), IndexState::Running);
        assert_eq!(scope.next_item(old), None);
        assert_eq!(scope.next_item(new), Some(PathBuf::from("b")));
    }
}
