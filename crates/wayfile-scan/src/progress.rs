//! Search progress reporting.

use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Progress information handed to the search checkpoint.
#[derive(Debug, Clone)]
pub struct SearchProgress {
    /// Directories entered so far.
    pub dirs_visited: u64,
    /// Files whose names were tested.
    pub files_seen: u64,
    /// Files that matched every term.
    pub matches: u64,
    /// Directory being entered.
    pub current_dir: PathBuf,
    /// Time elapsed since the search started.
    pub elapsed: Duration,
}

impl SearchProgress {
    /// Create initial progress state.
    pub fn new() -> Self {
        Self {
            dirs_visited: 0,
            files_seen: 0,
            matches: 0,
            current_dir: PathBuf::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// Files tested per second.
    pub fn files_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.files_seen as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

impl Default for SearchProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// What the caller wants after a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    /// Keep walking.
    Continue,
    /// Stop and return what was collected so far.
    Stop,
}

/// Internal progress tracker with timing.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    start_time: Instant,
    progress: SearchProgress,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            progress: SearchProgress::new(),
        }
    }

    pub fn enter_dir(&mut self, dir: PathBuf) {
        self.progress.dirs_visited += 1;
        self.progress.current_dir = dir;
    }

    pub fn record_file(&mut self, matched: bool) {
        self.progress.files_seen += 1;
        if matched {
            self.progress.matches += 1;
        }
    }

    pub fn snapshot(&mut self) -> &SearchProgress {
        self.progress.elapsed = self.start_time.elapsed();
        &self.progress
    }

    pub fn finish(mut self) -> SearchProgress {
        self.progress.elapsed = self.start_time.elapsed();
        self.progress
    }
}
