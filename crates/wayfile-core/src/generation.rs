//! Generation tags for background results.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::entry::MediaInfo;

/// Epoch identifying the scope (folder or search view) currently shown.
///
/// Background results carry the generation that requested them and are
/// dropped once the live generation has moved on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Generation(pub u64);

impl Generation {
    /// Create a generation from a raw counter value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// The generation following this one.
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gen#{}", self.0)
    }
}

/// Media properties computed in the background for one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaUpdate {
    /// Path the probe ran on.
    pub path: PathBuf,
    /// Probe result (unknown when the probe failed).
    pub media: MediaInfo,
    /// Generation that queued the path.
    pub generation: Generation,
}

impl MediaUpdate {
    /// Whether this update still belongs to the live scope.
    pub fn is_current(&self, live: Generation) -> bool {
        self.generation == live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_ordering() {
        let g = Generation::new(7);
        assert!(g.next() > g);
        assert_eq!(g.next(), Generation(8));
    }

    #[test]
    fn test_update_currency() {
        let update = MediaUpdate {
            path: PathBuf::from("/a.mp4"),
            media: MediaInfo::UNKNOWN,
            generation: Generation(3),
        };
        assert!(update.is_current(Generation(3)));
        assert!(!update.is_current(Generation(4)));
    }
}
