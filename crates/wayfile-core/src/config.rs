//! Engine configuration types.

use std::path::PathBuf;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Extensions (lowercase, without the dot) treated as media files.
pub const DEFAULT_MEDIA_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "mov", "avi", "wmv", "m4v", "ts", "m2ts", "webm", "flv", "rm",
];

/// Configuration shared by the scanner, indexer and operation engine.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct EngineConfig {
    /// Include hidden entries (names starting with `.`) in listings and searches.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub include_hidden: bool,

    /// Bytes copied between progress callbacks and cancellation checks.
    #[builder(default = "DEFAULT_CHUNK_SIZE")]
    #[serde(default = "default_chunk_size")]
    pub copy_chunk_size: usize,

    /// Highest `(n)` suffix tried when resolving a free destination name.
    #[builder(default = "DEFAULT_MAX_UNIQUE_SUFFIX")]
    #[serde(default = "default_max_unique_suffix")]
    pub max_unique_suffix: u32,

    /// Extensions considered media (lowercase, no dot).
    #[builder(default = "default_media_extensions()")]
    #[serde(default = "default_media_extensions")]
    pub media_extensions: Vec<String>,

    /// Location of the `ffprobe` executable.
    #[builder(default = "PathBuf::from(\"ffprobe\")")]
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// Carry modification times over to copied files.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub preserve_timestamps: bool,
}

const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;
const DEFAULT_MAX_UNIQUE_SUFFIX: u32 = 9999;

fn default_true() -> bool {
    true
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_max_unique_suffix() -> u32 {
    DEFAULT_MAX_UNIQUE_SUFFIX
}

fn default_media_extensions() -> Vec<String> {
    DEFAULT_MEDIA_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

impl EngineConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.copy_chunk_size == Some(0) {
            return Err("Copy chunk size must be greater than zero".to_string());
        }
        if self.max_unique_suffix == Some(0) {
            return Err("Unique name bound must be greater than zero".to_string());
        }
        if let Some(ref exts) = self.media_extensions {
            if exts.is_empty() {
                return Err("At least one media extension is required".to_string());
            }
            if exts.iter().any(|e| e.is_empty() || e.starts_with('.')) {
                return Err("Media extensions must be non-empty and given without a dot".to_string());
            }
        }
        Ok(())
    }
}

impl EngineConfig {
    /// Create a new config builder.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Check whether a path has one of the configured media extensions.
    pub fn is_media_path(&self, path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                self.media_extensions
                    .iter()
                    .any(|m| m.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    /// Check if a name should be skipped because it is hidden.
    pub fn should_skip_hidden(&self, name: &str) -> bool {
        !self.include_hidden && name.starts_with('.')
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            include_hidden: true,
            copy_chunk_size: DEFAULT_CHUNK_SIZE,
            max_unique_suffix: DEFAULT_MAX_UNIQUE_SUFFIX,
            media_extensions: default_media_extensions(),
            ffprobe_path: default_ffprobe_path(),
            preserve_timestamps: true,
        }
    }
}
