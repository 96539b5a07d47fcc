//! Media metadata probes.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use wayfile_core::{EngineConfig, MediaInfo};

/// Computes media properties for one file. May be slow; may fail.
pub trait MetadataProbe: Send + Sync {
    /// Probe `path`. `None` leaves the entry's media unknown.
    fn probe(&self, path: &Path) -> Option<MediaInfo>;
}

impl<F> MetadataProbe for F
where
    F: Fn(&Path) -> Option<MediaInfo> + Send + Sync,
{
    fn probe(&self, path: &Path) -> Option<MediaInfo> {
        self(path)
    }
}

/// Probe that never knows anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProbe;

impl MetadataProbe for NullProbe {
    fn probe(&self, _path: &Path) -> Option<MediaInfo> {
        None
    }
}

/// Reasons an `ffprobe` run produced no usable metadata.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ffprobe exited with {status}")]
    Exit { status: std::process::ExitStatus },

    #[error("unreadable ffprobe output: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no video stream or duration reported")]
    NoMedia,
}

/// Probe backed by the `ffprobe` executable.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    program: PathBuf,
}

impl FfprobeProbe {
    /// Use the given `ffprobe` executable.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Use the executable named in the engine configuration.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.ffprobe_path.clone())
    }

    /// Run `ffprobe` on `path` and parse its JSON report.
    pub fn run(&self, path: &Path) -> Result<MediaInfo, ProbeError> {
        let output = Command::new(&self.program)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height:format=duration",
                "-of",
                "json",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(|source| ProbeError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ProbeError::Exit {
                status: output.status,
            });
        }
        parse_ffprobe_json(&output.stdout)
    }
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl MetadataProbe for FfprobeProbe {
    fn probe(&self, path: &Path) -> Option<MediaInfo> {
        match self.run(path) {
            Ok(media) => Some(media),
            Err(err) => {
                debug!(path = %path.display(), error = %err, "media probe failed");
                None
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProbeReport {
    #[serde(default)]
    streams: Vec<StreamReport>,
    format: Option<FormatReport>,
}

#[derive(Debug, Deserialize)]
struct StreamReport {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct FormatReport {
    // ffprobe prints the duration as a decimal string.
    duration: Option<String>,
}

/// Parse the JSON printed by `ffprobe -of json`.
pub fn parse_ffprobe_json(bytes: &[u8]) -> Result<MediaInfo, ProbeError> {
    let report: ProbeReport = serde_json::from_slice(bytes)?;

    let (width, height) = report
        .streams
        .first()
        .map(|s| (s.width.unwrap_or(0), s.height.unwrap_or(0)))
        .unwrap_or((0, 0));

    let duration = report
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
        .unwrap_or(Duration::ZERO);

    let media = MediaInfo::new(width, height, duration);
    if media.is_unknown() {
        return Err(ProbeError::NoMedia);
    }
    Ok(media)
}
