//! wayfile - browse, search and safely copy, move and delete files.
//!
//! Usage:
//!   wf ls [PATH]                   List a folder (or all volumes)
//!   wf search TERM... [--and T]    Recursive multi-term name search
//!   wf index [PATH]                List a folder and probe its media files
//!   wf copy SRC... DEST            Copy into a folder
//!   wf move SRC... DEST            Move into a folder
//!   wf delete PATH...              Permanently delete
//!   wf rename PATH NAME            Rename in place
//!   wf clip copy|cut|show|clear    Shared clipboard
//!   wf paste [DEST]                Paste the clipboard into a folder

use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use wayfile_core::{Entry, EngineConfig, Generation, MediaInfo, SortKey};
use wayfile_index::{FfprobeProbe, IndexScope, IndexWorker};
use wayfile_ops::{
    rename_entry, start_delete, start_transfer, BatchReport, BatchStatus, ClipboardBridge,
    ClipboardPayload, DeleteRequest, FileMedium, OperationEngine, OperationResult, ProgressEvent,
    ProgressFlow, TransferMode, TransferRequest,
};
use wayfile_scan::{Checkpoint, DirectoryScanner, SearchEngine, SearchQuery, SearchScope};

#[derive(Parser)]
#[command(
    name = "wayfile",
    version,
    about = "Browse, search and safely copy, move and delete files",
    long_about = "wayfile lists folders with media details, searches names recursively \
                  with several terms, and runs cancellable copy, move and delete batches.\n\n\
                  Press Ctrl-C during a batch to stop it; finished items are kept."
)]
struct Cli {
    /// Engine configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Clipboard exchange file shared between invocations
    #[arg(long, global = true)]
    clipboard: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List a folder
    Ls {
        /// Folder to list (all volume roots when omitted)
        path: Option<PathBuf>,

        /// Sort key: name, type, size, modified, resolution or duration
        #[arg(short, long, default_value = "name", value_parser = SortKey::from_str)]
        sort: SortKey,

        /// Sort descending
        #[arg(short, long)]
        desc: bool,
    },

    /// Search file names below a folder
    Search {
        /// Terms that must all appear in the name
        #[arg(required = true)]
        terms: Vec<String>,

        /// Folder to search (all volumes when omitted)
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Narrow the results with more terms, one at a time
        #[arg(long = "and", value_name = "TERM")]
        and: Vec<String>,

        /// Only media files
        #[arg(short, long)]
        media: bool,
    },

    /// List a folder and fill in media resolution and duration
    Index {
        /// Folder to index
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Sort key: name, type, size, modified, resolution or duration
        #[arg(short, long, default_value = "name", value_parser = SortKey::from_str)]
        sort: SortKey,
    },

    /// Copy files and folders into a destination folder
    Copy {
        #[arg(required = true, num_args = 2..)]
        paths: Vec<PathBuf>,
    },

    /// Move files and folders into a destination folder
    Move {
        #[arg(required = true, num_args = 2..)]
        paths: Vec<PathBuf>,
    },

    /// Permanently delete files and folders
    Delete {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Rename a file or folder in place
    Rename { path: PathBuf, name: String },

    /// Work with the shared clipboard
    Clip {
        #[command(subcommand)]
        action: ClipAction,
    },

    /// Paste the clipboard into a folder
    Paste {
        #[arg(default_value = ".")]
        destination: PathBuf,
    },
}

#[derive(Subcommand)]
enum ClipAction {
    /// Put paths on the clipboard for copying
    Copy {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Put paths on the clipboard for moving
    Cut {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Show the clipboard
    Show,
    /// Empty the clipboard
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = load_config(cli.config.as_deref())?;
    let medium = cli
        .clipboard
        .clone()
        .map(FileMedium::new)
        .unwrap_or_else(FileMedium::default_location);
    let json = cli.json;

    match cli.command {
        Command::Ls { path, sort, desc } => run_ls(config, path, sort, !desc, json)?,
        Command::Search {
            terms,
            root,
            and,
            media,
        } => run_search(config, terms, root, and, media, json).await?,
        Command::Index { path, sort } => run_index(config, &path, sort, json).await?,
        Command::Copy { mut paths } => {
            let destination = split_destination(&mut paths)?;
            let request = TransferRequest::copy(paths, destination);
            run_transfer(config, request, json).await?;
        }
        Command::Move { mut paths } => {
            let destination = split_destination(&mut paths)?;
            let request = TransferRequest::move_to(paths, destination);
            run_transfer(config, request, json).await?;
        }
        Command::Delete { paths } => run_delete(config, paths, json).await?,
        Command::Rename { path, name } => {
            let renamed = rename_entry(&path, &name)
                .with_context(|| format!("Could not rename {}", path.display()))?;
            println!("{}", renamed.display());
        }
        Command::Clip { action } => run_clip(medium, action, json)?,
        Command::Paste { destination } => run_paste(config, medium, destination, json).await?,
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("WAYFILE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Load the engine config, running the file through the builder's checks.
fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Could not read config {}", path.display()))?;
    let raw: EngineConfig = serde_json::from_str(&text)
        .with_context(|| format!("Invalid config {}", path.display()))?;

    let config = EngineConfig::builder()
        .include_hidden(raw.include_hidden)
        .copy_chunk_size(raw.copy_chunk_size)
        .max_unique_suffix(raw.max_unique_suffix)
        .media_extensions(raw.media_extensions)
        .ffprobe_path(raw.ffprobe_path)
        .preserve_timestamps(raw.preserve_timestamps)
        .build()
        .with_context(|| format!("Invalid config {}", path.display()))?;
    debug!(path = %path.display(), "loaded config");
    Ok(config)
}

fn split_destination(paths: &mut Vec<PathBuf>) -> Result<PathBuf> {
    match paths.pop() {
        Some(destination) if !paths.is_empty() => Ok(destination),
        _ => bail!("Need at least one source and a destination folder"),
    }
}

/// List a folder, or every volume root.
fn run_ls(
    config: EngineConfig,
    path: Option<PathBuf>,
    sort: SortKey,
    ascending: bool,
    json: bool,
) -> Result<()> {
    let scanner = DirectoryScanner::new(config);
    let mut listing = match &path {
        Some(folder) => scanner
            .list(folder, Generation::default())
            .with_context(|| format!("Could not list {}", folder.display()))?,
        None => scanner.list_volumes(Generation::default()),
    };
    listing.sort_by(sort, ascending);

    if json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    print_entries(&listing.entries);
    println!();
    println!(
        " {} files, {} folders, {}",
        listing.stats.files,
        listing.stats.dirs,
        format_size(listing.stats.total_size)
    );
    if listing.has_warnings() {
        println!(" {} warning(s) while listing", listing.warnings.len());
    }
    Ok(())
}

/// Search, then narrow the results one extra term at a time.
async fn run_search(
    config: EngineConfig,
    terms: Vec<String>,
    root: Option<PathBuf>,
    and: Vec<String>,
    media: bool,
    json: bool,
) -> Result<()> {
    let scope = root.map_or(SearchScope::AllVolumes, SearchScope::Subtree);
    let query = SearchQuery::new(terms).media_only(media);
    let token = cancel_on_ctrl_c();

    let mut results = tokio::task::spawn_blocking(move || {
        SearchEngine::new(config).search_with(scope, query, Generation::default(), |progress| {
            if !json {
                eprint!(
                    "\r {} folders, {} files, {} matches",
                    progress.dirs_visited, progress.files_seen, progress.matches
                );
            }
            if token.is_cancelled() {
                Checkpoint::Stop
            } else {
                Checkpoint::Continue
            }
        })
    })
    .await
    .context("Search task failed")?;
    if !json {
        eprintln!();
    }

    for term in &and {
        let removed = results.narrow(term);
        info!(term = %term, removed, remaining = results.len(), "narrowed");
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&results.entries)?);
        return Ok(());
    }

    for entry in &results.entries {
        println!("{}  {:>10}", entry.path().display(), format_size(entry.size));
    }
    println!();
    println!(
        " {} matches for {:?} in {:.2}s{}",
        results.len(),
        results.query.terms(),
        results.progress.elapsed.as_secs_f64(),
        if results.stopped { " (stopped)" } else { "" }
    );
    Ok(())
}

/// List a folder, probe every media file without details and print the result.
async fn run_index(config: EngineConfig, path: &Path, sort: SortKey, json: bool) -> Result<()> {
    let scope = Arc::new(IndexScope::new());
    let generation = scope.advance();
    let mut listing = DirectoryScanner::new(config.clone())
        .list(path, generation)
        .with_context(|| format!("Could not list {}", path.display()))?;

    let probe = Arc::new(FfprobeProbe::from_config(&config));
    let (worker, mut updates) = IndexWorker::new(Arc::clone(&scope), probe, config);
    let queued = worker.queue_missing(&listing);
    info!(queued, folder = %path.display(), "indexing");

    // The channel closes once the worker is gone.
    tokio::task::spawn_blocking(move || {
        worker.wait();
        drop(worker);
    })
    .await
    .context("Index task failed")?;

    let mut drained = Vec::with_capacity(queued);
    while let Some(update) = updates.recv().await {
        drained.push(update);
    }
    let filled = listing.apply_media_batch(&drained, scope.generation());
    listing.sort_by(sort, true);

    if json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }
    print_entries(&listing.entries);
    println!();
    println!(" {filled} of {queued} media files indexed");
    Ok(())
}

async fn run_transfer(config: EngineConfig, request: TransferRequest, json: bool) -> Result<()> {
    let engine = Arc::new(OperationEngine::new(config));
    let token = cancel_on_ctrl_c();
    let rx = start_transfer(engine, request, token);
    finish_batch(rx, json).await
}

async fn run_delete(config: EngineConfig, paths: Vec<PathBuf>, json: bool) -> Result<()> {
    let engine = Arc::new(OperationEngine::new(config));
    let token = cancel_on_ctrl_c();
    let rx = start_delete(engine, DeleteRequest::new(paths), token);
    finish_batch(rx, json).await
}

/// Print progress until the batch reports completion.
async fn finish_batch(mut rx: mpsc::Receiver<OperationResult>, json: bool) -> Result<()> {
    let mut report = None;
    while let Some(message) = rx.recv().await {
        match message {
            OperationResult::Progress(event) => {
                if !json {
                    show_progress(&event);
                }
            }
            OperationResult::Complete(done) => report = Some(done),
        }
    }
    match report {
        Some(report) => print_report(&report, json),
        None => bail!("Batch ended without a report"),
    }
}

fn run_clip(medium: FileMedium, action: ClipAction, json: bool) -> Result<()> {
    let mut bridge = ClipboardBridge::new(medium);
    match action {
        ClipAction::Copy { paths } => publish(&mut bridge, TransferMode::Copy, paths)?,
        ClipAction::Cut { paths } => publish(&mut bridge, TransferMode::Move, paths)?,
        ClipAction::Show => match bridge.consume()? {
            Some(payload) if json => {
                let shown = serde_json::json!({
                    "mode": payload.mode(),
                    "paths": payload.paths(),
                });
                println!("{}", serde_json::to_string_pretty(&shown)?);
            }
            Some(payload) => {
                println!("{} ({} items)", payload.mode(), payload.paths().len());
                for path in payload.paths() {
                    println!("  {}", path.display());
                }
            }
            None if json => println!("null"),
            None => println!("Clipboard is empty"),
        },
        ClipAction::Clear => bridge.clear()?,
    }
    Ok(())
}

fn publish(
    bridge: &mut ClipboardBridge<FileMedium>,
    mode: TransferMode,
    paths: Vec<PathBuf>,
) -> Result<()> {
    let paths = paths
        .into_iter()
        .map(|p| std::path::absolute(&p).with_context(|| format!("Invalid path {}", p.display())))
        .collect::<Result<Vec<_>>>()?;
    let count = paths.len();
    bridge.publish(ClipboardPayload::new(mode, paths)?)?;
    eprintln!("{count} items ready to {mode}");
    Ok(())
}

async fn run_paste(
    config: EngineConfig,
    medium: FileMedium,
    destination: PathBuf,
    json: bool,
) -> Result<()> {
    let token = cancel_on_ctrl_c();
    let pasted = tokio::task::spawn_blocking(move || {
        let mut bridge = ClipboardBridge::new(medium);
        let source = bridge.resolve().map(|(source, _)| source);
        let engine = OperationEngine::new(config);
        let sink = |event: &ProgressEvent| {
            if !json {
                show_progress(event);
            }
            ProgressFlow::Continue
        };
        bridge
            .paste(&engine, destination, sink, &token)
            .map(|report| (source, report))
    })
    .await
    .context("Paste task failed")?;

    match pasted {
        Some((source, report)) => {
            debug!(?source, "pasted from clipboard");
            print_report(&report, json)
        }
        None => bail!("Clipboard is empty"),
    }
}

/// A token that fires on the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling...");
            trigger.cancel();
        }
    });
    token
}

fn show_progress(event: &ProgressEvent) {
    let mut err = std::io::stderr().lock();
    let _ = write!(err, "\r\x1b[2K {event}");
    if event.done && event.item_index + 1 == event.item_count {
        let _ = writeln!(err);
    }
    let _ = err.flush();
}

fn print_report(report: &BatchReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{}", report.summary());
        if report.bytes_copied > 0 {
            println!(" {} copied", format_size(report.bytes_copied));
        }
        if let Some(warning) = report.warning() {
            println!(" {warning}");
            for failure in &report.failures {
                println!("   {failure}");
            }
        }
    }
    if report.status == BatchStatus::Failed {
        bail!("{} of {} items failed", report.failures.len(), report.item_count);
    }
    Ok(())
}

fn print_entries(entries: &[Entry]) {
    for entry in entries {
        let marker = match (entry.is_dir(), entry.reparse) {
            (true, true) => "@",
            (true, false) => "/",
            _ => "",
        };
        let size = if entry.is_dir() {
            String::new()
        } else {
            format_size(entry.size)
        };
        println!(
            "{:<48} {:>10}  {}  {:>11} {:>8}",
            truncate(&format!("{}{}", entry.name(), marker), 48),
            size,
            format_time(entry.modified),
            format_resolution(entry.media()),
            format_duration(entry.media())
        );
    }
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

fn format_time(time: SystemTime) -> String {
    DateTime::<Local>::from(time)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

fn format_resolution(media: MediaInfo) -> String {
    if media.width == 0 || media.height == 0 {
        String::new()
    } else {
        format!("{}x{}", media.width, media.height)
    }
}

fn format_duration(media: MediaInfo) -> String {
    if media.duration == Duration::ZERO {
        return String::new();
    }
    let secs = media.duration.as_secs();
    let (h, m, s) = (secs / 3600, secs / 60 % 60, secs % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

/// Truncate a string to max length.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 1).collect();
        format!("{head}…")
    }
}
