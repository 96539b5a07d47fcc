//! Batch behavior against real temporary folders.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use wayfile_ops::{
    start_delete, start_transfer, BatchStatus, CancellationToken, ClipSource, ClipboardBridge,
    ClipboardPayload, DeleteRequest, EngineConfig, ExchangeMedium, FailureKind, FileMedium,
    FsError, IgnoreProgress, MemoryMedium, OperationEngine, OperationResult, ProgressEvent,
    ProgressFlow, Removal, TransferMode, TransferRequest,
};

struct Fixture {
    _temp: TempDir,
    src: PathBuf,
    dst: PathBuf,
}

fn fixture() -> Fixture {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src");
    let dst = temp.path().join("dst");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir_all(&dst).unwrap();
    Fixture {
        _temp: temp,
        src,
        dst,
    }
}

fn write(path: &Path, content: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn chunked(chunk: usize) -> OperationEngine {
    OperationEngine::new(EngineConfig::builder().copy_chunk_size(chunk).build().unwrap())
}

fn never_same_volume(_: &Path, _: &Path) -> bool {
    false
}

fn refuse_removal(path: &Path) -> Result<(Removal, u64), FsError> {
    Err(FsError::io(path, io::Error::from(io::ErrorKind::PermissionDenied)))
}

fn defer_removal(_: &Path) -> Result<(Removal, u64), FsError> {
    Ok((Removal::RebootPending, 1))
}

#[test]
fn test_paste_resolves_collisions() {
    let f = fixture();
    write(&f.src.join("a.txt"), b"new a");
    write(&f.src.join("b.txt"), b"b");
    write(&f.dst.join("a.txt"), b"old a");

    let mut bridge = ClipboardBridge::new(MemoryMedium::new());
    bridge
        .publish(
            ClipboardPayload::new(
                TransferMode::Copy,
                vec![f.src.join("a.txt"), f.src.join("b.txt")],
            )
            .unwrap(),
        )
        .unwrap();

    let engine = OperationEngine::default();
    let report = bridge
        .paste(&engine, &f.dst, IgnoreProgress, &CancellationToken::new())
        .unwrap();

    assert!(report.is_success());
    assert_eq!(
        report.created,
        vec![f.dst.join("a (1).txt"), f.dst.join("b.txt")]
    );
    assert_eq!(fs::read(f.dst.join("a.txt")).unwrap(), b"old a");
    assert_eq!(fs::read(f.dst.join("a (1).txt")).unwrap(), b"new a");
    assert!(bridge.internal().is_none());
}

#[test]
fn test_cancel_during_second_of_three() {
    let f = fixture();
    let names = ["one.bin", "two.bin", "three.bin"];
    for name in names {
        write(&f.src.join(name), &[1u8; 10]);
    }
    let sources: Vec<PathBuf> = names.iter().map(|n| f.src.join(n)).collect();

    let mut seen = Vec::new();
    let report = chunked(4).execute(
        TransferRequest::copy(sources.clone(), &f.dst),
        |event: &ProgressEvent| {
            seen.push(event.item_index);
            if event.item_index == 1 && event.bytes_done > 0 {
                ProgressFlow::Abort
            } else {
                ProgressFlow::Continue
            }
        },
        &CancellationToken::new(),
    );

    assert_eq!(report.status, BatchStatus::Cancelled);
    assert_eq!(report.succeeded, 1);
    assert!(report.warning().is_none());
    assert!(f.dst.join("one.bin").exists());
    assert!(!f.dst.join("two.bin").exists(), "partial copy left behind");
    assert!(!f.dst.join("three.bin").exists());
    assert!(!seen.contains(&2));
    assert!(sources.iter().all(|s| s.exists()));
}

#[test]
fn test_token_cancel_stops_remaining_items() {
    let f = fixture();
    write(&f.src.join("a.bin"), &[0u8; 8]);
    write(&f.src.join("b.bin"), &[0u8; 8]);

    let token = CancellationToken::new();
    let trigger = token.clone();
    let report = chunked(4).execute(
        TransferRequest::copy(vec![f.src.join("a.bin"), f.src.join("b.bin")], &f.dst),
        move |event: &ProgressEvent| {
            if event.done {
                trigger.cancel();
            }
            ProgressFlow::Continue
        },
        &token,
    );

    assert_eq!(report.status, BatchStatus::Cancelled);
    assert_eq!(report.created, vec![f.dst.join("a.bin")]);
    assert!(!f.dst.join("b.bin").exists());
}

#[test]
fn test_same_volume_move_only_renames() {
    let f = fixture();
    write(&f.src.join("clip.mp4"), &[9u8; 64]);
    write(&f.src.join("album/inner.jpg"), &[9u8; 64]);

    let engine = OperationEngine::default();
    let report = engine.execute(
        TransferRequest::move_to(vec![f.src.join("clip.mp4"), f.src.join("album")], &f.dst),
        IgnoreProgress,
        &CancellationToken::new(),
    );

    assert!(report.is_success());
    let counters = engine.counters();
    assert_eq!(counters.renames, 2);
    assert_eq!(counters.byte_copies, 0);
    assert_eq!(report.bytes_copied, 0);
    assert!(f.dst.join("album/inner.jpg").exists());
    assert!(!f.src.join("clip.mp4").exists());
}

#[test]
fn test_cross_volume_move_copies_then_removes() {
    let f = fixture();
    write(&f.src.join("album/a.jpg"), b"aaaa");
    write(&f.src.join("album/deeper/b.jpg"), b"bb");

    let engine = OperationEngine::default().with_volume_probe(never_same_volume);
    let report = engine.execute(
        TransferRequest::move_to(vec![f.src.join("album")], &f.dst),
        IgnoreProgress,
        &CancellationToken::new(),
    );

    assert!(report.is_success());
    assert_eq!(report.bytes_copied, 6);
    let counters = engine.counters();
    assert_eq!(counters.renames, 0);
    assert_eq!(counters.byte_copies, 2);
    assert_eq!(counters.removals, 4);
    assert!(!f.src.join("album").exists());
    assert_eq!(fs::read(f.dst.join("album/deeper/b.jpg")).unwrap(), b"bb");
}

#[test]
fn test_failed_cross_volume_copy_keeps_source() {
    let f = fixture();
    write(&f.src.join("album/a.jpg"), &[1u8; 32]);
    write(&f.src.join("album/b.jpg"), &[2u8; 32]);

    let engine = chunked(8).with_volume_probe(never_same_volume);
    let report = engine.execute(
        TransferRequest::move_to(vec![f.src.join("album")], &f.dst),
        |event: &ProgressEvent| {
            if event.bytes_done > 40 {
                ProgressFlow::Abort
            } else {
                ProgressFlow::Continue
            }
        },
        &CancellationToken::new(),
    );

    assert_eq!(report.status, BatchStatus::Cancelled);
    assert!(!f.dst.join("album").exists(), "partial tree left behind");
    assert_eq!(fs::read(f.src.join("album/a.jpg")).unwrap(), vec![1u8; 32]);
    assert_eq!(fs::read(f.src.join("album/b.jpg")).unwrap(), vec![2u8; 32]);
    assert_eq!(engine.counters().removals, 0);
}

#[test]
fn test_source_kept_when_removal_fails() {
    let f = fixture();
    write(&f.src.join("album/a.jpg"), b"aaaa");
    write(&f.src.join("album/deeper/b.jpg"), b"bb");

    let engine = OperationEngine::default()
        .with_volume_probe(never_same_volume)
        .with_remover(refuse_removal);
    let report = engine.execute(
        TransferRequest::move_to(vec![f.src.join("album")], &f.dst),
        IgnoreProgress,
        &CancellationToken::new(),
    );

    assert_eq!(report.status, BatchStatus::Failed);
    assert_eq!(report.succeeded, 0);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].kind, FailureKind::CrossVolumeDeleteFailed);
    assert_eq!(report.failures[0].path, f.src.join("album"));
    assert_eq!(fs::read(f.dst.join("album/deeper/b.jpg")).unwrap(), b"bb");
    assert_eq!(fs::read(f.src.join("album/deeper/b.jpg")).unwrap(), b"bb");
    assert_eq!(fs::read(f.src.join("album/a.jpg")).unwrap(), b"aaaa");
}

#[test]
fn test_removal_deferred_to_restart_is_a_failure() {
    let f = fixture();
    write(&f.src.join("locked.db"), b"data");
    write(&f.src.join("other.db"), b"data");

    let engine = OperationEngine::default()
        .with_volume_probe(never_same_volume)
        .with_remover(defer_removal);
    let report = engine.execute(
        TransferRequest::move_to(vec![f.src.join("locked.db")], &f.dst),
        IgnoreProgress,
        &CancellationToken::new(),
    );

    assert_eq!(report.status, BatchStatus::Failed);
    assert_eq!(report.succeeded, 0);
    assert_eq!(report.failures[0].kind, FailureKind::AccessDenied);
    assert_eq!(report.reboot_pending, vec![f.src.join("locked.db")]);
    assert_eq!(report.created, vec![f.dst.join("locked.db")]);
    assert!(report.warning().unwrap().contains("next restart"));

    let report = engine.delete(
        DeleteRequest::new(vec![f.src.join("other.db")]),
        IgnoreProgress,
        &CancellationToken::new(),
    );
    assert_eq!(report.status, BatchStatus::Failed);
    assert_eq!(report.succeeded, 0);
    assert_eq!(report.reboot_pending, vec![f.src.join("other.db")]);
}

#[test]
fn test_same_volume_move_skips_measuring() {
    let f = fixture();
    write(&f.src.join("album/a.jpg"), &[1u8; 100]);
    write(&f.src.join("album/b.jpg"), &[1u8; 100]);

    let mut totals = Vec::new();
    let report = OperationEngine::default().execute(
        TransferRequest::move_to(vec![f.src.join("album")], &f.dst),
        |event: &ProgressEvent| {
            totals.push(event.bytes_total);
            ProgressFlow::Continue
        },
        &CancellationToken::new(),
    );

    assert!(report.is_success());
    assert!(totals.iter().all(|&t| t == 0));

    let mut totals = Vec::new();
    OperationEngine::default()
        .with_volume_probe(never_same_volume)
        .execute(
            TransferRequest::move_to(vec![f.dst.join("album")], &f.src),
            |event: &ProgressEvent| {
                totals.push(event.bytes_total);
                ProgressFlow::Continue
            },
            &CancellationToken::new(),
        );
    assert_eq!(totals.first(), Some(&200));
}

#[cfg(unix)]
#[test]
fn test_folder_into_itself_through_link_is_refused() {
    let f = fixture();
    write(&f.src.join("folder/inner/x.txt"), b"x");
    std::os::unix::fs::symlink(f.src.join("folder"), f.dst.join("alias")).unwrap();

    let report = OperationEngine::default().execute(
        TransferRequest::copy(vec![f.src.join("folder")], f.dst.join("alias/inner")),
        IgnoreProgress,
        &CancellationToken::new(),
    );

    assert_eq!(report.status, BatchStatus::Failed);
    assert_eq!(report.failures[0].kind, FailureKind::InvalidDestination);
    assert!(!f.src.join("folder/inner/folder").exists());
}

#[cfg(unix)]
#[test]
fn test_moved_file_link_carries_its_bytes() {
    let f = fixture();
    write(&f.src.join("real.txt"), b"payload");
    std::os::unix::fs::symlink("real.txt", f.src.join("a.txt")).unwrap();

    let engine = OperationEngine::default().with_volume_probe(never_same_volume);
    let report = engine.execute(
        TransferRequest::move_to(vec![f.src.join("a.txt")], &f.dst),
        IgnoreProgress,
        &CancellationToken::new(),
    );

    assert!(report.is_success());
    assert_eq!(engine.counters().byte_copies, 1);
    let moved = f.dst.join("a.txt");
    assert!(fs::symlink_metadata(&moved).unwrap().is_file());
    assert_eq!(fs::read(&moved).unwrap(), b"payload");
    assert!(fs::symlink_metadata(f.src.join("a.txt")).is_err());
    assert_eq!(fs::read(f.src.join("real.txt")).unwrap(), b"payload");
}

#[test]
fn test_folder_into_own_subfolder_is_refused() {
    let f = fixture();
    write(&f.src.join("album/sub/x.jpg"), b"x");
    write(&f.src.join("loose.jpg"), b"y");

    let report = OperationEngine::default().execute(
        TransferRequest::move_to(
            vec![f.src.join("album"), f.src.join("loose.jpg")],
            f.src.join("album/sub"),
        ),
        IgnoreProgress,
        &CancellationToken::new(),
    );

    assert_eq!(report.status, BatchStatus::Failed);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].kind, FailureKind::InvalidDestination);
    assert!(f.src.join("album/sub/x.jpg").exists());
    assert!(f.src.join("album/sub/loose.jpg").exists());
}

#[cfg(unix)]
#[test]
fn test_delete_tree_leaves_link_target_alone() {
    let f = fixture();
    write(&f.dst.join("precious/keep.txt"), b"keep");
    write(&f.src.join("tree/a/file.txt"), b"x");
    std::os::unix::fs::symlink(f.dst.join("precious"), f.src.join("tree/a/linked")).unwrap();

    let report = OperationEngine::default().delete(
        DeleteRequest::new(vec![f.src.join("tree")]),
        IgnoreProgress,
        &CancellationToken::new(),
    );

    assert!(report.is_success());
    assert!(!f.src.join("tree").exists());
    assert_eq!(fs::read(f.dst.join("precious/keep.txt")).unwrap(), b"keep");
}

#[cfg(unix)]
#[test]
fn test_copied_tree_recreates_links() {
    let f = fixture();
    write(&f.dst.join("outside/big.bin"), &[0u8; 128]);
    write(&f.src.join("tree/small.txt"), b"s");
    std::os::unix::fs::symlink(f.dst.join("outside"), f.src.join("tree/link")).unwrap();

    let report = OperationEngine::default().execute(
        TransferRequest::copy(vec![f.src.join("tree")], &f.dst),
        IgnoreProgress,
        &CancellationToken::new(),
    );

    assert!(report.is_success());
    assert_eq!(report.bytes_copied, 1);
    let copied = f.dst.join("tree/link");
    assert!(fs::symlink_metadata(&copied).unwrap().file_type().is_symlink());
    assert_eq!(fs::read_link(&copied).unwrap(), f.dst.join("outside"));
}

#[test]
fn test_external_move_clears_medium() {
    let f = fixture();
    write(&f.src.join("a.mp4"), b"a");
    let exchange = f.dst.join("exchange");

    let mut writer = ClipboardBridge::new(FileMedium::new(&exchange));
    writer
        .publish(ClipboardPayload::new(TransferMode::Move, vec![f.src.join("a.mp4")]).unwrap())
        .unwrap();

    let target = f.dst.join("target");
    let mut reader = ClipboardBridge::new(FileMedium::new(&exchange));
    let (source, _) = reader.resolve().unwrap();
    assert_eq!(source, ClipSource::External);

    let report = reader
        .paste(
            &OperationEngine::default(),
            &target,
            IgnoreProgress,
            &CancellationToken::new(),
        )
        .unwrap();
    assert!(report.is_success());
    assert!(target.join("a.mp4").exists());
    assert!(!exchange.exists());

    let again = reader.paste(
        &OperationEngine::default(),
        &target,
        IgnoreProgress,
        &CancellationToken::new(),
    );
    assert!(again.is_none());
}

#[test]
fn test_external_copy_keeps_medium() {
    let f = fixture();
    write(&f.src.join("a.mp4"), b"a");
    let medium = MemoryMedium::new();
    let mut bridge = ClipboardBridge::new(medium.clone());
    bridge
        .publish(ClipboardPayload::new(TransferMode::Copy, vec![f.src.join("a.mp4")]).unwrap())
        .unwrap();

    bridge
        .paste(
            &OperationEngine::default(),
            &f.dst,
            IgnoreProgress,
            &CancellationToken::new(),
        )
        .unwrap();
    assert!(medium.read().unwrap().is_some());
    assert!(bridge.internal().is_none());
}

#[tokio::test]
async fn test_channel_delivers_progress_then_report() {
    let f = fixture();
    write(&f.src.join("a.bin"), &[1u8; 10]);
    write(&f.src.join("b.bin"), &[1u8; 10]);

    let engine = Arc::new(chunked(4));
    let mut rx = start_transfer(
        Arc::clone(&engine),
        TransferRequest::copy(vec![f.src.join("a.bin"), f.src.join("b.bin")], &f.dst),
        CancellationToken::new(),
    );

    let mut indices = Vec::new();
    let mut report = None;
    while let Some(message) = rx.recv().await {
        match message {
            OperationResult::Progress(event) => indices.push(event.item_index),
            OperationResult::Complete(done) => report = Some(done),
        }
    }

    let report = report.unwrap();
    assert!(report.is_success());
    assert_eq!(report.bytes_copied, 20);
    assert!(indices.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(indices.first(), Some(&0));
    assert_eq!(indices.last(), Some(&1));

    let mut rx = start_delete(
        engine,
        DeleteRequest::new(vec![f.dst.join("a.bin"), f.dst.join("b.bin")]),
        CancellationToken::new(),
    );
    let mut last = None;
    while let Some(message) = rx.recv().await {
        last = Some(message);
    }
    match last {
        Some(OperationResult::Complete(report)) => assert_eq!(report.succeeded, 2),
        other => panic!("expected completion, got {other:?}"),
    }
    assert!(!f.dst.join("a.bin").exists());
}
