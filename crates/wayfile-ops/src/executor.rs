//! Channel-based front end that runs batches on the blocking pool.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::engine::OperationEngine;
use crate::operation::{DeleteRequest, TransferRequest};
use crate::progress::{BatchReport, ProgressEvent, ProgressFlow};
use crate::OPERATION_CHANNEL_SIZE;

/// Messages delivered while a batch runs.
#[derive(Debug, Clone)]
pub enum OperationResult {
    /// Progress update.
    Progress(ProgressEvent),
    /// The batch finished; always the last message.
    Complete(BatchReport),
}

/// Start a copy or move batch. Must be called from within a tokio runtime.
///
/// Dropping the receiver stops the batch at its next checkpoint.
pub fn start_transfer(
    engine: Arc<OperationEngine>,
    request: TransferRequest,
    token: CancellationToken,
) -> mpsc::Receiver<OperationResult> {
    spawn_batch(move |tx| engine.execute(request, forward(tx), &token))
}

/// Start a delete batch. Must be called from within a tokio runtime.
pub fn start_delete(
    engine: Arc<OperationEngine>,
    request: DeleteRequest,
    token: CancellationToken,
) -> mpsc::Receiver<OperationResult> {
    spawn_batch(move |tx| engine.delete(request, forward(tx), &token))
}

fn spawn_batch<F>(run: F) -> mpsc::Receiver<OperationResult>
where
    F: FnOnce(&mpsc::Sender<OperationResult>) -> BatchReport + Send + 'static,
{
    let (tx, rx) = mpsc::channel(OPERATION_CHANNEL_SIZE);

    tokio::task::spawn_blocking(move || {
        let report = run(&tx);
        let _ = tx.blocking_send(OperationResult::Complete(report));
    });

    rx
}

fn forward(
    tx: &mpsc::Sender<OperationResult>,
) -> impl FnMut(&ProgressEvent) -> ProgressFlow + '_ {
    move |event: &ProgressEvent| match tx.blocking_send(OperationResult::Progress(event.clone())) {
        Ok(()) => ProgressFlow::Continue,
        Err(_) => ProgressFlow::Abort,
    }
}
