//! Batch scheduler
//!
//! Runs one transfer task per chunk with at most `K` requests in flight.
//!
//! Only pending chunks are split, in index order, into batches of `K`.
//! Chunks the server already holds never occupy a batch slot; they are
//! counted as skipped up front. A batch's tasks run concurrently and the
//! scheduler waits for all of them to settle before it starts the next batch. If any task in a batch fails, the batch
//! still drains, no later batch starts, and the lowest failed index is
//! reported. Nothing is retried here; re-running the upload resumes from the
//! server's confirmed set.
//!
//! Cancellation is checked before every batch. A cancel raised while a batch
//! is in flight drops its outstanding requests.

use super::progress::ProgressCounter;
use super::source::ChunkSource;
use super::{ResumePlan, UploadError, UploadSession};
use crate::chunker::Chunk;
use crate::client::{TransportError, UploadTransport};
use crate::metrics;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;

/// Default number of concurrent chunk transfers
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Work for one chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferTask {
    /// Server already has it; resolves immediately
    Skipped(Chunk),
    /// Must be sent
    Pending(Chunk),
}

impl TransferTask {
    pub fn chunk(&self) -> &Chunk {
        match self {
            TransferTask::Skipped(chunk) | TransferTask::Pending(chunk) => chunk,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, TransferTask::Pending(_))
    }
}

/// What a scheduler run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleSummary {
    /// Number of tasks in each batch, in execution order
    pub batch_sizes: Vec<usize>,
    /// Chunks sent and acknowledged
    pub transferred: u32,
    /// Chunks skipped because the server already had them
    pub skipped: u32,
}

/// Bounded-concurrency batch executor
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    batch_size: usize,
}

impl Default for BatchScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl BatchScheduler {
    /// Create a scheduler running up to `batch_size` transfers at once.
    ///
    /// A `batch_size` of 0 is treated as 1.
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// One task per chunk, pending unless the plan marks it confirmed
    pub fn tasks(chunks: &[Chunk], plan: &ResumePlan) -> Vec<TransferTask> {
        chunks
            .iter()
            .map(|chunk| {
                if plan.confirmed.contains(&chunk.index) {
                    TransferTask::Skipped(chunk.clone())
                } else {
                    TransferTask::Pending(chunk.clone())
                }
            })
            .collect()
    }

    /// Execute `tasks` for `session`
    #[tracing::instrument(
        name = "upload.transfer",
        skip_all,
        fields(
            upload.file_id = %session.file_id(),
            upload.total_chunks = session.total_chunks(),
            upload.batch_size = self.batch_size
        ),
        err
    )]
    pub async fn run<T, S>(
        &self,
        session: &UploadSession,
        tasks: Vec<TransferTask>,
        transport: &T,
        source: &S,
        progress: &ProgressCounter,
        cancel: &CancellationToken,
    ) -> Result<ScheduleSummary, UploadError>
    where
        T: UploadTransport + ?Sized,
        S: ChunkSource + ?Sized,
    {
        let mut summary = ScheduleSummary::default();

        let mut pending = Vec::with_capacity(tasks.len());
        for task in tasks {
            match task {
                TransferTask::Skipped(_) => summary.skipped += 1,
                TransferTask::Pending(chunk) => pending.push(chunk),
            }
        }
        metrics::record_chunks_skipped(summary.skipped);

        for (batch_number, batch) in pending.chunks(self.batch_size).enumerate() {
            if cancel.is_cancelled() {
                tracing::warn!(batch = batch_number + 1, "Upload cancelled before batch");
                return Err(UploadError::Cancelled);
            }

            tracing::debug!(
                batch = batch_number + 1,
                first_chunk = batch[0].index,
                size = batch.len(),
                "Starting batch"
            );
            summary.batch_sizes.push(batch.len());
            metrics::record_batch(batch.len());

            let transfers = batch
                .iter()
                .map(|chunk| Self::transfer(session, chunk, transport, source, progress));

            let results = tokio::select! {
                results = join_all(transfers) => results,
                _ = cancel.cancelled() => {
                    tracing::warn!(batch = batch_number + 1, "Upload cancelled during batch");
                    return Err(UploadError::Cancelled);
                }
            };

            let mut failure: Option<(u32, TransportError)> = None;
            for (chunk, result) in batch.iter().zip(results) {
                match result {
                    Ok(()) => summary.transferred += 1,
                    Err(e) => {
                        tracing::error!(chunk = chunk.index, error = %e, "Chunk transfer failed");
                        if failure.is_none() {
                            failure = Some((chunk.index, e));
                        }
                    }
                }
            }

            if let Some((index, source)) = failure {
                return Err(UploadError::ChunkTransfer { index, source });
            }
        }

        Ok(summary)
    }

    /// Read one chunk's bytes, send them, and count the confirmation
    async fn transfer<T, S>(
        session: &UploadSession,
        chunk: &Chunk,
        transport: &T,
        source: &S,
        progress: &ProgressCounter,
    ) -> Result<(), TransportError>
    where
        T: UploadTransport + ?Sized,
        S: ChunkSource + ?Sized,
    {
        let body = source.read_range(chunk.range.clone()).await?;
        let bytes = body.len() as u64;

        transport
            .send_chunk(
                session.file_id(),
                chunk.index,
                session.total_chunks(),
                body,
            )
            .await?;

        metrics::record_chunk_sent(bytes);
        let snapshot = progress.increment();
        tracing::debug!(
            chunk = chunk.index,
            confirmed = snapshot.confirmed,
            total = snapshot.total,
            "Chunk confirmed"
        );

        Ok(())
    }
}
