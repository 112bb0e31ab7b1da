//! Chunked uploader
//!
//! Runs the whole flow for one file:
//!
//! ```text
//! derive id ─▶ partition ─▶ status query ─▶ batches of K ─▶ complete
//!                               │                              ▲
//!                               └──── nothing pending ─────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use chunked_uploadr::client::{HttpTransport, HttpTransportConfig};
//! use chunked_uploadr::upload::{ChunkedUploader, SelectedFile, UploadOptions};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = HttpTransport::new(HttpTransportConfig {
//!     base_url: "http://localhost:8080/upload".into(),
//!     timeout: None,
//! })?;
//!
//! let uploader = ChunkedUploader::new(Arc::new(transport), UploadOptions::default())
//!     .on_progress(Arc::new(|p| println!("{}/{}", p.confirmed, p.total)));
//!
//! let file = SelectedFile::from_path("backup.tar").await?;
//! let report = uploader.upload(&file).await?;
//! println!("sent {} chunks, skipped {}", report.transferred, report.skipped);
//! # Ok(())
//! # }
//! ```

use super::completion::CompletionCoordinator;
use super::planner::ResumePlanner;
use super::progress::{ProgressCallback, ProgressCounter};
use super::scheduler::{BatchScheduler, ScheduleSummary, DEFAULT_BATCH_SIZE};
use super::source::SelectedFile;
use super::{UploadError, UploadReport, UploadSession};
use crate::chunker::DEFAULT_CHUNK_SIZE;
use crate::client::{CompletionReceipt, UploadTransport};
use crate::identity::{IdentityStrategy, NameIdentity};
use crate::metrics;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Tunables for one uploader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOptions {
    /// Bytes per chunk
    pub chunk_size: u64,
    /// Maximum concurrent chunk transfers (K)
    pub batch_size: usize,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Resumable chunked uploader
pub struct ChunkedUploader<T: UploadTransport + ?Sized> {
    transport: Arc<T>,
    options: UploadOptions,
    identity: Arc<dyn IdentityStrategy>,
    progress: Option<ProgressCallback>,
    cancel: CancellationToken,
}

impl<T: UploadTransport + ?Sized> ChunkedUploader<T> {
    /// Create an uploader using name-based identity
    pub fn new(transport: Arc<T>, options: UploadOptions) -> Self {
        Self {
            transport,
            options,
            identity: Arc::new(NameIdentity),
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Use a different identity strategy
    pub fn with_identity(mut self, identity: Arc<dyn IdentityStrategy>) -> Self {
        self.identity = identity;
        self
    }

    /// Register the progress callback
    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that aborts uploads run by this uploader
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    /// Build the session for `file` without touching the network
    pub async fn session_for(&self, file: &SelectedFile) -> Result<UploadSession, UploadError> {
        let file_id = self
            .identity
            .derive(file)
            .await
            .map_err(UploadError::Identity)?;
        UploadSession::new(file_id, file.name(), file.size(), self.options.chunk_size)
    }

    /// Upload `file`, resuming whatever the server already holds.
    ///
    /// Safe to call again after any failure except a selection error.
    #[tracing::instrument(
        name = "upload",
        skip_all,
        fields(
            upload.file_name = %file.name(),
            upload.bytes = file.size(),
            upload.identity = self.identity.name(),
            upload.file_id = tracing::field::Empty
        ),
        err
    )]
    pub async fn upload(&self, file: &SelectedFile) -> Result<UploadReport, UploadError> {
        let started = Instant::now();
        let result = self.run(file).await;

        match &result {
            Ok(report) => {
                metrics::record_upload_success(started.elapsed().as_secs_f64());
                tracing::info!(
                    transferred = report.transferred,
                    skipped = report.skipped,
                    batches = report.batch_sizes.len(),
                    "Upload complete"
                );
            }
            Err(e) => {
                metrics::record_upload_failure(e.category());
                tracing::error!(category = e.category(), error = %e, "Upload failed");
            }
        }

        result
    }

    async fn run(&self, file: &SelectedFile) -> Result<UploadReport, UploadError> {
        let session = self.session_for(file).await?;
        tracing::Span::current().record("upload.file_id", session.file_id());
        let chunks = session.chunks()?;

        if self.cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        let plan = ResumePlanner::new(Arc::clone(&self.transport))
            .plan(&session)
            .await?;

        let progress = ProgressCounter::new(
            plan.confirmed_count(),
            session.total_chunks(),
            self.progress.clone(),
        );
        progress.report();

        let summary = if plan.is_complete() {
            tracing::info!("All chunks already on server, skipping transfer");
            metrics::record_chunks_skipped(plan.confirmed_count());
            ScheduleSummary {
                skipped: plan.confirmed_count(),
                ..Default::default()
            }
        } else {
            let tasks = BatchScheduler::tasks(&chunks, &plan);
            BatchScheduler::new(self.options.batch_size)
                .run(
                    &session,
                    tasks,
                    self.transport.as_ref(),
                    file.source().as_ref(),
                    &progress,
                    &self.cancel,
                )
                .await?
        };

        if self.cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        let receipt = CompletionCoordinator::new(Arc::clone(&self.transport))
            .complete(&session, &progress)
            .await?;

        Ok(UploadReport {
            session,
            skipped: summary.skipped,
            transferred: summary.transferred,
            batch_sizes: summary.batch_sizes,
            receipt,
        })
    }

    /// Re-issue only the completion request for a session whose chunks
    /// are all on the server
    pub async fn complete(&self, session: &UploadSession) -> Result<CompletionReceipt, UploadError> {
        let total = session.total_chunks();
        let progress = ProgressCounter::new(total, total, self.progress.clone());

        let result = CompletionCoordinator::new(Arc::clone(&self.transport))
            .complete(session, &progress)
            .await;
        if let Err(e) = &result {
            metrics::record_upload_failure(e.category());
        }
        result
    }
}
