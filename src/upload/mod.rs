//! Upload module
//!
//! The resumable chunked upload core: resume planning, bounded batch
//! scheduling, completion, and the [`ChunkedUploader`] that strings them
//! together.
//!
//! # Failure classes
//!
//! | Error | When | Safe retry |
//! |-------|------|------------|
//! | [`UploadError::Selection`] | nothing usable was selected | fix input |
//! | [`UploadError::StatusRetrieval`] | resume status query failed | whole upload |
//! | [`UploadError::ChunkTransfer`] | a chunk was rejected or lost | whole upload (resumes) |
//! | [`UploadError::Assembly`] | completion failed after all chunks arrived | completion only |
//! | [`UploadError::Cancelled`] | the caller aborted | whole upload (resumes) |

use crate::chunker::{self, Chunk, ChunkError};
use crate::client::{CompletionReceipt, TransportError};
use thiserror::Error;

pub mod completion;
pub mod planner;
pub mod progress;
pub mod scheduler;
pub mod source;
pub mod uploader;

pub use completion::CompletionCoordinator;
pub use planner::{ResumePlan, ResumePlanner};
pub use progress::{ProgressCallback, ProgressCounter, UploadProgress};
pub use scheduler::{BatchScheduler, ScheduleSummary, TransferTask, DEFAULT_BATCH_SIZE};
pub use source::{select_file, ChunkSource, FileSource, MemorySource, SelectedFile};
pub use uploader::{ChunkedUploader, UploadOptions};

/// Upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("File selection error: {0}")]
    Selection(String),

    #[error("Invalid chunking: {0}")]
    InvalidChunking(#[from] ChunkError),

    #[error("Failed to derive upload identity: {0}")]
    Identity(#[source] std::io::Error),

    #[error("Failed to retrieve upload status: {0}")]
    StatusRetrieval(#[source] TransportError),

    #[error("Failed to transfer chunk {index}: {source}")]
    ChunkTransfer {
        index: u32,
        #[source]
        source: TransportError,
    },

    #[error("File assembly failed: {0}")]
    Assembly(#[source] TransportError),

    #[error("Upload cancelled")]
    Cancelled,
}

/// Which step a caller may safely re-run after a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryHint {
    /// Input must change before retrying
    None,
    /// Re-run the whole upload; confirmed chunks are skipped
    Upload,
    /// Only the completion request needs to be re-issued
    Completion,
}

impl UploadError {
    /// Short category label used for logs and metrics
    pub fn category(&self) -> &'static str {
        match self {
            UploadError::Selection(_)
            | UploadError::InvalidChunking(_)
            | UploadError::Identity(_) => "selection",
            UploadError::StatusRetrieval(_) => "status_retrieval",
            UploadError::ChunkTransfer { .. } => "chunk_transfer",
            UploadError::Assembly(_) => "assembly",
            UploadError::Cancelled => "cancelled",
        }
    }

    /// Which retry is safe after this error
    pub fn retry_hint(&self) -> RetryHint {
        match self {
            UploadError::Selection(_)
            | UploadError::InvalidChunking(_)
            | UploadError::Identity(_) => RetryHint::None,
            UploadError::StatusRetrieval(_)
            | UploadError::ChunkTransfer { .. }
            | UploadError::Cancelled => RetryHint::Upload,
            UploadError::Assembly(_) => RetryHint::Completion,
        }
    }
}

/// An upload session: one file, one identity, one fixed partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    file_id: String,
    file_name: String,
    total_size: u64,
    chunk_size: u64,
    total_chunks: u32,
}

impl UploadSession {
    /// Create a session, computing the chunk count
    pub fn new(
        file_id: impl Into<String>,
        file_name: impl Into<String>,
        total_size: u64,
        chunk_size: u64,
    ) -> Result<Self, UploadError> {
        let total_chunks = chunker::chunk_count(total_size, chunk_size)?;
        Ok(Self {
            file_id: file_id.into(),
            file_name: file_name.into(),
            total_size,
            chunk_size,
            total_chunks,
        })
    }

    /// Rebuild a session for an assembly-only retry, where only the id,
    /// name and chunk count are known
    pub fn for_completion(
        file_id: impl Into<String>,
        file_name: impl Into<String>,
        total_chunks: u32,
    ) -> Self {
        Self {
            file_id: file_id.into(),
            file_name: file_name.into(),
            total_size: 0,
            chunk_size: 0,
            total_chunks,
        }
    }

    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn total_chunks(&self) -> u32 {
        self.total_chunks
    }

    /// The session's chunks, in index order
    pub fn chunks(&self) -> Result<Vec<Chunk>, UploadError> {
        Ok(chunker::partition(self.total_size, self.chunk_size)?)
    }
}

/// Successful upload outcome
#[derive(Debug, Clone)]
pub struct UploadReport {
    pub session: UploadSession,
    /// Chunks the server already had
    pub skipped: u32,
    /// Chunks sent during this run
    pub transferred: u32,
    /// Size of every batch that ran, in order
    pub batch_sizes: Vec<usize>,
    pub receipt: CompletionReceipt,
}
