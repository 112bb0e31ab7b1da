//! Resume planner
//!
//! Asks the server which chunks it already holds for a file id and works out
//! what is left to send. A failed status query aborts the upload: guessing
//! "send everything" would drift from server state.

use super::{UploadError, UploadSession};
use crate::client::UploadTransport;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Result of comparing server state against the session's chunk set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumePlan {
    /// Indices the server confirmed, restricted to `1..=total_chunks`
    pub confirmed: BTreeSet<u32>,
    /// Indices still to send, ascending
    pub pending: Vec<u32>,
}

impl ResumePlan {
    /// Compute the plan from a raw server report
    pub fn from_reported(total_chunks: u32, reported: impl IntoIterator<Item = u32>) -> Self {
        let confirmed: BTreeSet<u32> = reported
            .into_iter()
            .filter(|index| (1..=total_chunks).contains(index))
            .collect();
        let pending = (1..=total_chunks)
            .filter(|index| !confirmed.contains(index))
            .collect();

        Self { confirmed, pending }
    }

    /// Nothing left to send; go straight to completion
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn confirmed_count(&self) -> u32 {
        self.confirmed.len() as u32
    }
}

/// Queries upload status and builds a [`ResumePlan`]
pub struct ResumePlanner<T: UploadTransport + ?Sized> {
    transport: Arc<T>,
}

impl<T: UploadTransport + ?Sized> ResumePlanner<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }

    #[tracing::instrument(
        name = "upload.plan",
        skip(self, session),
        fields(
            upload.file_id = %session.file_id(),
            upload.total_chunks = session.total_chunks()
        ),
        err
    )]
    pub async fn plan(&self, session: &UploadSession) -> Result<ResumePlan, UploadError> {
        let reported = self
            .transport
            .uploaded_chunks(session.file_id())
            .await
            .map_err(UploadError::StatusRetrieval)?;

        let total = session.total_chunks();
        let out_of_range: Vec<u32> = reported
            .iter()
            .copied()
            .filter(|index| !(1..=total).contains(index))
            .collect();
        if !out_of_range.is_empty() {
            tracing::warn!(
                ignored = ?out_of_range,
                total_chunks = total,
                "Server reported chunk indices outside this session"
            );
        }

        let plan = ResumePlan::from_reported(total, reported);

        tracing::info!(
            confirmed = plan.confirmed_count(),
            pending = plan.pending.len(),
            "Resume plan ready"
        );

        Ok(plan)
    }
}
