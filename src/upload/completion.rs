//! Completion coordinator
//!
//! Issues the single assembly request once every chunk is confirmed. An
//! assembly failure is its own error class: the bytes are all on the server,
//! so only this step needs repeating.

use super::progress::ProgressCounter;
use super::{UploadError, UploadSession};
use crate::client::{CompletionReceipt, UploadTransport};
use std::sync::Arc;

pub struct CompletionCoordinator<T: UploadTransport + ?Sized> {
    transport: Arc<T>,
}

impl<T: UploadTransport + ?Sized> CompletionCoordinator<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }

    /// Ask the server to assemble `session`, then report full progress
    #[tracing::instrument(
        name = "upload.complete",
        skip(self, session, progress),
        fields(
            upload.file_id = %session.file_id(),
            upload.file_name = %session.file_name(),
            upload.total_chunks = session.total_chunks()
        ),
        err
    )]
    pub async fn complete(
        &self,
        session: &UploadSession,
        progress: &ProgressCounter,
    ) -> Result<CompletionReceipt, UploadError> {
        let receipt = self
            .transport
            .complete(
                session.file_id(),
                session.file_name(),
                session.total_chunks(),
            )
            .await
            .map_err(UploadError::Assembly)?;

        progress.finish();

        tracing::info!(path = ?receipt.path, "File assembled");
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MockUploadTransport, TransportError};
    use crate::upload::{ProgressCallback, UploadProgress};
    use parking_lot::Mutex;

    #[tokio::test]
    async fn test_complete_sends_session_fields() {
        let mut transport = MockUploadTransport::new();
        transport
            .expect_complete()
            .withf(|id, name, total| id == "abc" && name == "movie.mkv" && *total == 4)
            .times(1)
            .returning(|_, _, _| {
                Ok(CompletionReceipt {
                    message: Some("File merged successfully".into()),
                    path: Some("uploads/completed/movie.mkv".into()),
                })
            });

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: ProgressCallback = Arc::new(move |p: UploadProgress| sink.lock().push(p));

        let session = UploadSession::new("abc", "movie.mkv", 16, 4).unwrap();
        let progress = ProgressCounter::new(4, 4, Some(callback));

        let receipt = CompletionCoordinator::new(Arc::new(transport))
            .complete(&session, &progress)
            .await
            .unwrap();

        assert_eq!(receipt.path.as_deref(), Some("uploads/completed/movie.mkv"));
        assert_eq!(
            *seen.lock(),
            vec![UploadProgress {
                confirmed: 4,
                total: 4
            }]
        );
    }

    #[tokio::test]
    async fn test_complete_failure_is_assembly_error() {
        let mut transport = MockUploadTransport::new();
        transport.expect_complete().times(1).returning(|_, _, _| {
            Err(TransportError::Status {
                status: 400,
                body: "Not all chunks have been uploaded".into(),
            })
        });

        let session = UploadSession::new("abc", "movie.mkv", 16, 4).unwrap();
        let progress = ProgressCounter::new(4, 4, None);

        let result = CompletionCoordinator::new(Arc::new(transport))
            .complete(&session, &progress)
            .await;

        match result {
            Err(UploadError::Assembly(source)) => assert_eq!(source.status(), Some(400)),
            other => panic!("Expected Assembly error, got {:?}", other),
        }
    }
}
