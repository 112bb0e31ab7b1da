//! Upload transport
//!
//! Defines the [`UploadTransport`] seam the upload core talks through, and
//! [`HttpTransport`], its implementation of the chunked upload wire contract.
//!
//! # Wire contract
//!
//! | Operation | Request | Success |
//! |-----------|---------|---------|
//! | Status | `GET {base}/status` + `X-File-Id` | `{"uploaded": [1, 3]}` |
//! | Chunk | `POST {base}/check` multipart `file` + `X-File-Id`, `X-Chunk-Number`, `X-Total-Chunks` | any 2xx |
//! | Complete | `POST {base}/complete` + `X-File-Id`, `X-File-Name`, `X-Total-Chunks` | any 2xx |
//!
//! # Example
//!
//! ```no_run
//! use chunked_uploadr::client::{HttpTransport, HttpTransportConfig, UploadTransport};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = HttpTransport::new(HttpTransportConfig {
//!     base_url: "http://localhost:8080/upload".to_string(),
//!     timeout: None,
//! })?;
//!
//! let uploaded = transport.uploaded_chunks("5d41402abc4b2a76").await?;
//! println!("server already has {:?}", uploaded);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Header carrying the upload session identifier
pub const HEADER_FILE_ID: &str = "X-File-Id";
/// Header carrying the 1-based chunk number
pub const HEADER_CHUNK_NUMBER: &str = "X-Chunk-Number";
/// Header carrying the total number of chunks in the session
pub const HEADER_TOTAL_CHUNKS: &str = "X-Total-Chunks";
/// Header carrying the percent-encoded file name
pub const HEADER_FILE_NAME: &str = "X-File-Name";

/// Multipart field holding the chunk bytes
pub const CHUNK_FIELD: &str = "file";

/// Default per-request timeout (30 seconds)
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Characters left unescaped by JavaScript's `encodeURIComponent`
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Request error: {0}")]
    Request(String),

    #[error("Server returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Response error: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// HTTP status code, when the server answered with a non-success status
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Server acknowledgement of a completion request
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CompletionReceipt {
    /// Human-readable message from the server, if any
    #[serde(default)]
    pub message: Option<String>,
    /// Location of the assembled file, if the server reports one
    #[serde(default)]
    pub path: Option<String>,
}

/// The three server operations the upload core depends on
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// Chunk indices the server already holds for `file_id`
    async fn uploaded_chunks(&self, file_id: &str) -> Result<Vec<u32>, TransportError>;

    /// Send one chunk's bytes
    async fn send_chunk(
        &self,
        file_id: &str,
        chunk_number: u32,
        total_chunks: u32,
        body: Bytes,
    ) -> Result<(), TransportError>;

    /// Ask the server to assemble all chunks of `file_id` into `file_name`
    async fn complete(
        &self,
        file_id: &str,
        file_name: &str,
        total_chunks: u32,
    ) -> Result<CompletionReceipt, TransportError>;
}

/// Encode a file name for the `X-File-Name` header
pub fn encode_file_name(name: &str) -> String {
    utf8_percent_encode(name, URI_COMPONENT).to_string()
}

/// HTTP transport configuration
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Base URL the `status`, `check` and `complete` paths hang off
    pub base_url: String,
    /// Per-request timeout (default: 30 seconds)
    pub timeout: Option<Duration>,
}

/// Status query response body
#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    uploaded: Option<Vec<u32>>,
}

/// HTTP implementation of [`UploadTransport`]
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a new HTTP transport
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        if !(config.base_url.starts_with("http://") || config.base_url.starts_with("https://")) {
            return Err(TransportError::Config(format!(
                "Invalid base URL '{}': must start with http:// or https://",
                config.base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()
            .map_err(|e| TransportError::Config(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Base URL without trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Turn a non-success response into [`TransportError::Status`]
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(TransportError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl UploadTransport for HttpTransport {
    #[tracing::instrument(
        name = "transport.status",
        skip(self),
        fields(upload.file_id = %file_id, http.status_code = tracing::field::Empty),
        err
    )]
    async fn uploaded_chunks(&self, file_id: &str) -> Result<Vec<u32>, TransportError> {
        let response = self
            .client
            .get(self.endpoint("status"))
            .header(HEADER_FILE_ID, file_id)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        tracing::Span::current().record("http.status_code", response.status().as_u16());
        let response = Self::check_status(response).await?;

        let status: StatusResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;

        Ok(status.uploaded.unwrap_or_default())
    }

    #[tracing::instrument(
        name = "transport.send_chunk",
        skip(self, body),
        fields(
            upload.file_id = %file_id,
            upload.chunk = chunk_number,
            upload.total_chunks = total_chunks,
            upload.bytes = body.len(),
            http.status_code = tracing::field::Empty
        ),
        err
    )]
    async fn send_chunk(
        &self,
        file_id: &str,
        chunk_number: u32,
        total_chunks: u32,
        body: Bytes,
    ) -> Result<(), TransportError> {
        let length = body.len() as u64;
        let part = reqwest::multipart::Part::stream_with_length(body, length)
            .file_name(format!("{}_{}.chunk", file_id, chunk_number))
            .mime_str("application/octet-stream")
            .map_err(|e| TransportError::Request(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part(CHUNK_FIELD, part);

        let response = self
            .client
            .post(self.endpoint("check"))
            .header(HEADER_FILE_ID, file_id)
            .header(HEADER_CHUNK_NUMBER, chunk_number.to_string())
            .header(HEADER_TOTAL_CHUNKS, total_chunks.to_string())
            .multipart(form)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        tracing::Span::current().record("http.status_code", response.status().as_u16());
        Self::check_status(response).await?;

        Ok(())
    }

    #[tracing::instrument(
        name = "transport.complete",
        skip(self),
        fields(
            upload.file_id = %file_id,
            upload.total_chunks = total_chunks,
            http.status_code = tracing::field::Empty
        ),
        err
    )]
    async fn complete(
        &self,
        file_id: &str,
        file_name: &str,
        total_chunks: u32,
    ) -> Result<CompletionReceipt, TransportError> {
        let response = self
            .client
            .post(self.endpoint("complete"))
            .header(HEADER_FILE_ID, file_id)
            .header(HEADER_FILE_NAME, encode_file_name(file_name))
            .header(HEADER_TOTAL_CHUNKS, total_chunks.to_string())
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        tracing::Span::current().record("http.status_code", response.status().as_u16());
        let response = Self::check_status(response).await?;

        // The body is informational; a success status is what counts.
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;
        Ok(serde_json::from_slice(&body).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_file_name_matches_uri_component() {
        assert_eq!(encode_file_name("report.pdf"), "report.pdf");
        assert_eq!(encode_file_name("my file (1).txt"), "my%20file%20(1).txt");
        assert_eq!(encode_file_name("a/b?c=d&e"), "a%2Fb%3Fc%3Dd%26e");
        assert_eq!(encode_file_name("résumé.doc"), "r%C3%A9sum%C3%A9.doc");
        assert_eq!(encode_file_name("it's~ok*!"), "it's~ok*!");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let transport = HttpTransport::new(HttpTransportConfig {
            base_url: "http://localhost:8080/upload/".into(),
            timeout: None,
        })
        .unwrap();
        assert_eq!(transport.base_url(), "http://localhost:8080/upload");
        assert_eq!(
            transport.endpoint("status"),
            "http://localhost:8080/upload/status"
        );
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let result = HttpTransport::new(HttpTransportConfig {
            base_url: "localhost:8080".into(),
            timeout: None,
        });
        assert!(matches!(result, Err(TransportError::Config(_))));
    }

    #[test]
    fn test_status_response_null_is_empty() {
        let parsed: StatusResponse = serde_json::from_str(r#"{"uploaded": null}"#).unwrap();
        assert_eq!(parsed.uploaded.unwrap_or_default(), Vec::<u32>::new());

        let parsed: StatusResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.uploaded.is_none());
    }

    #[test]
    fn test_transport_error_status() {
        let err = TransportError::Status {
            status: 400,
            body: "Invalid headers".into(),
        };
        assert_eq!(err.status(), Some(400));
        assert!(err.to_string().contains("400"));
        assert_eq!(TransportError::Request("refused".into()).status(), None);
    }
}
