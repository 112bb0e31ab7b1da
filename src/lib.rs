//! Chunked Uploadr Library
//!
//! Resumable chunked file upload client.
//!
//! # Features
//!
//! - **Resumable**: Asks the server which chunks it holds and only sends the rest
//! - **Bounded Concurrency**: Chunks go out in batches of at most K in flight
//! - **Idempotent**: Re-running after any failure converges on the same result
//! - **Cancellable**: A cancellation token stops the upload between or during batches
//!
//! # Example
//!
//! ```no_run
//! use chunked_uploadr::{config::Config, ChunkedUploader, HttpTransport, SelectedFile};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let transport = HttpTransport::new(config.server.transport_config())?;
//!     let uploader = ChunkedUploader::new(Arc::new(transport), config.upload.options())
//!         .with_identity(config.upload.identity.strategy());
//!
//!     let file = SelectedFile::from_path("backup.tar").await?;
//!     let report = uploader.upload(&file).await?;
//!     println!("assembled at {:?}", report.receipt.path);
//!     Ok(())
//! }
//! ```

pub mod chunker;
pub mod client;
pub mod config;
pub mod identity;
pub mod logging;
pub mod metrics;
pub mod upload;

// Re-export commonly used types
pub use client::{HttpTransport, UploadTransport};
pub use config::Config;
pub use upload::{ChunkedUploader, SelectedFile, UploadError, UploadReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
