//! Upload sources
//!
//! A [`SelectedFile`] is the file picked for upload: a name, a size, and a
//! [`ChunkSource`] that reads any byte range on demand. Chunk bytes are only
//! read when their transfer task runs, so at most one batch of payloads is
//! held in memory at a time.

use super::UploadError;
use async_trait::async_trait;
use bytes::Bytes;
use std::io::SeekFrom;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Random-access reader over the bytes being uploaded
#[async_trait]
pub trait ChunkSource: Send + Sync {
    /// Read exactly the bytes in `range`
    async fn read_range(&self, range: Range<u64>) -> std::io::Result<Bytes>;
}

/// Reads ranges from a file on disk
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ChunkSource for FileSource {
    async fn read_range(&self, range: Range<u64>) -> std::io::Result<Bytes> {
        let len = usize::try_from(range.end.saturating_sub(range.start))
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        if len == 0 {
            return Ok(Bytes::new());
        }

        let mut buf = vec![0u8; len];
        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(range.start)).await?;
        file.read_exact(&mut buf).await?;
        Ok(Bytes::from(buf))
    }
}

/// Serves ranges from an in-memory buffer
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
}

impl MemorySource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

#[async_trait]
impl ChunkSource for MemorySource {
    async fn read_range(&self, range: Range<u64>) -> std::io::Result<Bytes> {
        let len = self.data.len() as u64;
        if range.start > range.end || range.end > len {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("range {:?} outside buffer of {} bytes", range, len),
            ));
        }
        Ok(self.data.slice(range.start as usize..range.end as usize))
    }
}

/// The file chosen for upload
#[derive(Clone)]
pub struct SelectedFile {
    name: String,
    size: u64,
    source: Arc<dyn ChunkSource>,
}

impl std::fmt::Debug for SelectedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectedFile")
            .field("name", &self.name)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl SelectedFile {
    /// Wrap an arbitrary source
    pub fn new(name: impl Into<String>, size: u64, source: Arc<dyn ChunkSource>) -> Self {
        Self {
            name: name.into(),
            size,
            source,
        }
    }

    /// Select an in-memory buffer
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let size = data.len() as u64;
        Self::new(name, size, Arc::new(MemorySource::new(data)))
    }

    /// Select a regular file on disk.
    ///
    /// The upload name is the final path component.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, UploadError> {
        let path = path.as_ref();

        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            UploadError::Selection(format!("cannot read '{}': {}", path.display(), e))
        })?;
        if !metadata.is_file() {
            return Err(UploadError::Selection(format!(
                "'{}' is not a regular file",
                path.display()
            )));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                UploadError::Selection(format!("'{}' has no file name", path.display()))
            })?;

        Ok(Self::new(
            name,
            metadata.len(),
            Arc::new(FileSource::new(path)),
        ))
    }

    /// File name sent to the server on completion
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn source(&self) -> &Arc<dyn ChunkSource> {
        &self.source
    }
}

/// Resolve an optional path into a [`SelectedFile`].
///
/// `None` is a selection error: nothing was picked, so nothing is sent.
pub async fn select_file(path: Option<&Path>) -> Result<SelectedFile, UploadError> {
    match path {
        Some(path) => SelectedFile::from_path(path).await,
        None => Err(UploadError::Selection("no file provided".into())),
    }
}
