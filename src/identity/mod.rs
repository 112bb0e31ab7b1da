//! Upload identity
//!
//! The file id ties chunk uploads and resume state together on the server.
//! How it is derived is a tradeoff, so it is a pluggable strategy:
//!
//! | Strategy | Derived from | Cost before upload | Same-name collision |
//! |----------|--------------|--------------------|---------------------|
//! | [`NameIdentity`] (default) | file name | none | yes |
//! | [`NameAndSizeIdentity`] | name + size | none | only if sizes match |
//! | [`ContentIdentity`] | file bytes | reads the whole file | no |
//! | [`Md5NameIdentity`] | file name (MD5) | none | yes |
//!
//! Name-only identity makes resume planning O(1) without touching file bytes,
//! at the price of treating two different files with the same name as the
//! same session. A second file with an already-seen name will resume onto the
//! first file's chunks.
//!
//! [`Md5NameIdentity`] produces the same id as the browser client served by
//! the upload server, so uploads it started can be resumed from here and the
//! other way round.

use crate::upload::SelectedFile;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use md5::Md5;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Read window used when hashing content
const CONTENT_READ_SIZE: u64 = 1024 * 1024;

/// Derives a file id from a selected file
#[async_trait]
pub trait IdentityStrategy: Send + Sync {
    /// Strategy name for logs
    fn name(&self) -> &'static str;

    /// Compute the file id
    async fn derive(&self, file: &SelectedFile) -> std::io::Result<String>;
}

/// SHA-256 of the file name
#[derive(Debug, Clone, Copy, Default)]
pub struct NameIdentity;

#[async_trait]
impl IdentityStrategy for NameIdentity {
    fn name(&self) -> &'static str {
        "name"
    }

    async fn derive(&self, file: &SelectedFile) -> std::io::Result<String> {
        Ok(hex::encode(Sha256::digest(file.name().as_bytes())))
    }
}

/// SHA-256 of the file name and size
#[derive(Debug, Clone, Copy, Default)]
pub struct NameAndSizeIdentity;

#[async_trait]
impl IdentityStrategy for NameAndSizeIdentity {
    fn name(&self) -> &'static str {
        "name_and_size"
    }

    async fn derive(&self, file: &SelectedFile) -> std::io::Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(file.name().as_bytes());
        hasher.update([0u8]);
        hasher.update(file.size().to_be_bytes());
        Ok(hex::encode(hasher.finalize()))
    }
}

/// SHA-256 of the file content
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentIdentity;

#[async_trait]
impl IdentityStrategy for ContentIdentity {
    fn name(&self) -> &'static str {
        "content"
    }

    async fn derive(&self, file: &SelectedFile) -> std::io::Result<String> {
        let mut hasher = Sha256::new();
        let mut offset = 0;
        while offset < file.size() {
            let end = (offset + CONTENT_READ_SIZE).min(file.size());
            let bytes = file.source().read_range(offset..end).await?;
            hasher.update(&bytes);
            offset = end;
        }
        Ok(hex::encode(hasher.finalize()))
    }
}

/// MD5 of the file name, matching the browser upload client
#[derive(Debug, Clone, Copy, Default)]
pub struct Md5NameIdentity;

#[async_trait]
impl IdentityStrategy for Md5NameIdentity {
    fn name(&self) -> &'static str {
        "md5_name"
    }

    async fn derive(&self, file: &SelectedFile) -> std::io::Result<String> {
        Ok(hex::encode(Md5::digest(file.name().as_bytes())))
    }
}

/// Identity strategy selector, as written in configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKind {
    #[default]
    Name,
    NameAndSize,
    Content,
    Md5Name,
}

impl IdentityKind {
    /// Build the strategy this kind names
    pub fn strategy(self) -> Arc<dyn IdentityStrategy> {
        match self {
            IdentityKind::Name => Arc::new(NameIdentity),
            IdentityKind::NameAndSize => Arc::new(NameAndSizeIdentity),
            IdentityKind::Content => Arc::new(ContentIdentity),
            IdentityKind::Md5Name => Arc::new(Md5NameIdentity),
        }
    }
}

impl std::str::FromStr for IdentityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(IdentityKind::Name),
            "name_and_size" => Ok(IdentityKind::NameAndSize),
            "content" => Ok(IdentityKind::Content),
            "md5_name" => Ok(IdentityKind::Md5Name),
            other => Err(format!(
                "Unknown identity strategy '{}': must be one of name, name_and_size, content, md5_name",
                other
            )),
        }
    }
}
