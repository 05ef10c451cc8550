//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement,
//! along with the shared error taxonomy and stream types.

use crate::context::OpContext;
use crate::StorageKind;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;
use std::collections::BTreeMap;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors
///
/// Every backend maps its native failures into these variants so callers can
/// branch on the kind of failure without knowing which backend is live.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Authentication failed: {0}")]
    AuthFailure(String),

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation deadline exceeded")]
    DeadlineExceeded,
}

impl StorageError {
    /// Whether a caller could reasonably retry the operation.
    ///
    /// Only transport failures qualify. Auth and configuration errors never do.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Transport(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }

    /// Map a filesystem error, keeping the OS message.
    pub fn from_io(err: std::io::Error, context: impl std::fmt::Display) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(context.to_string()),
            std::io::ErrorKind::PermissionDenied => {
                StorageError::AuthFailure(format!("{}: {}", context, err))
            }
            _ => StorageError::Transport(format!("{}: {}", context, err)),
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        let message = err.to_string();
        StorageError::from_io(err, message)
    }
}

impl From<stowage_core::ConfigError> for StorageError {
    fn from(err: stowage_core::ConfigError) -> Self {
        StorageError::ConfigInvalid(err.to_string())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Inbound content for streamed writes. Read until EOF; length need not be known.
pub type ContentReader = Pin<Box<dyn AsyncRead + Send + Unpin>>;

/// Outbound content for streamed reads.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Upload credentials for a browser-style multipart form POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPost {
    /// Form action URL.
    pub url: String,
    /// Form fields that must accompany the file part.
    pub fields: BTreeMap<String, String>,
    /// Provider-enforced expiry. `None` when the signature is verified by the
    /// application instead of the storage provider.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Storage abstraction trait
///
/// All storage backends (S3-compatible, local filesystem) implement this trait.
/// Implementations hold no mutable state, so one instance can be shared by
/// any number of concurrent callers. Concurrent writes to the same key race
/// and the last one to complete wins.
///
/// Every I/O operation takes an [`OpContext`]; cancelling it aborts the
/// in-flight request with [`StorageError::Cancelled`].
#[async_trait]
pub trait Storage: Send + Sync {
    /// Create or overwrite the object at `key`.
    async fn write(&self, ctx: &OpContext, key: &str, data: Bytes) -> StorageResult<()>;

    /// Create or overwrite the object at `key` from a reader consumed until EOF.
    async fn write_stream(
        &self,
        ctx: &OpContext,
        key: &str,
        reader: ContentReader,
    ) -> StorageResult<()>;

    /// Read the whole object.
    async fn read(&self, ctx: &OpContext, key: &str) -> StorageResult<Bytes>;

    /// Read the object as a stream of chunks.
    ///
    /// A missing key fails here with `NotFound`, before any chunk is produced.
    async fn read_stream(&self, ctx: &OpContext, key: &str) -> StorageResult<ByteStream>;

    /// Delete the object. Behavior on a missing key is backend-defined.
    async fn delete(&self, ctx: &OpContext, key: &str) -> StorageResult<()>;

    /// Object size in bytes, from metadata only.
    async fn size(&self, ctx: &OpContext, key: &str) -> StorageResult<u64>;

    /// Whether the object exists, from metadata only.
    async fn exists(&self, ctx: &OpContext, key: &str) -> StorageResult<bool>;

    /// Permanent URL through the configured domain. Performs no I/O and does
    /// not check that the object exists.
    fn public_url(&self, key: &str) -> StorageResult<String>;

    /// Time-bounded read URL.
    async fn private_url(&self, ctx: &OpContext, key: &str) -> StorageResult<String>;

    /// Credentials for a form POST upload.
    async fn sign_post_url(&self, ctx: &OpContext, key: &str) -> StorageResult<SignedPost>;

    /// URL accepting a single HTTP PUT upload.
    async fn sign_put_url(&self, ctx: &OpContext, key: &str) -> StorageResult<String>;

    /// True when the backend needs no network access.
    fn local(&self) -> bool;

    /// Get the storage backend type
    fn kind(&self) -> StorageKind;
}
