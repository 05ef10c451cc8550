//! Closed set of backends behind the [`Storage`] contract.

use crate::context::OpContext;
use crate::traits::{ByteStream, ContentReader, SignedPost, Storage, StorageResult};
#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::StorageKind;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// A constructed backend. The variant is fixed for the value's lifetime.
#[derive(Debug, Clone)]
pub enum Backend {
    #[cfg(feature = "storage-local")]
    Local(LocalStorage),
    #[cfg(feature = "storage-s3")]
    S3(S3Storage),
}

impl Backend {
    fn inner(&self) -> &dyn Storage {
        match self {
            #[cfg(feature = "storage-local")]
            Backend::Local(storage) => storage,
            #[cfg(feature = "storage-s3")]
            Backend::S3(storage) => storage,
        }
    }

    /// Type-erased handle for callers that store `Arc<dyn Storage>`.
    pub fn into_shared(self) -> Arc<dyn Storage> {
        match self {
            #[cfg(feature = "storage-local")]
            Backend::Local(storage) => Arc::new(storage),
            #[cfg(feature = "storage-s3")]
            Backend::S3(storage) => Arc::new(storage),
        }
    }
}

#[cfg(feature = "storage-local")]
impl From<LocalStorage> for Backend {
    fn from(storage: LocalStorage) -> Self {
        Backend::Local(storage)
    }
}

#[cfg(feature = "storage-s3")]
impl From<S3Storage> for Backend {
    fn from(storage: S3Storage) -> Self {
        Backend::S3(storage)
    }
}

#[async_trait]
impl Storage for Backend {
    async fn write(&self, ctx: &OpContext, key: &str, data: Bytes) -> StorageResult<()> {
        self.inner().write(ctx, key, data).await
    }

    async fn write_stream(
        &self,
        ctx: &OpContext,
        key: &str,
        reader: ContentReader,
    ) -> StorageResult<()> {
        self.inner().write_stream(ctx, key, reader).await
    }

    async fn read(&self, ctx: &OpContext, key: &str) -> StorageResult<Bytes> {
        self.inner().read(ctx, key).await
    }

    async fn read_stream(&self, ctx: &OpContext, key: &str) -> StorageResult<ByteStream> {
        self.inner().read_stream(ctx, key).await
    }

    async fn delete(&self, ctx: &OpContext, key: &str) -> StorageResult<()> {
        self.inner().delete(ctx, key).await
    }

    async fn size(&self, ctx: &OpContext, key: &str) -> StorageResult<u64> {
        self.inner().size(ctx, key).await
    }

    async fn exists(&self, ctx: &OpContext, key: &str) -> StorageResult<bool> {
        self.inner().exists(ctx, key).await
    }

    fn public_url(&self, key: &str) -> StorageResult<String> {
        self.inner().public_url(key)
    }

    async fn private_url(&self, ctx: &OpContext, key: &str) -> StorageResult<String> {
        self.inner().private_url(ctx, key).await
    }

    async fn sign_post_url(&self, ctx: &OpContext, key: &str) -> StorageResult<SignedPost> {
        self.inner().sign_post_url(ctx, key).await
    }

    async fn sign_put_url(&self, ctx: &OpContext, key: &str) -> StorageResult<String> {
        self.inner().sign_put_url(ctx, key).await
    }

    fn local(&self) -> bool {
        self.inner().local()
    }

    fn kind(&self) -> StorageKind {
        self.inner().kind()
    }
}
