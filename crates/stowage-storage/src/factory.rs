use crate::backend::Backend;
use crate::sign::{NoopSigner, SignProvider};
#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::{StorageConfig, StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Create a storage backend from a kind string and its configuration map.
///
/// Unknown kinds, unknown keys and missing required keys fail with
/// `ConfigInvalid` before any backend is built.
pub async fn create_storage(
    kind: &str,
    config: &HashMap<String, String>,
) -> StorageResult<Backend> {
    create_storage_with_signer(kind, config, Arc::new(NoopSigner)).await
}

/// Like [`create_storage`], injecting the local backend's sign function.
///
/// The signer is ignored by backends that sign with provider credentials.
pub async fn create_storage_with_signer(
    kind: &str,
    config: &HashMap<String, String>,
    signer: Arc<dyn SignProvider>,
) -> StorageResult<Backend> {
    let config = StorageConfig::from_map(kind, config).map_err(|e| {
        tracing::error!(error = %e, kind = %kind, "Invalid storage configuration");
        StorageError::from(e)
    })?;
    create_from_config(config, signer).await
}

/// Create a storage backend from an already typed configuration.
pub async fn create_from_config(
    config: StorageConfig,
    signer: Arc<dyn SignProvider>,
) -> StorageResult<Backend> {
    let config = config.validate()?;
    let kind = config.kind();

    let backend = match config {
        #[cfg(feature = "storage-local")]
        StorageConfig::Local(local) => {
            Backend::Local(LocalStorage::with_signer(local, signer).await?)
        }

        #[cfg(not(feature = "storage-local"))]
        StorageConfig::Local(_) => {
            return Err(StorageError::ConfigInvalid(
                "Local storage backend not available (storage-local feature not enabled)"
                    .to_string(),
            ))
        }

        #[cfg(feature = "storage-s3")]
        StorageConfig::S3(s3) => {
            let _ = signer;
            Backend::S3(S3Storage::new(s3).await?)
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageConfig::S3(_) => {
            return Err(StorageError::ConfigInvalid(
                "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
            ))
        }
    };

    tracing::info!(kind = %kind, "Storage backend created");
    Ok(backend)
}
