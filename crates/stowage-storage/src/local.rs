use crate::context::OpContext;
use crate::path::{encode_key, PathResolver};
use crate::sign::{NoopSigner, SignProvider};
use crate::traits::{ByteStream, ContentReader, SignedPost, Storage, StorageError, StorageResult};
use crate::{LocalConfig, StorageKind};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem storage implementation
///
/// Every key resolves to `root/[prefix/]key`. Deleting a missing key fails
/// with `NotFound`, as the filesystem reports it.
#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
    resolver: PathResolver,
    domain: String,
    signer: Arc<dyn SignProvider>,
}

impl LocalStorage {
    /// Create a new LocalStorage instance with signing disabled.
    ///
    /// The root directory is created if it does not exist yet.
    pub async fn new(config: LocalConfig) -> StorageResult<Self> {
        Self::with_signer(config, Arc::new(NoopSigner)).await
    }

    pub async fn with_signer(
        config: LocalConfig,
        signer: Arc<dyn SignProvider>,
    ) -> StorageResult<Self> {
        let config = config.validate()?;

        fs::create_dir_all(&config.root).await.map_err(|e| {
            StorageError::ConfigInvalid(format!(
                "Failed to create storage directory {}: {}",
                config.root.display(),
                e
            ))
        })?;

        tracing::debug!(
            root = %config.root.display(),
            prefix = config.path.as_deref().unwrap_or(""),
            domain = %config.domain,
            "Local storage initialized"
        );

        Ok(LocalStorage {
            root: config.root,
            resolver: PathResolver::new(config.path),
            domain: config.domain,
            signer,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        self.resolver.on_disk(&self.root, key)
    }

    /// Key with the prefix applied; this is what gets signed.
    fn upload_path(&self, key: &str) -> StorageResult<String> {
        self.resolver.object_key(key)
    }

    fn sign(&self, key: &str) -> StorageResult<(String, String)> {
        let upload_path = self.upload_path(key)?;
        let token = self.signer.sign(&upload_path)?;
        Ok((upload_path, token))
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::from_io(
                    e,
                    format!("Failed to create directory {}", parent.display()),
                )
            })?;
        }
        Ok(())
    }

    async fn create_file(&self, key: &str) -> StorageResult<(PathBuf, fs::File)> {
        let path = self.key_to_path(key)?;
        self.ensure_parent_dir(&path).await?;
        let file = fs::File::create(&path).await.map_err(|e| {
            StorageError::from_io(e, format!("Failed to create file {}", path.display()))
        })?;
        Ok((path, file))
    }

    /// Missing files surface as `NotFound(key)`, other failures keep the OS message.
    fn map_read_err(key: &str, path: &Path, err: std::io::Error) -> StorageError {
        match err.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(key.to_string()),
            _ => StorageError::from_io(err, format!("Failed to read {}", path.display())),
        }
    }
}

impl fmt::Debug for LocalStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalStorage")
            .field("root", &self.root)
            .field("prefix", &self.resolver.prefix())
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}

/// `url?name=value`, or `url&name=value` when a query string is already present.
pub(crate) fn append_query(url: &str, name: &str, value: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!(
        "{}{}{}={}",
        url,
        separator,
        name,
        urlencoding::encode(value)
    )
}

#[async_trait]
impl Storage for LocalStorage {
    async fn write(&self, ctx: &OpContext, key: &str, data: Bytes) -> StorageResult<()> {
        ctx.run(async {
            let start = std::time::Instant::now();
            let (path, mut file) = self.create_file(key).await?;

            file.write_all(&data).await.map_err(|e| {
                StorageError::from_io(e, format!("Failed to write file {}", path.display()))
            })?;

            file.sync_all().await.map_err(|e| {
                StorageError::from_io(e, format!("Failed to sync file {}", path.display()))
            })?;

            tracing::info!(
                path = %path.display(),
                key = %key,
                size_bytes = data.len(),
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Local storage write successful"
            );

            Ok(())
        })
        .await
    }

    async fn write_stream(
        &self,
        ctx: &OpContext,
        key: &str,
        mut reader: ContentReader,
    ) -> StorageResult<()> {
        ctx.run(async {
            let start = std::time::Instant::now();
            let (path, mut file) = self.create_file(key).await?;

            let bytes_copied = tokio::io::copy(&mut reader, &mut file).await.map_err(|e| {
                StorageError::from_io(
                    e,
                    format!("Failed to write stream to file {}", path.display()),
                )
            })?;

            file.sync_all().await.map_err(|e| {
                StorageError::from_io(e, format!("Failed to sync file {}", path.display()))
            })?;

            tracing::info!(
                path = %path.display(),
                key = %key,
                size_bytes = bytes_copied,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Local storage stream write successful"
            );

            Ok(())
        })
        .await
    }

    async fn read(&self, ctx: &OpContext, key: &str) -> StorageResult<Bytes> {
        ctx.run(async {
            let path = self.key_to_path(key)?;
            let start = std::time::Instant::now();

            let data = fs::read(&path)
                .await
                .map_err(|e| Self::map_read_err(key, &path, e))?;

            tracing::info!(
                path = %path.display(),
                key = %key,
                size_bytes = data.len(),
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Local storage read successful"
            );

            Ok(Bytes::from(data))
        })
        .await
    }

    async fn read_stream(&self, ctx: &OpContext, key: &str) -> StorageResult<ByteStream> {
        let path = self.key_to_path(key)?;

        let file = ctx
            .run(async {
                fs::File::open(&path)
                    .await
                    .map_err(|e| Self::map_read_err(key, &path, e))
            })
            .await?;

        let start = std::time::Instant::now();
        let key = key.to_string();
        let path_display = path.display().to_string();

        let stream = tokio_util::io::ReaderStream::new(file).map(move |item| {
            item.map_err(|e| {
                tracing::error!(
                    error = %e,
                    path = %path_display,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Local storage stream read error"
                );
                StorageError::Transport(format!("Failed to read chunk: {}", e))
            })
        });

        Ok(ctx.guard_stream(stream))
    }

    async fn delete(&self, ctx: &OpContext, key: &str) -> StorageResult<()> {
        ctx.run(async {
            let path = self.key_to_path(key)?;
            let start = std::time::Instant::now();

            fs::remove_file(&path).await.map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => StorageError::NotFound(key.to_string()),
                _ => StorageError::from_io(e, format!("Failed to delete file {}", path.display())),
            })?;

            tracing::info!(
                path = %path.display(),
                key = %key,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Local storage delete successful"
            );

            Ok(())
        })
        .await
    }

    async fn size(&self, ctx: &OpContext, key: &str) -> StorageResult<u64> {
        ctx.run(async {
            let path = self.key_to_path(key)?;
            let meta = fs::metadata(&path)
                .await
                .map_err(|e| Self::map_read_err(key, &path, e))?;
            if !meta.is_file() {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Ok(meta.len())
        })
        .await
    }

    async fn exists(&self, ctx: &OpContext, key: &str) -> StorageResult<bool> {
        ctx.run(async {
            let path = self.key_to_path(key)?;
            match fs::metadata(&path).await {
                Ok(meta) => Ok(meta.is_file()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(StorageError::from_io(
                    e,
                    format!("Failed to stat {}", path.display()),
                )),
            }
        })
        .await
    }

    fn public_url(&self, key: &str) -> StorageResult<String> {
        let domain = self.domain.trim_end_matches('/');
        let key = encode_key(key);
        Ok(match self.resolver.prefix() {
            Some(prefix) => format!("{}/{}/{}", domain, prefix, key),
            None => format!("{}/{}", domain, key),
        })
    }

    /// Public URL plus the sign token, or the plain public URL when the
    /// signer yields an empty token.
    async fn private_url(&self, ctx: &OpContext, key: &str) -> StorageResult<String> {
        ctx.check()?;
        let (_, token) = self.sign(key)?;
        let url = self.public_url(key)?;
        if token.is_empty() {
            return Ok(url);
        }
        Ok(append_query(&url, "sign", &token))
    }

    async fn sign_post_url(&self, ctx: &OpContext, key: &str) -> StorageResult<SignedPost> {
        ctx.check()?;
        let (upload_path, token) = self.sign(key)?;

        let mut fields = BTreeMap::new();
        fields.insert("sign".to_string(), token);
        fields.insert("key".to_string(), key.to_string());

        Ok(SignedPost {
            url: upload_path,
            fields,
            expires_at: None,
        })
    }

    async fn sign_put_url(&self, ctx: &OpContext, key: &str) -> StorageResult<String> {
        ctx.check()?;
        let (upload_path, token) = self.sign(key)?;
        Ok(append_query(&upload_path, "sign", &token))
    }

    fn local(&self) -> bool {
        true
    }

    fn kind(&self) -> StorageKind {
        StorageKind::Local
    }
}
