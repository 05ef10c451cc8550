//! Stowage Storage Library
//!
//! This crate provides one storage contract, [`Storage`], with a local
//! filesystem backend and an S3-compatible backend. Callers pick a backend once
//! through the factory and then issue reads, writes, deletes and URL requests
//! without knowing which backend is live.
//!
//! # Signed URLs
//!
//! - **S3**: provider-verified presigned GET/PUT URLs and POST policies, all
//!   valid for [`s3::PRESIGN_EXPIRY`] (20 minutes).
//! - **Local**: a token from the injected [`SignProvider`] is appended as a
//!   `sign` query parameter. The storage layer never checks it; the endpoint
//!   that serves uploads does, e.g. with [`HmacSigner::verify`].

#[cfg(not(any(feature = "storage-local", feature = "storage-s3")))]
compile_error!("enable at least one storage backend feature: `storage-local` or `storage-s3`");

pub mod backend;
pub mod context;
pub mod factory;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod path;
#[cfg(feature = "storage-s3")]
pub mod presign;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod sign;
pub mod traits;

// Re-export commonly used types
pub use backend::Backend;
pub use context::OpContext;
pub use factory::{create_from_config, create_storage, create_storage_with_signer};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use path::PathResolver;
#[cfg(feature = "storage-s3")]
pub use s3::{S3Storage, PRESIGN_EXPIRY};
pub use sign::{HmacSigner, NoopSigner, SignProvider};
pub use stowage_core::{LocalConfig, S3Config, StorageConfig, StorageKind};
pub use traits::{ByteStream, ContentReader, SignedPost, Storage, StorageError, StorageResult};
