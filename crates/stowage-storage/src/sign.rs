//! Pluggable signing for the local backend.
//!
//! The local backend has no provider to enforce signed URLs, so it asks a
//! [`SignProvider`] for an opaque token and appends it to the URL. Checking the
//! token is the job of whatever endpoint serves the upload.
//!
//! [`HmacSigner`] token: `base64url(expiry_ts (u64 BE) || HMAC-SHA256(secret, expiry_ts || path))`.
//! An expiry of zero means the token never expires.

use crate::traits::{StorageError, StorageResult};
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

const EXPIRY_LEN: usize = 8;
const MAC_LEN: usize = 32;
const TOKEN_LEN: usize = EXPIRY_LEN + MAC_LEN;

/// Produces an opaque signature token for a resolved object path.
pub trait SignProvider: Send + Sync {
    fn sign(&self, path: &str) -> StorageResult<String>;
}

/// Signs nothing: every token is empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSigner;

impl SignProvider for NoopSigner {
    fn sign(&self, _path: &str) -> StorageResult<String> {
        Ok(String::new())
    }
}

impl<F> SignProvider for F
where
    F: Fn(&str) -> StorageResult<String> + Send + Sync,
{
    fn sign(&self, path: &str) -> StorageResult<String> {
        self(path)
    }
}

/// HMAC-SHA256 signer with an optional validity window.
#[derive(Clone)]
pub struct HmacSigner {
    secret: Vec<u8>,
    ttl: Option<Duration>,
}

impl HmacSigner {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Check a token previously produced by [`SignProvider::sign`] for `path`.
    pub fn verify(&self, path: &str, token: &str) -> StorageResult<()> {
        let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| StorageError::AuthFailure("Invalid signature".to_string()))?;
        if decoded.len() != TOKEN_LEN {
            return Err(StorageError::AuthFailure("Invalid signature".to_string()));
        }

        let (expiry, tag) = decoded.split_at(EXPIRY_LEN);
        self.mac(expiry, path)?
            .verify_slice(tag)
            .map_err(|_| StorageError::AuthFailure("Invalid signature".to_string()))?;

        let mut expiry_bytes = [0u8; EXPIRY_LEN];
        expiry_bytes.copy_from_slice(expiry);
        let expiry_ts = u64::from_be_bytes(expiry_bytes);
        if expiry_ts != 0 && unix_now() > expiry_ts {
            return Err(StorageError::AuthFailure(
                "Signature has expired".to_string(),
            ));
        }
        Ok(())
    }

    fn expiry_ts(&self) -> u64 {
        match self.ttl {
            Some(ttl) => unix_now().saturating_add(ttl.as_secs().max(1)),
            None => 0,
        }
    }

    fn mac(&self, expiry: &[u8], path: &str) -> StorageResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| StorageError::ConfigInvalid(format!("Invalid signing key: {}", e)))?;
        mac.update(expiry);
        mac.update(path.as_bytes());
        Ok(mac)
    }
}

impl SignProvider for HmacSigner {
    fn sign(&self, path: &str) -> StorageResult<String> {
        let expiry = self.expiry_ts().to_be_bytes();
        let tag = self.mac(&expiry, path)?.finalize().into_bytes();

        let mut token = [0u8; TOKEN_LEN];
        token[..EXPIRY_LEN].copy_from_slice(&expiry);
        token[EXPIRY_LEN..].copy_from_slice(&tag);
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(token))
    }
}

impl fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmacSigner")
            .field("secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
