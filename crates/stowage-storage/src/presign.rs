//! SigV4 browser-upload (POST policy) signing.
//!
//! `object_store` signs query-string URLs for GET and PUT but has no POST policy
//! support, so the form fields are computed here from the same credentials:
//!
//! 1. policy = base64(JSON { expiration, conditions: [bucket, key, algorithm, credential, date] })
//! 2. signing key = HMAC chain over `AWS4{secret}` → date → region → `s3` → `aws4_request`
//! 3. signature = hex(HMAC(signing key, policy))

use crate::traits::{SignedPost, StorageError, StorageResult};
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";

#[derive(Clone)]
pub struct PostPolicySigner {
    access_key: String,
    secret_key: String,
    region: String,
    bucket: String,
}

impl PostPolicySigner {
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        region: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            region: region.into(),
            bucket: bucket.into(),
        }
    }

    /// Form fields for uploading `key` to `url`, valid for `expires_in` from `now`.
    pub fn sign(
        &self,
        url: &str,
        key: &str,
        now: DateTime<Utc>,
        expires_in: Duration,
    ) -> StorageResult<SignedPost> {
        let expires_in = chrono::Duration::from_std(expires_in)
            .map_err(|e| StorageError::ConfigInvalid(format!("Invalid presign expiry: {}", e)))?;
        let expires_at = now + expires_in;

        let date = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let credential = format!(
            "{}/{}/{}/{}/aws4_request",
            self.access_key, date, self.region, SERVICE
        );

        let policy = serde_json::json!({
            "expiration": expires_at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            "conditions": [
                { "bucket": self.bucket },
                { "key": key },
                { "x-amz-algorithm": ALGORITHM },
                { "x-amz-credential": credential },
                { "x-amz-date": amz_date },
            ],
        });
        let policy = base64::engine::general_purpose::STANDARD.encode(policy.to_string());

        let signing_key = self.signing_key(&date)?;
        let signature = hex::encode(hmac(&signing_key, policy.as_bytes())?);

        let mut fields = BTreeMap::new();
        fields.insert("key".to_string(), key.to_string());
        fields.insert("policy".to_string(), policy);
        fields.insert("x-amz-algorithm".to_string(), ALGORITHM.to_string());
        fields.insert("x-amz-credential".to_string(), credential);
        fields.insert("x-amz-date".to_string(), amz_date);
        fields.insert("x-amz-signature".to_string(), signature);

        Ok(SignedPost {
            url: url.to_string(),
            fields,
            expires_at: Some(expires_at),
        })
    }

    /// SigV4 signing key for `date` (`YYYYMMDD`).
    pub fn signing_key(&self, date: &str) -> StorageResult<Vec<u8>> {
        derive_signing_key(&self.secret_key, date, &self.region, SERVICE)
    }
}

impl fmt::Debug for PostPolicySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostPolicySigner")
            .field("access_key", &self.access_key)
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

pub fn derive_signing_key(
    secret_key: &str,
    date: &str,
    region: &str,
    service: &str,
) -> StorageResult<Vec<u8>> {
    let k_date = hmac(format!("AWS4{}", secret_key).as_bytes(), date.as_bytes())?;
    let k_region = hmac(&k_date, region.as_bytes())?;
    let k_service = hmac(&k_region, service.as_bytes())?;
    hmac(&k_service, b"aws4_request")
}

fn hmac(key: &[u8], data: &[u8]) -> StorageResult<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| StorageError::ConfigInvalid(format!("Invalid signing key: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}
