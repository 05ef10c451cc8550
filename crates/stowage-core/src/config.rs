//! Configuration module
//!
//! Backend configuration arrives either as a flat string map (the embedding
//! application's settings table) or through serde. Both paths end in
//! [`StorageConfig::validate`], the single point where missing, empty or
//! unknown keys are rejected. Operation code never performs untyped lookups.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

use crate::storage_types::StorageKind;

/// Keys accepted by the local backend.
pub const LOCAL_KEYS: &[&str] = &["root", "path", "domain"];

/// Keys accepted by the S3-compatible backend.
pub const S3_KEYS: &[&str] = &[
    "endpoint",
    "region",
    "accessKey",
    "secretKey",
    "bucket",
    "domain",
    "ssl",
    "immutable",
];

/// Configuration errors, raised only at backend construction time.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown storage backend: {0}")]
    UnknownKind(String),

    #[error("Missing required configuration key: {0}")]
    MissingKey(&'static str),

    #[error("Unknown configuration key for {kind} backend: {key}")]
    UnknownKey { kind: StorageKind, key: String },

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// Local filesystem backend configuration
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalConfig {
    /// Base directory for all objects.
    pub root: PathBuf,
    /// Optional key prefix, letting several namespaces share one root.
    #[serde(default)]
    pub path: Option<String>,
    /// Public base URL, e.g. `http://localhost:8080/uploads`.
    pub domain: String,
}

impl LocalConfig {
    pub fn new(root: impl Into<PathBuf>, domain: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            path: None,
            domain: domain.into(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn from_map(map: &HashMap<String, String>) -> Result<Self, ConfigError> {
        reject_unknown(StorageKind::Local, map, LOCAL_KEYS)?;
        let config = Self {
            root: PathBuf::from(required(map, "root")?),
            path: optional(map, "path"),
            domain: required(map, "domain")?,
        };
        config.validate()
    }

    /// Normalizes the prefix and checks required values.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        if self.root.as_os_str().is_empty() {
            return Err(ConfigError::MissingKey("root"));
        }
        if self.domain.trim().is_empty() {
            return Err(ConfigError::MissingKey("domain"));
        }

        self.path = match self.path.take() {
            Some(prefix) => {
                let prefix = prefix.trim_matches('/').to_string();
                if prefix.split('/').any(|segment| segment == "..") {
                    return Err(ConfigError::InvalidValue {
                        key: "path",
                        reason: "prefix must not contain '..' segments".to_string(),
                    });
                }
                (!prefix.is_empty()).then_some(prefix)
            }
            None => None,
        };

        Ok(self)
    }
}

/// S3-compatible backend configuration
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct S3Config {
    /// Host (`minio.internal:9000`) or full URL (`https://s3.example.com`).
    /// When absent the standard AWS regional endpoint is used.
    #[serde(default)]
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    /// Public base URL. Defaults to the bucket base URL.
    #[serde(default)]
    pub domain: Option<String>,
    /// Scheme used for scheme-less endpoints: https when true.
    #[serde(default = "default_ssl")]
    pub ssl: bool,
    /// Use the endpoint verbatim instead of letting the client append the bucket.
    #[serde(default)]
    pub immutable: bool,
}

fn default_ssl() -> bool {
    true
}

impl S3Config {
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self, ConfigError> {
        reject_unknown(StorageKind::S3, map, S3_KEYS)?;
        let config = Self {
            endpoint: optional(map, "endpoint"),
            region: required(map, "region")?,
            access_key: required(map, "accessKey")?,
            secret_key: required(map, "secretKey")?,
            bucket: required(map, "bucket")?,
            domain: optional(map, "domain"),
            ssl: flag(map, "ssl", true),
            immutable: flag(map, "immutable", false),
        };
        config.validate()
    }

    pub fn validate(self) -> Result<Self, ConfigError> {
        for (key, value) in [
            ("region", &self.region),
            ("accessKey", &self.access_key),
            ("secretKey", &self.secret_key),
            ("bucket", &self.bucket),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingKey(key));
            }
        }
        if self.immutable && self.endpoint.is_none() {
            return Err(ConfigError::InvalidValue {
                key: "immutable",
                reason: "immutable endpoint mode requires an endpoint".to_string(),
            });
        }
        Ok(self)
    }

    /// Endpoint with a scheme, or `None` for the standard AWS endpoint.
    ///
    /// An endpoint that already names a scheme is kept as given; otherwise
    /// `https://` is prefixed when `ssl` is set and `http://` when it is not.
    pub fn endpoint_url(&self) -> Option<String> {
        self.endpoint.as_ref().map(|endpoint| {
            let endpoint = endpoint.trim_end_matches('/');
            if endpoint.contains("://") {
                endpoint.to_string()
            } else if self.ssl {
                format!("https://{}", endpoint)
            } else {
                format!("http://{}", endpoint)
            }
        })
    }
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Config")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("domain", &self.domain)
            .field("ssl", &self.ssl)
            .field("immutable", &self.immutable)
            .finish()
    }
}

/// Validated configuration for exactly one backend.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StorageConfig {
    Local(LocalConfig),
    S3(S3Config),
}

impl StorageConfig {
    /// Parse a backend kind string and its flat configuration map.
    pub fn from_map(kind: &str, map: &HashMap<String, String>) -> Result<Self, ConfigError> {
        match kind.parse::<StorageKind>()? {
            StorageKind::Local => LocalConfig::from_map(map).map(StorageConfig::Local),
            StorageKind::S3 => S3Config::from_map(map).map(StorageConfig::S3),
        }
    }

    pub fn kind(&self) -> StorageKind {
        match self {
            StorageConfig::Local(_) => StorageKind::Local,
            StorageConfig::S3(_) => StorageKind::S3,
        }
    }

    pub fn validate(self) -> Result<Self, ConfigError> {
        match self {
            StorageConfig::Local(config) => config.validate().map(StorageConfig::Local),
            StorageConfig::S3(config) => config.validate().map(StorageConfig::S3),
        }
    }
}

fn reject_unknown(
    kind: StorageKind,
    map: &HashMap<String, String>,
    known: &[&str],
) -> Result<(), ConfigError> {
    // Sorted so the reported key is deterministic.
    let mut unknown: Vec<&String> = map
        .keys()
        .filter(|key| !known.contains(&key.as_str()))
        .collect();
    unknown.sort();
    match unknown.first() {
        Some(key) => Err(ConfigError::UnknownKey {
            kind,
            key: (*key).clone(),
        }),
        None => Ok(()),
    }
}

fn required(map: &HashMap<String, String>, key: &'static str) -> Result<String, ConfigError> {
    optional(map, key).ok_or(ConfigError::MissingKey(key))
}

fn optional(map: &HashMap<String, String>, key: &str) -> Option<String> {
    map.get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(String::from)
}

fn flag(map: &HashMap<String, String>, key: &str, default: bool) -> bool {
    optional(map, key)
        .map(|value| value.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}
