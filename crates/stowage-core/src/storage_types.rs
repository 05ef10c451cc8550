use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::config::ConfigError;

/// Storage backend types
///
/// Fixed for the lifetime of a backend instance; the factory is the only
/// place that maps a kind to an implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Local,
    S3,
}

impl FromStr for StorageKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(StorageKind::Local),
            "s3" | "s3-compatible" | "minio" => Ok(StorageKind::S3),
            _ => Err(ConfigError::UnknownKind(s.to_string())),
        }
    }
}

impl Display for StorageKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StorageKind::Local => write!(f, "local"),
            StorageKind::S3 => write!(f, "s3"),
        }
    }
}
