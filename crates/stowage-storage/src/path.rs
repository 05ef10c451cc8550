//! Key to location resolution.
//!
//! A logical key becomes `[prefix/]key` inside the backend namespace; the local
//! backend joins that onto its root directory. Keys must be relative and must
//! not contain `..` segments, so a key can never resolve outside the root.

use crate::traits::{StorageError, StorageResult};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathResolver {
    prefix: Option<String>,
}

impl PathResolver {
    pub fn new(prefix: Option<String>) -> Self {
        let prefix = prefix
            .map(|p| p.trim_matches('/').to_string())
            .filter(|p| !p.is_empty());
        Self { prefix }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Key inside the backend namespace, with the prefix applied.
    pub fn object_key(&self, key: &str) -> StorageResult<String> {
        validate_key(key)?;
        Ok(match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix, key),
            None => key.to_string(),
        })
    }

    /// Filesystem location of `key` under `root`.
    pub fn on_disk(&self, root: &Path, key: &str) -> StorageResult<PathBuf> {
        let object_key = self.object_key(key)?;
        Ok(object_key
            .split('/')
            .filter(|segment| !segment.is_empty())
            .fold(root.to_path_buf(), |path, segment| path.join(segment)))
    }
}

/// Percent-encode each path segment of `key` for use in a URL.
///
/// Unreserved characters and `/` separators are kept; a query part after `?`
/// is passed through untouched.
pub fn encode_key(key: &str) -> String {
    let (path, query) = match key.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (key, None),
    };

    let mut encoded = path
        .split('/')
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join("/");
    if let Some(query) = query {
        encoded.push('?');
        encoded.push_str(query);
    }
    encoded
}

/// Reject keys that are empty, absolute or contain parent-directory segments.
pub fn validate_key(key: &str) -> StorageResult<()> {
    // The query part of a key is not a path segment.
    let path = key.split('?').next().unwrap_or_default();
    if path.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if path.starts_with('/') || path.starts_with('\\') {
        return Err(StorageError::InvalidKey(format!(
            "Storage key must be relative: {}",
            key
        )));
    }
    if path.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(StorageError::InvalidKey(format!(
            "Storage key contains a parent directory segment: {}",
            key
        )));
    }
    Ok(())
}
