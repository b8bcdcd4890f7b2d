// src/cache/entry.rs

//! On-disk and in-memory representation of one cluster's status listing.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::exec::Listing;

/// Cache key used for jobs submitted without an explicit cluster.
pub const DEFAULT_CLUSTER_KEY: &str = "default";

/// Snapshot of a cluster's job listing.
///
/// Stored as `status.<cluster>.toml` in the cache directory:
///
/// ```toml
/// cluster = "default"
/// fetched_at = "2025-03-01T10:00:00Z"
/// next_refresh = "2025-03-01T10:00:42Z"
///
/// [listing]
/// "1001" = "RUNNING"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub cluster: String,
    pub fetched_at: DateTime<Utc>,
    pub next_refresh: DateTime<Utc>,
    #[serde(default)]
    pub listing: Listing,
}

impl CacheEntry {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.next_refresh
    }

    pub fn read(path: &Path) -> Result<Option<CacheEntry>> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let entry = toml::from_str(&text)
                    .with_context(|| format!("parsing cache file {:?}", path))?;
                Ok(Some(entry))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading cache file {:?}", path)),
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("serializing cache entry")
    }
}

/// Normalized key for a cluster selector, safe to embed in a file name.
///
/// Named clusters get a `c-` prefix so none can collide with
/// [`DEFAULT_CLUSTER_KEY`]. ASCII letters, digits and `-` are kept. Every
/// other byte is written as `_xx` (lowercase hex), which keeps the mapping
/// injective.
pub fn cluster_key(cluster: Option<&str>) -> String {
    match cluster.map(str::trim).filter(|c| !c.is_empty()) {
        None => DEFAULT_CLUSTER_KEY.to_string(),
        Some(name) => {
            let mut key = String::with_capacity(name.len() + 2);
            key.push_str("c-");
            for byte in name.bytes() {
                if byte.is_ascii_alphanumeric() || byte == b'-' {
                    key.push(char::from(byte));
                } else {
                    key.push_str(&format!("_{byte:02x}"));
                }
            }
            key
        }
    }
}

pub fn entry_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("status.{key}.toml"))
}

pub fn lock_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("status.{key}.lock"))
}
