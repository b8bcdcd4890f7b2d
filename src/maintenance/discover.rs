// src/maintenance/discover.rs

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::fs::FileSystem;
use crate::joblog::LOG_FILE;

/// Job logs found under a set of roots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    /// Log paths, sorted and without duplicates.
    pub logs: Vec<PathBuf>,
    /// Roots that could not be searched.
    pub warnings: Vec<String>,
}

/// Recursively collect every job log under `roots` (`.` when empty).
///
/// Symbolic links below a root are skipped.
pub fn discover_logs(fs: &dyn FileSystem, roots: &[PathBuf]) -> Discovery {
    let default_root = [PathBuf::from(".")];
    let roots = if roots.is_empty() { &default_root[..] } else { roots };

    let mut discovery = Discovery::default();
    for root in roots {
        if !fs.exists(root) {
            discovery.warnings.push(format!("path {} does not exist", root.display()));
            continue;
        }
        if !fs.is_dir(root) {
            discovery.warnings.push(format!("path {} is not a directory", root.display()));
            continue;
        }
        walk(fs, root, &mut discovery.logs);
    }

    discovery.logs.sort();
    discovery.logs.dedup();
    debug!(count = discovery.logs.len(), "discovered job logs");
    discovery
}

fn walk(fs: &dyn FileSystem, dir: &Path, logs: &mut Vec<PathBuf>) {
    let entries = match fs.read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = ?dir, error = %e, "skipping unreadable directory");
            return;
        }
    };
    for entry in entries {
        // Links could alias or loop back into the tree.
        if fs.is_symlink(&entry) {
            debug!(path = ?entry, "not following symlink");
            continue;
        }
        if fs.is_dir(&entry) {
            walk(fs, &entry, logs);
        } else if entry.file_name().is_some_and(|n| n == LOG_FILE) {
            logs.push(entry);
        }
    }
}
