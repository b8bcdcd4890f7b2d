// src/digest.rs

//! Input digests for `jobwait wait` when the caller does not supply one.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::debug;

/// Compute the hash of a single file.
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut file =
        File::open(path).with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Digest over the names and contents of `paths`.
///
/// Order and duplicates do not matter. Renaming an input changes the digest,
/// and so does a missing input (it is an error).
pub fn compute_input_digest<I, P>(paths: I) -> Result<String>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut paths: Vec<PathBuf> = paths
        .into_iter()
        .map(|p| p.as_ref().to_path_buf())
        .collect();
    paths.sort();
    paths.dedup();

    let mut hasher = Hasher::new();
    for path in &paths {
        let file_hash = compute_file_hash(path)?;
        hasher.update(path.to_string_lossy().as_bytes());
        hasher.update(b"\0");
        hasher.update(file_hash.as_bytes());
        hasher.update(b"\n");
    }

    let digest = hasher.finalize().to_hex().to_string();
    debug!(inputs = paths.len(), digest = %digest, "computed input digest");
    Ok(digest)
}
