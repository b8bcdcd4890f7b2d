// src/cache/lock.rs

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use tracing::trace;

/// Exclusive advisory lock on a cluster's cache lock file.
///
/// Held for the duration of one refresh; released on drop. The lock is an
/// `flock` on a dedicated file, so it is shared by every process on the host
/// (and by every `StatusCache` instance in this process).
#[derive(Debug)]
pub struct RefreshLock {
    path: PathBuf,
    _flock: Flock<File>,
}

impl RefreshLock {
    /// Try to take the lock without blocking.
    ///
    /// Returns `Ok(None)` when someone else holds it.
    pub fn try_acquire(path: &Path) -> Result<Option<RefreshLock>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating cache dir {:?}", parent))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .with_context(|| format!("opening lock file {:?}", path))?;

        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(flock) => {
                trace!(path = ?path, "refresh lock acquired");
                Ok(Some(RefreshLock {
                    path: path.to_path_buf(),
                    _flock: flock,
                }))
            }
            Err((_, errno)) if errno == Errno::EWOULDBLOCK => Ok(None),
            Err((_, errno)) => Err(std::io::Error::from(errno))
                .with_context(|| format!("locking {:?}", path)),
        }
    }
}

impl Drop for RefreshLock {
    fn drop(&mut self) {
        trace!(path = ?self.path, "refresh lock released");
    }
}
