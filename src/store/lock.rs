//! Advisory lockfile mutex with bounded wait and forced takeover.
//!
//! Locking is lockfile-existence based rather than OS-level file locking so
//! it behaves the same on every platform. A holder that crashed and left its
//! lockfile behind must not wedge the system: acquisition waits up to a
//! bounded timeout and then takes the lock over, accepting a theoretical
//! lost-update window in exchange for liveness.

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

/// How long acquisition waits before taking a held lock over.
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll interval while waiting for a held lock.
pub const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// RAII lockfile guard. The lockfile is removed on drop.
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
}

impl FileLock {
    /// Acquire the lock at `path` with the default timeout and poll interval.
    pub fn acquire(path: impl AsRef<Path>) -> std::io::Result<FileLock> {
        Self::acquire_with(path, LOCK_TIMEOUT, LOCK_POLL_INTERVAL)
    }

    /// Acquire with explicit timing. On timeout the lock is force-acquired:
    /// the stale lockfile is treated as free and the guard proceeds.
    pub fn acquire_with(
        path: impl AsRef<Path>,
        timeout: Duration,
        poll_interval: Duration,
    ) -> std::io::Result<FileLock> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let start = Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => break,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if start.elapsed() >= timeout {
                        log::warn!(
                            "lock {} held past {:?}, taking it over",
                            path.display(),
                            timeout
                        );
                        break;
                    }
                    thread::sleep(poll_interval);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(FileLock { path })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                log::warn!("failed to release lock {}: {}", self.path.display(), e);
            }
        }
    }
}
