//! Advisory file locking for shared on-disk resources (config, metadata,
//! attempt-limiter state). Best-effort on platforms without mandatory
//! locks; a failed acquisition aborts the caller's operation rather than
//! racing (`spec.md` §5 shared-resource policy).
//!
//! Grounded on the sibling vault crate's `flock`-based lock file pattern.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::{Result, VaultError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

pub struct FileLock {
    #[allow(dead_code)]
    file: File,
}

impl FileLock {
    pub fn acquire(path: &Path, mode: LockMode) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().read(true).write(true).create(true).open(path)?;
        lock(&file, mode, path)?;
        Ok(Self { file })
    }

    /// Derive the `.lock` sidecar path for a resource `atomic_io` is about
    /// to write. Kept as a method here (rather than a free function callers
    /// import from two places) so `atomic_io` only needs `FileLock` in
    /// scope.
    pub fn lock_path_for_io(path: &Path) -> PathBuf {
        lock_path_for(path)
    }
}

pub fn lock_path_for(target: &Path) -> PathBuf {
    let mut p = target.as_os_str().to_os_string();
    p.push(".lock");
    PathBuf::from(p)
}

#[cfg(unix)]
fn lock(file: &File, mode: LockMode, path: &Path) -> Result<()> {
    use std::os::unix::io::AsRawFd;
    let op = match mode {
        LockMode::Shared => libc::LOCK_SH,
        LockMode::Exclusive => libc::LOCK_EX,
    } | libc::LOCK_NB;
    let rc = unsafe { libc::flock(file.as_raw_fd(), op) };
    if rc == 0 {
        Ok(())
    } else {
        // LOCK_NB turns a contended lock into an immediate EWOULDBLOCK
        // rather than blocking the caller; either way a nonzero return
        // means the caller must abort instead of racing.
        Err(VaultError::LockFailed(path.display().to_string()))
    }
}

#[cfg(not(unix))]
fn lock(_file: &File, _mode: LockMode, _path: &Path) -> Result<()> {
    // Best-effort: no mandatory-lock primitive wired up for this platform.
    // The spec only promises advisory locking "best-effort on platforms
    // without mandatory locks" — succeeding unconditionally here matches
    // that contract rather than failing every operation on non-Unix hosts.
    Ok(())
}
