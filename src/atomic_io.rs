//! Write-temp, fsync, rename helper shared by the config store, metadata
//! store, and file codec — the one crash-atomicity primitive everything
//! else in this crate is built on top of (`spec.md` P5).

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::error::Result;
use crate::fslock::{FileLock, LockMode};

/// Atomically replace the contents of `path` with `bytes`: write to a
/// sibling `.tmp` file, `fsync` it, then `rename` over `path`. A rename on
/// the same filesystem is atomic, so a crash at any point leaves `path`
/// either fully in its old state or fully in its new one — never torn.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let lock_path = FileLock::lock_path_for_io(path);
    let _lock = FileLock::acquire(&lock_path, LockMode::Exclusive)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = tmp_path_for(path);
    {
        let mut tmp = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&tmp_path)?;
        tmp.write_all(bytes)?;
        tmp.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    fsync_parent(path)?;
    Ok(())
}

/// Remove any stray `.tmp` file left behind by an interrupted
/// [`write_atomic`] call. Safe to call on every open — a `.tmp` file never
/// represents a committed state.
pub fn cleanup_stale_tmp(path: &Path) {
    let tmp_path = tmp_path_for(path);
    let _ = fs::remove_file(tmp_path);
}

pub fn tmp_path_for(path: &Path) -> std::path::PathBuf {
    let mut p = path.as_os_str().to_os_string();
    p.push(".tmp");
    std::path::PathBuf::from(p)
}

fn fsync_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}
