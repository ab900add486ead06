//! Metadata store (C9): a single AEAD-encrypted blob holding the sorted
//! filename -> file-record index. Mutations are copy-on-write: build a new
//! in-memory map, encrypt, write `metadata.tmp`, fsync, rename. One prior
//! generation is retained at `metadata.bak` (`spec.md` §4.9).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::aead;
use crate::atomic_io;
use crate::error::Result;

pub const META_AAD: &[u8] = b"meta";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub file_id: [u8; 16],
    pub name: String,
    pub size: u64,
    pub sha256: [u8; 32],
    pub created_unix_ms: u64,
    pub modified_unix_ms: u64,
    pub category: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataIndex {
    entries: BTreeMap<String, FileInfo>,
}

impl MetadataIndex {
    pub fn new_empty() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&FileInfo> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn list(&self) -> Vec<FileInfo> {
        self.entries.values().cloned().collect()
    }

    pub fn insert(&mut self, info: FileInfo) {
        self.entries.insert(info.name.clone(), info);
    }

    pub fn remove(&mut self, name: &str) -> Option<FileInfo> {
        self.entries.remove(name)
    }

    pub fn rename(&mut self, old: &str, new: &str) -> Option<()> {
        if self.entries.contains_key(new) {
            return None;
        }
        let mut info = self.entries.remove(old)?;
        info.name = new.to_string();
        self.entries.insert(new.to_string(), info);
        Some(())
    }
}

pub fn metadata_path(root: &Path) -> PathBuf {
    root.join("metadata")
}

pub fn metadata_backup_path(root: &Path) -> PathBuf {
    root.join("metadata.bak")
}

/// Decrypt and decode the metadata blob under `vmk`. A fresh, empty index is
/// returned if neither `metadata` nor `metadata.bak` exist yet (first boot
/// after setup); any AEAD failure on an existing blob surfaces as
/// `Tampered("meta")`.
pub fn load(root: &Path, vmk: &[u8; aead::KEY_LEN]) -> Result<MetadataIndex> {
    let path = metadata_path(root);
    atomic_io::cleanup_stale_tmp(&path);

    let bytes = match std::fs::read(&path) {
        Ok(b) => b,
        Err(_) => return Ok(MetadataIndex::new_empty()),
    };
    let plaintext = aead::decrypt(vmk, &bytes, META_AAD, "meta")?;
    Ok(serde_cbor::from_slice(&plaintext)?)
}

/// Encrypt and atomically persist `index`, retaining the previous
/// generation at `metadata.bak`.
pub fn save_atomic(root: &Path, vmk: &[u8; aead::KEY_LEN], index: &MetadataIndex) -> Result<()> {
    let plaintext = serde_cbor::to_vec(index)?;
    let ciphertext = aead::encrypt(vmk, &plaintext, META_AAD);

    let path = metadata_path(root);
    if let Ok(previous) = std::fs::read(&path) {
        let _ = std::fs::write(metadata_backup_path(root), previous);
    }
    atomic_io::write_atomic(&path, &ciphertext)
}

pub fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
