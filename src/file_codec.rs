//! File codec (C8): per-file wrapped DEK, atomic write, authenticated read.
//!
//! On-disk file record (`spec.md` §6): `magic(4) | version(1) | file_id(16)
//! | nonce(12) | wrapped_dek_len(4) | wrapped_dek(...) | ciphertext(...) |
//! tag(16)`. `nonce`/`tag` bracket the body ciphertext; `wrapped_dek` is
//! itself an opaque `nonce||ciphertext||tag` blob produced by
//! [`crate::aead::encrypt`], since wrapping the DEK is just another AEAD
//! call under the VMK.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::aead;
use crate::atomic_io;
use crate::error::{Result, VaultError};

const FILE_MAGIC: &[u8; 4] = b"GVF1";
const FILE_VERSION: u8 = 1;

pub fn files_dir(root: &Path) -> PathBuf {
    root.join("files")
}

pub fn quarantine_dir(root: &Path) -> PathBuf {
    root.join("quarantine")
}

fn file_id_hex(file_id: &[u8; 16]) -> String {
    file_id.iter().map(|b| format!("{b:02x}")).collect()
}

fn dek_aad(file_id: &[u8; 16]) -> Vec<u8> {
    let mut aad = b"dek:".to_vec();
    aad.extend_from_slice(file_id);
    aad
}

fn file_aad(file_id: &[u8; 16]) -> Vec<u8> {
    let mut aad = b"file:".to_vec();
    aad.extend_from_slice(file_id);
    aad
}

fn encode_record(file_id: &[u8; 16], wrapped_dek: &[u8], body: &[u8]) -> Vec<u8> {
    // `body` is nonce(12) || ciphertext || tag(16), the raw output of
    // `aead::encrypt`, which is exactly the trailing layout the spec's
    // header format calls for.
    let mut out = Vec::with_capacity(4 + 1 + 16 + 4 + wrapped_dek.len() + body.len());
    out.extend_from_slice(FILE_MAGIC);
    out.push(FILE_VERSION);
    out.extend_from_slice(file_id);
    out.extend_from_slice(&(wrapped_dek.len() as u32).to_le_bytes());
    out.extend_from_slice(wrapped_dek);
    out.extend_from_slice(body);
    out
}

struct DecodedRecord {
    file_id: [u8; 16],
    wrapped_dek: Vec<u8>,
    body: Vec<u8>,
}

fn decode_record(bytes: &[u8]) -> std::result::Result<DecodedRecord, ()> {
    if bytes.len() < 4 + 1 + 16 + 4 {
        return Err(());
    }
    if &bytes[0..4] != FILE_MAGIC {
        return Err(());
    }
    if bytes[4] != FILE_VERSION {
        return Err(());
    }
    let file_id: [u8; 16] = bytes[5..21].try_into().unwrap();
    let wrapped_dek_len = u32::from_le_bytes(bytes[21..25].try_into().unwrap()) as usize;
    let rest = &bytes[25..];
    if rest.len() < wrapped_dek_len {
        return Err(());
    }
    let wrapped_dek = rest[..wrapped_dek_len].to_vec();
    let body = rest[wrapped_dek_len..].to_vec();
    Ok(DecodedRecord { file_id, wrapped_dek, body })
}

pub struct PutOutcome {
    pub file_id: [u8; 16],
    pub size: u64,
    pub sha256: [u8; 32],
}

/// Encrypt and write `plaintext` as a new on-disk file record under `vmk`
/// (`spec.md` §4.8 write path, steps 1-4; the caller is responsible for step
/// 5, updating the metadata index, so this module stays metadata-agnostic).
pub fn put(root: &Path, vmk: &[u8; aead::KEY_LEN], plaintext: &[u8]) -> Result<PutOutcome> {
    let file_id = aead::random_bytes::<16>();
    let dek = aead::random_bytes::<{ aead::KEY_LEN }>();

    let wrapped_dek = aead::encrypt(vmk, &dek, &dek_aad(&file_id));
    let body = aead::encrypt(&dek, plaintext, &file_aad(&file_id));
    let record = encode_record(&file_id, &wrapped_dek, &body);

    let dir = files_dir(root);
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(file_id_hex(&file_id));
    atomic_io::write_atomic(&path, &record)?;

    let mut hasher = Sha256::new();
    hasher.update(plaintext);
    let digest = hasher.finalize();
    let mut sha256 = [0u8; 32];
    sha256.copy_from_slice(&digest);

    // `dek` is a plain stack array, not a SecretBuffer, so there is no
    // zeroize-on-drop here; wrap it explicitly to honor "zeroize DEK"
    // (step 6) rather than relying on the array simply falling out of scope.
    zeroize_key(dek);

    Ok(PutOutcome { file_id, size: plaintext.len() as u64, sha256 })
}

/// Decrypt the file record identified by `file_id`. Any AEAD failure
/// (wrong VMK, tampered body, tampered wrapped DEK) returns
/// `Tampered(file_id)` and the record is moved to `quarantine/` rather than
/// deleted, matching the "not auto-deleted" requirement in `spec.md` §4.8.
pub fn get(root: &Path, vmk: &[u8; aead::KEY_LEN], file_id: &[u8; 16]) -> Result<Vec<u8>> {
    let path = files_dir(root).join(file_id_hex(file_id));
    let bytes = std::fs::read(&path)?;
    let id_hex = file_id_hex(file_id);

    let decoded = match decode_record(&bytes) {
        Ok(d) => d,
        Err(_) => {
            quarantine(root, &path, &id_hex)?;
            return Err(VaultError::Tampered(id_hex));
        }
    };

    let dek_bytes = match aead::decrypt(vmk, &decoded.wrapped_dek, &dek_aad(&decoded.file_id), &id_hex) {
        Ok(d) => d,
        Err(e) => {
            quarantine(root, &path, &id_hex)?;
            return Err(e);
        }
    };
    let dek: [u8; aead::KEY_LEN] = dek_bytes
        .as_slice()
        .try_into()
        .map_err(|_| VaultError::Tampered(id_hex.clone()))?;

    let plaintext = match aead::decrypt(&dek, &decoded.body, &file_aad(&decoded.file_id), &id_hex) {
        Ok(p) => p,
        Err(e) => {
            quarantine(root, &path, &id_hex)?;
            return Err(e);
        }
    };

    Ok(plaintext)
}

/// Overwrite the on-disk file with random bytes (best-effort on
/// journaling/COW/SSD media — see `spec.md` §4.8) then unlink. Caller is
/// responsible for removing the corresponding metadata entry.
pub fn delete(root: &Path, file_id: &[u8; 16]) -> Result<()> {
    let path = files_dir(root).join(file_id_hex(file_id));
    best_effort_overwrite(&path)?;
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn quarantine(root: &Path, path: &Path, id_hex: &str) -> Result<()> {
    let dir = quarantine_dir(root);
    std::fs::create_dir_all(&dir)?;
    let dest = dir.join(id_hex);
    if path.exists() {
        std::fs::rename(path, dest)?;
    }
    Ok(())
}

fn best_effort_overwrite(path: &Path) -> Result<()> {
    let len = match std::fs::metadata(path) {
        Ok(m) => m.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new().write(true).open(path)?;
    for _ in 0..3 {
        let random = {
            let mut buf = vec![0u8; len as usize];
            rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut buf);
            buf
        };
        file.write_all(&random)?;
        file.sync_all()?;
        use std::io::Seek;
        file.seek(std::io::SeekFrom::Start(0))?;
    }
    Ok(())
}

fn zeroize_key(mut key: [u8; aead::KEY_LEN]) {
    use zeroize::Zeroize;
    key.zeroize();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let vmk = aead::random_bytes::<{ aead::KEY_LEN }>();
        let outcome = put(dir.path(), &vmk, b"hello vault").unwrap();
        let plaintext = get(dir.path(), &vmk, &outcome.file_id).unwrap();
        assert_eq!(plaintext, b"hello vault");
    }

    #[test]
    fn tampered_body_is_quarantined_not_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let vmk = aead::random_bytes::<{ aead::KEY_LEN }>();
        let outcome = put(dir.path(), &vmk, b"secret").unwrap();
        let path = files_dir(dir.path()).join(file_id_hex(&outcome.file_id));
        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        std::fs::write(&path, &bytes).unwrap();

        let err = get(dir.path(), &vmk, &outcome.file_id).unwrap_err();
        assert!(matches!(err, VaultError::Tampered(_)));
        assert!(!path.exists());
        assert!(quarantine_dir(dir.path()).join(file_id_hex(&outcome.file_id)).exists());
    }

    #[test]
    fn unrelated_files_remain_readable_after_one_tamper() {
        let dir = tempfile::tempdir().unwrap();
        let vmk = aead::random_bytes::<{ aead::KEY_LEN }>();
        let a = put(dir.path(), &vmk, b"alpha").unwrap();
        let b = put(dir.path(), &vmk, b"beta").unwrap();

        let path_a = files_dir(dir.path()).join(file_id_hex(&a.file_id));
        let mut bytes = std::fs::read(&path_a).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        std::fs::write(&path_a, &bytes).unwrap();

        assert!(get(dir.path(), &vmk, &a.file_id).is_err());
        assert_eq!(get(dir.path(), &vmk, &b.file_id).unwrap(), b"beta");
    }

    #[test]
    fn deks_and_nonces_are_pairwise_distinct_across_puts() {
        let dir = tempfile::tempdir().unwrap();
        let vmk = aead::random_bytes::<{ aead::KEY_LEN }>();
        let mut nonces = std::collections::HashSet::new();
        for _ in 0..20 {
            let outcome = put(dir.path(), &vmk, b"x").unwrap();
            let path = files_dir(dir.path()).join(file_id_hex(&outcome.file_id));
            let bytes = std::fs::read(&path).unwrap();
            let decoded = decode_record(&bytes).unwrap();
            let body_nonce = decoded.body[..aead::NONCE_LEN].to_vec();
            assert!(nonces.insert(body_nonce), "body nonce reused across puts");
        }
    }

    #[test]
    fn delete_removes_file_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let vmk = aead::random_bytes::<{ aead::KEY_LEN }>();
        let outcome = put(dir.path(), &vmk, b"gone soon").unwrap();
        delete(dir.path(), &outcome.file_id).unwrap();
        assert!(get(dir.path(), &vmk, &outcome.file_id).is_err());
        // Deleting again must not error (NotFound is swallowed).
        delete(dir.path(), &outcome.file_id).unwrap();
    }
}
