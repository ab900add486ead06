//! Config store (C6): versioned, length-prefixed, CRC-guarded binary record
//! holding the KDF parameters and the three password slots.
//!
//! Layout (`spec.md` §6): `magic | version | kdf_tag(1) | salt_len(2) | salt
//! | kdf_cost_fields(12) | V_M(32) | W_M_len(4) | W_M | V_P(32) | V_D(32) |
//! W_D_len(4) | W_D | CRC32`.

use std::path::{Path, PathBuf};

use crate::atomic_io;
use crate::error::{Result, VaultError};
use crate::kdf::{KdfAlgorithm, KdfParams};
use crate::key_hierarchy::{SlotSet, VERIFIER_LEN};

const MAGIC: &[u8; 4] = b"GVC1";
const VERSION: u16 = 1;

const TAG_ARGON2ID: u8 = 0;
const TAG_PBKDF2: u8 = 1;

pub fn config_path(root: &Path) -> PathBuf {
    root.join("config")
}

pub fn config_backup_path(root: &Path) -> PathBuf {
    root.join("config.bak")
}

pub fn salt_path(root: &Path) -> PathBuf {
    root.join(".salt")
}

#[derive(Debug, Clone)]
pub struct ConfigRecord {
    pub kdf_params: KdfParams,
    pub slots: SlotSet,
}

#[derive(Debug)]
pub enum ConfigState {
    Missing,
    Valid(ConfigRecord),
    CorruptedRecoverable(ConfigRecord),
    CorruptedFatal,
}

fn encode(record: &ConfigRecord) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&VERSION.to_le_bytes());

    let tag = match record.kdf_params.algorithm {
        KdfAlgorithm::Argon2id => TAG_ARGON2ID,
        KdfAlgorithm::Pbkdf2HmacSha256 => TAG_PBKDF2,
    };
    buf.push(tag);

    let salt = &record.kdf_params.salt;
    buf.extend_from_slice(&(salt.len() as u16).to_le_bytes());
    buf.extend_from_slice(salt);

    match tag {
        TAG_ARGON2ID => {
            buf.extend_from_slice(&record.kdf_params.memory_kib.to_le_bytes());
            buf.extend_from_slice(&record.kdf_params.time_cost.to_le_bytes());
            buf.extend_from_slice(&record.kdf_params.parallelism.to_le_bytes());
        }
        _ => {
            buf.extend_from_slice(&record.kdf_params.pbkdf2_iterations.to_le_bytes());
            buf.extend_from_slice(&0u32.to_le_bytes());
            buf.extend_from_slice(&0u32.to_le_bytes());
        }
    }

    buf.extend_from_slice(&record.slots.v_master);
    buf.extend_from_slice(&(record.slots.w_master.len() as u32).to_le_bytes());
    buf.extend_from_slice(&record.slots.w_master);

    buf.extend_from_slice(&record.slots.v_panic);
    buf.extend_from_slice(&record.slots.v_decoy);

    buf.extend_from_slice(&(record.slots.w_decoy.len() as u32).to_le_bytes());
    buf.extend_from_slice(&record.slots.w_decoy);

    let crc = crc32fast::hash(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    buf
}

fn decode(bytes: &[u8]) -> std::result::Result<ConfigRecord, &'static str> {
    if bytes.len() < 4 {
        return Err("too short for magic");
    }
    let (body, crc_bytes) = bytes.split_at(bytes.len() - 4);
    if crc_bytes.len() != 4 {
        return Err("missing crc trailer");
    }
    let stored_crc = u32::from_le_bytes(crc_bytes.try_into().unwrap());
    if crc32fast::hash(body) != stored_crc {
        return Err("crc mismatch");
    }

    let mut pos = 0usize;
    let take = |pos: &mut usize, n: usize| -> std::result::Result<&[u8], &'static str> {
        if body.len() < *pos + n {
            return Err("truncated record");
        }
        let slice = &body[*pos..*pos + n];
        *pos += n;
        Ok(slice)
    };

    if take(&mut pos, 4)? != MAGIC {
        return Err("bad magic");
    }
    let version = u16::from_le_bytes(take(&mut pos, 2)?.try_into().unwrap());
    if version != VERSION {
        return Err("unsupported version");
    }
    let tag = take(&mut pos, 1)?[0];
    let salt_len = u16::from_le_bytes(take(&mut pos, 2)?.try_into().unwrap()) as usize;
    let salt = take(&mut pos, salt_len)?.to_vec();

    let field_a = u32::from_le_bytes(take(&mut pos, 4)?.try_into().unwrap());
    let field_b = u32::from_le_bytes(take(&mut pos, 4)?.try_into().unwrap());
    let field_c = u32::from_le_bytes(take(&mut pos, 4)?.try_into().unwrap());

    let kdf_params = match tag {
        TAG_ARGON2ID => KdfParams::new_argon2id(salt, field_a, field_b, field_c),
        TAG_PBKDF2 => KdfParams::new_pbkdf2(salt, field_a),
        _ => return Err("unknown kdf tag"),
    };

    let v_master: [u8; VERIFIER_LEN] = take(&mut pos, VERIFIER_LEN)?.try_into().unwrap();
    let w_master_len = u32::from_le_bytes(take(&mut pos, 4)?.try_into().unwrap()) as usize;
    let w_master = take(&mut pos, w_master_len)?.to_vec();

    let v_panic: [u8; VERIFIER_LEN] = take(&mut pos, VERIFIER_LEN)?.try_into().unwrap();
    let v_decoy: [u8; VERIFIER_LEN] = take(&mut pos, VERIFIER_LEN)?.try_into().unwrap();

    let w_decoy_len = u32::from_le_bytes(take(&mut pos, 4)?.try_into().unwrap()) as usize;
    let w_decoy = take(&mut pos, w_decoy_len)?.to_vec();

    Ok(ConfigRecord {
        kdf_params,
        slots: SlotSet { v_master, w_master, v_panic, v_decoy, w_decoy },
    })
}

/// Load the config for `root`, falling back to `config.bak` exactly once on
/// CRC/structural failure (`spec.md` §4.6, §7). No silent rewrite: a
/// successful fallback leaves `config` untouched until the next explicit
/// `save_atomic`.
pub fn load(root: &Path) -> ConfigState {
    let path = config_path(root);
    atomic_io::cleanup_stale_tmp(&path);

    let primary = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(_) => return ConfigState::Missing,
    };

    match decode(&primary) {
        Ok(record) => ConfigState::Valid(record),
        Err(_) => match std::fs::read(config_backup_path(root)) {
            Ok(backup_bytes) => match decode(&backup_bytes) {
                Ok(record) => ConfigState::CorruptedRecoverable(record),
                Err(_) => ConfigState::CorruptedFatal,
            },
            Err(_) => ConfigState::CorruptedFatal,
        },
    }
}

/// Persist `record` atomically, then copy the freshly-written config over
/// `config.bak` so the next generation always has a one-step-back fallback.
pub fn save_atomic(root: &Path, record: &ConfigRecord) -> Result<()> {
    let bytes = encode(record);
    let path = config_path(root);
    atomic_io::write_atomic(&path, &bytes)?;
    std::fs::write(config_backup_path(root), &bytes)?;
    std::fs::write(salt_path(root), &record.kdf_params.salt)?;
    Ok(())
}

pub fn validate(bytes: &[u8]) -> bool {
    decode(bytes).is_ok()
}

impl From<&'static str> for VaultError {
    fn from(msg: &'static str) -> Self {
        VaultError::Serialization(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_hierarchy::setup;

    fn sample_record() -> ConfigRecord {
        let params = KdfParams::new_argon2id(vec![5u8; 16], 8 * 1024, 1, 1);
        let out = setup(b"master", b"panic", b"decoy", &params).unwrap();
        ConfigRecord { kdf_params: params, slots: out.slots }
    }

    #[test]
    fn encode_decode_roundtrip() {
        let record = sample_record();
        let bytes = encode(&record);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.slots.v_master, record.slots.v_master);
        assert_eq!(decoded.slots.w_master, record.slots.w_master);
    }

    #[test]
    fn crc_mismatch_is_rejected() {
        let record = sample_record();
        let mut bytes = encode(&record);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn load_missing_config_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load(dir.path()), ConfigState::Missing));
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let record = sample_record();
        save_atomic(dir.path(), &record).unwrap();
        match load(dir.path()) {
            ConfigState::Valid(loaded) => assert_eq!(loaded.slots.v_master, record.slots.v_master),
            other => panic!("expected Valid, got {other:?}"),
        }
    }

    #[test]
    fn corrupted_primary_recovers_from_backup() {
        let dir = tempfile::tempdir().unwrap();
        let record = sample_record();
        save_atomic(dir.path(), &record).unwrap();
        // Corrupt only the primary; backup stays intact.
        let mut bytes = std::fs::read(config_path(dir.path())).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        std::fs::write(config_path(dir.path()), &bytes).unwrap();

        match load(dir.path()) {
            ConfigState::CorruptedRecoverable(loaded) => {
                assert_eq!(loaded.slots.v_master, record.slots.v_master)
            }
            other => panic!("expected CorruptedRecoverable, got {other:?}"),
        }
    }

    #[test]
    fn corrupted_primary_and_backup_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let record = sample_record();
        save_atomic(dir.path(), &record).unwrap();
        for p in [config_path(dir.path()), config_backup_path(dir.path())] {
            let mut bytes = std::fs::read(&p).unwrap();
            let last = bytes.len() - 1;
            bytes[last] ^= 0xFF;
            std::fs::write(&p, &bytes).unwrap();
        }
        assert!(matches!(load(dir.path()), ConfigState::CorruptedFatal));
    }
}
