//! KDF engine (C2).
//!
//! Argon2id is the primary algorithm, matching the teacher crate. A
//! PBKDF2-HMAC-SHA256 fallback path (`spec.md` §4.2) is added for hosts where
//! Argon2's memory-hard path cannot be parameterized; at ≥ 600 000
//! iterations, matching current OWASP guidance for the family.

use argon2::{Algorithm, Argon2, Params, Version};
use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::{Duration, Instant};

use crate::error::{Result, VaultError};
use crate::secret::SecretBuffer;

pub const KEY_LEN: usize = 32;
pub const SALT_LEN: usize = 16;
pub const PBKDF2_MIN_ITERATIONS: u32 = 600_000;

const CONFIG_VERSION: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KdfAlgorithm {
    Argon2id,
    Pbkdf2HmacSha256,
}

/// Versioned, forwards-compatible KDF parameter record (`spec.md` §3).
/// A single instance is used to derive all three slot KEKs so the three
/// derivations are indistinguishable in timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdfParams {
    version: u16,
    pub algorithm: KdfAlgorithm,
    pub salt: Vec<u8>,
    pub memory_kib: u32,
    pub time_cost: u32,
    pub parallelism: u32,
    pub pbkdf2_iterations: u32,
}

impl KdfParams {
    pub fn new_argon2id(salt: Vec<u8>, memory_kib: u32, time_cost: u32, parallelism: u32) -> Self {
        Self {
            version: CONFIG_VERSION,
            algorithm: KdfAlgorithm::Argon2id,
            salt,
            memory_kib,
            time_cost,
            parallelism,
            pbkdf2_iterations: PBKDF2_MIN_ITERATIONS,
        }
    }

    pub fn new_pbkdf2(salt: Vec<u8>, iterations: u32) -> Self {
        Self {
            version: CONFIG_VERSION,
            algorithm: KdfAlgorithm::Pbkdf2HmacSha256,
            salt,
            memory_kib: 0,
            time_cost: 0,
            parallelism: 0,
            pbkdf2_iterations: iterations.max(PBKDF2_MIN_ITERATIONS),
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(serde_cbor::to_vec(self)?)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let params: Self = serde_cbor::from_slice(bytes)?;
        if params.salt.len() < SALT_LEN {
            return Err(VaultError::InvalidArgument("kdf salt too short".into()));
        }
        Ok(params)
    }
}

/// Probe the host and pick Argon2id cost parameters targeting roughly
/// `target_ms` per derivation, capped at `mem_cap_mb` MiB and parallelism 4.
/// Falls back to the PBKDF2 path if no Argon2id parameterization on this
/// host lands anywhere near the target within the memory cap.
pub fn benchmark(target_ms: u64, mem_cap_mb: u32) -> KdfParams {
    let salt = crate::aead::random_bytes::<SALT_LEN>().to_vec();
    let parallelism = 2u32.min(4);
    let mem_cap_kib = mem_cap_mb.min(128) * 1024;

    let mut memory_kib = 19_456u32.min(mem_cap_kib.max(8 * 1024));
    let mut time_cost = 2u32;

    for _ in 0..6 {
        let params = KdfParams::new_argon2id(salt.clone(), memory_kib, time_cost, parallelism);
        let start = Instant::now();
        let derived = derive(b"benchmark-probe", &params);
        let elapsed = start.elapsed();
        if derived.is_err() {
            break;
        }
        if elapsed >= Duration::from_millis(target_ms) {
            return params;
        }
        if memory_kib < mem_cap_kib {
            memory_kib = (memory_kib * 2).min(mem_cap_kib);
        } else {
            time_cost += 1;
        }
    }

    let params = KdfParams::new_argon2id(salt.clone(), memory_kib, time_cost, parallelism);
    if derive(b"benchmark-probe", &params).is_ok() {
        return params;
    }
    KdfParams::new_pbkdf2(salt, PBKDF2_MIN_ITERATIONS)
}

/// Derive a 32-byte KEK from `password` using `params`.
///
/// Invariant K1 (determinism): identical `(password, params)` always
/// produces byte-identical output — verifier-based triage depends on it.
/// The password is accepted as a borrowed byte slice (never an owned
/// `String`) so the caller retains responsibility for zeroizing its source
/// buffer; this function never allocates a copy of the password that
/// outlives the call.
pub fn derive(password: &[u8], params: &KdfParams) -> Result<SecretBuffer> {
    match params.algorithm {
        KdfAlgorithm::Argon2id => derive_argon2id(password, params),
        KdfAlgorithm::Pbkdf2HmacSha256 => Ok(derive_pbkdf2(password, params)),
    }
}

fn derive_argon2id(password: &[u8], params: &KdfParams) -> Result<SecretBuffer> {
    let argon2_params = Params::new(params.memory_kib, params.time_cost, params.parallelism, Some(KEY_LEN))
        .map_err(|_| VaultError::KdfUnavailable)?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut out = vec![0u8; KEY_LEN];
    argon2
        .hash_password_into(password, &params.salt, &mut out)
        .map_err(|_| VaultError::KdfUnavailable)?;
    Ok(SecretBuffer::from_vec(out))
}

fn derive_pbkdf2(password: &[u8], params: &KdfParams) -> SecretBuffer {
    let mut out = vec![0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password, &params.salt, params.pbkdf2_iterations, &mut out);
    SecretBuffer::from_vec(out)
}

/// Canonicalize a password to the fixed UTF-8 encoding the KDF contract
/// requires, zeroizing the caller's original representation is the
/// caller's responsibility (it owns a mutable buffer, never an immutable
/// `String`, per `spec.md` §4.2).
pub fn canonicalize_password(chars: &[char]) -> Vec<u8> {
    let mut buf = String::with_capacity(chars.len());
    for c in chars {
        buf.push(*c);
    }
    buf.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_params() -> KdfParams {
        KdfParams::new_argon2id(vec![7u8; SALT_LEN], 8 * 1024, 1, 1)
    }

    #[test]
    fn derive_is_deterministic() {
        let params = test_params();
        let a = derive(b"correct horse battery staple", &params).unwrap();
        let b = derive(b"correct horse battery staple", &params).unwrap();
        assert_eq!(a.as_slice(), b.as_slice());
    }

    #[test]
    fn derive_differs_across_passwords() {
        let params = test_params();
        let a = derive(b"password-one", &params).unwrap();
        let b = derive(b"password-two", &params).unwrap();
        assert_ne!(a.as_slice(), b.as_slice());
    }

    #[test]
    fn pbkdf2_fallback_meets_minimum_iterations() {
        let params = KdfParams::new_pbkdf2(vec![1u8; SALT_LEN], 10);
        assert!(params.pbkdf2_iterations >= PBKDF2_MIN_ITERATIONS);
    }

    #[test]
    fn serialize_roundtrip() {
        let params = test_params();
        let bytes = params.serialize().unwrap();
        let decoded = KdfParams::deserialize(&bytes).unwrap();
        assert_eq!(decoded.salt, params.salt);
        assert_eq!(decoded.memory_kib, params.memory_kib);
    }

    #[test]
    fn canonicalize_password_round_trips_utf8_chars() {
        let chars: Vec<char> = "correct horse battery staple".chars().collect();
        assert_eq!(canonicalize_password(&chars), b"correct horse battery staple".to_vec());
    }

    #[test]
    fn canonicalize_password_preserves_multibyte_chars() {
        let chars: Vec<char> = "pw-\u{1F512}".chars().collect();
        assert_eq!(canonicalize_password(&chars), "pw-\u{1F512}".as_bytes().to_vec());
    }
}
