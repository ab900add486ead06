//! Secret buffer (C1).
//!
//! Owns sensitive bytes end to end: every derived KEK, VMK/DVMK, and
//! in-memory password flows through this type rather than a bare `Vec<u8>`.
//! The single most important porting rule from `spec.md` §9: no finalizer
//! that "remembers" to wipe an array, just ownership whose `Drop` impl wipes
//! unconditionally, on every exit path including panic unwinding.

use rand::RngCore;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

/// A heap-backed buffer of secret bytes. Overwritten with random bytes and
/// then zeros on drop, regardless of how the buffer's scope was exited.
///
/// Deliberately has no `Debug`/`Display` impl that could leak contents into
/// a log line by accident.
pub struct SecretBuffer {
    bytes: Vec<u8>,
}

impl SecretBuffer {
    pub fn new(len: usize) -> Self {
        Self { bytes: vec![0u8; len] }
    }

    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Constant-time equality against an arbitrary byte slice. Lengths that
    /// differ are not short-circuited into an early `false`: the comparison
    /// still runs against a length-matched, always-false outcome so callers
    /// performing password triage (C5) observe uniform timing across
    /// mismatched-length and mismatched-content inputs alike.
    pub fn constant_time_eq(&self, other: &[u8]) -> bool {
        if self.bytes.len() != other.len() {
            let probe = vec![0u8; self.bytes.len()];
            let _ = bool::from(probe.as_slice().ct_eq(self.bytes.as_slice()));
            return false;
        }
        bool::from(self.bytes.as_slice().ct_eq(other))
    }

    /// Explicit early wipe. `Drop` performs the same wipe, so calling this is
    /// optional, but callers that want to clear a secret without waiting for
    /// scope exit (e.g. after an explicit logout) can use it.
    pub fn zeroize(&mut self) {
        wipe(&mut self.bytes);
    }

    pub fn try_into_array<const N: usize>(self) -> Result<[u8; N], Self> {
        if self.bytes.len() != N {
            return Err(self);
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes);
        Ok(out)
    }
}

impl Clone for SecretBuffer {
    fn clone(&self) -> Self {
        Self { bytes: self.bytes.clone() }
    }
}

impl std::fmt::Debug for SecretBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretBuffer({} bytes, REDACTED)", self.bytes.len())
    }
}

impl Drop for SecretBuffer {
    fn drop(&mut self) {
        wipe(&mut self.bytes);
    }
}

/// Paranoid wipe: a random pass followed by a zero pass, so a single
/// memory snapshot taken mid-wipe can't recover the original contents via
/// an `xor`-with-known-zero trick. Both passes are routed through
/// `zeroize::Zeroize` machinery where possible to resist dead-store
/// elimination.
fn wipe(bytes: &mut [u8]) {
    if bytes.is_empty() {
        return;
    }
    rand::thread_rng().fill_bytes(bytes);
    bytes.zeroize();
}

/// Fixed-size helper for the common case of a 32-byte key. Thin wrapper so
/// call sites that need array semantics (AEAD key material) don't have to
/// fallibly convert a `SecretBuffer` at every use.
pub struct SecretArray32([u8; 32]);

impl SecretArray32 {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn random() -> Self {
        let mut b = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut b);
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Clone for SecretArray32 {
    fn clone(&self) -> Self {
        Self(self.0)
    }
}

impl std::fmt::Debug for SecretArray32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretArray32(REDACTED)")
    }
}

impl Drop for SecretArray32 {
    fn drop(&mut self) {
        wipe(&mut self.0);
    }
}
