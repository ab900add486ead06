//! Key hierarchy (C4): VMK/DVMK generation, wrapping, unwrapping, verifiers.
//!
//! The Panic slot structurally has no wrapped object — this is the
//! cryptographic guarantee (not a policy choice enforced elsewhere) that a
//! correct panic password can never yield plaintext. See `spec.md` §3, §4.4.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::aead;
use crate::error::Result;
use crate::kdf::{self, KdfParams};
use crate::secret::SecretBuffer;

pub const VERIFIER_LEN: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotSet {
    pub v_master: [u8; VERIFIER_LEN],
    pub w_master: Vec<u8>,
    pub v_panic: [u8; VERIFIER_LEN],
    pub v_decoy: [u8; VERIFIER_LEN],
    pub w_decoy: Vec<u8>,
}

/// Output of first setup: the two master keys in memory plus the persisted
/// slot set. Callers MUST zeroize `vmk`/`dvmk` once they are done seeding the
/// vault — they are returned as `SecretBuffer` specifically so scope exit
/// takes care of it.
pub struct SetupOutput {
    pub vmk: SecretBuffer,
    pub dvmk: SecretBuffer,
    pub slots: SlotSet,
}

fn verifier(kek: &SecretBuffer) -> [u8; VERIFIER_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(kek.as_slice());
    let digest = hasher.finalize();
    let mut out = [0u8; VERIFIER_LEN];
    out.copy_from_slice(&digest);
    out
}

/// Generate VMK + DVMK, derive the three KEKs under a shared `params`, and
/// produce the persisted slot set. All three passwords are consumed as
/// canonical byte slices; no KEK, VMK, or DVMK escapes this function except
/// through the returned `SecretBuffer`s.
pub fn setup(
    master_password: &[u8],
    panic_password: &[u8],
    decoy_password: &[u8],
    params: &KdfParams,
) -> Result<SetupOutput> {
    let vmk = SecretBuffer::from_vec(aead::random_bytes::<{ aead::KEY_LEN }>().to_vec());
    let dvmk = SecretBuffer::from_vec(aead::random_bytes::<{ aead::KEY_LEN }>().to_vec());

    let kek_m = kdf::derive(master_password, params)?;
    let kek_p = kdf::derive(panic_password, params)?;
    let kek_d = kdf::derive(decoy_password, params)?;

    let v_master = verifier(&kek_m);
    let v_panic = verifier(&kek_p);
    let v_decoy = verifier(&kek_d);

    let kek_m_arr = key_bytes(&kek_m);
    let kek_d_arr = key_bytes(&kek_d);
    let vmk_arr = key_bytes(&vmk);
    let dvmk_arr = key_bytes(&dvmk);

    let w_master = aead::encrypt(&kek_m_arr, &vmk_arr, b"vmk");
    let w_decoy = aead::encrypt(&kek_d_arr, &dvmk_arr, b"dvmk");

    Ok(SetupOutput {
        vmk,
        dvmk,
        slots: SlotSet {
            v_master,
            w_master,
            v_panic,
            v_decoy,
            w_decoy,
        },
    })
}

/// Re-derive KEK_M, check its verifier, and unwrap the VMK. Returns
/// `Tampered`/auth-failure style errors closed (never partial plaintext) —
/// callers should generally route password checks through [`crate::triage`]
/// instead of calling this directly, since this function alone has no
/// timing-parity guarantees.
pub fn unwrap_vmk(password: &[u8], slots: &SlotSet, params: &KdfParams) -> Result<SecretBuffer> {
    let kek = kdf::derive(password, params)?;
    let kek_arr = key_bytes(&kek);
    let plain = aead::decrypt(&kek_arr, &slots.w_master, b"vmk", "config")?;
    Ok(SecretBuffer::from_vec(plain))
}

pub fn unwrap_dvmk(password: &[u8], slots: &SlotSet, params: &KdfParams) -> Result<SecretBuffer> {
    let kek = kdf::derive(password, params)?;
    let kek_arr = key_bytes(&kek);
    let plain = aead::decrypt(&kek_arr, &slots.w_decoy, b"dvmk", "config")?;
    Ok(SecretBuffer::from_vec(plain))
}

pub fn verifier_for(password: &[u8], params: &KdfParams) -> Result<[u8; VERIFIER_LEN]> {
    let kek = kdf::derive(password, params)?;
    Ok(verifier(&kek))
}

fn key_bytes(buf: &SecretBuffer) -> [u8; aead::KEY_LEN] {
    let mut out = [0u8; aead::KEY_LEN];
    out.copy_from_slice(buf.as_slice());
    out
}
