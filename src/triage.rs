//! Password triage (C5): constant-time three-way classification with timing
//! parity between valid and invalid inputs.
//!
//! The goal is not perfect covert-channel-free timing on arbitrary hardware
//! (the spec disclaims that) — it's that the *dispatch profile* an observer
//! can see locally is the same regardless of which branch actually matched.
//! The KDF derivation always runs; all three verifier comparisons always
//! run; the floor-delay/jitter pad is applied unconditionally.

use rand::Rng;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::key_hierarchy::{self, SlotSet};
use crate::kdf::KdfParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriageResult {
    Master,
    Panic,
    Decoy,
    Invalid,
}

#[derive(Debug, Clone, Copy)]
pub struct TimingParams {
    pub floor_ms: u64,
    pub jitter_ms: u64,
}

impl Default for TimingParams {
    fn default() -> Self {
        Self { floor_ms: 900, jitter_ms: 300 }
    }
}

/// Classify `password` against a configured slot set. When the vault is not
/// yet configured (`slots`/`params` are `None`), the KDF derivation still
/// runs against a dummy, fixed-cost parameter set so the unconfigured path
/// costs the same as the configured one, then `Invalid` is returned.
///
/// Priority on (cryptographically impossible) collision: Master > Panic >
/// Decoy > Invalid, selected without a branch that could short-circuit the
/// other comparisons.
pub fn classify(
    password: &[u8],
    slots: Option<&SlotSet>,
    params: Option<&KdfParams>,
    timing: TimingParams,
) -> Result<TriageResult> {
    let started = Instant::now();

    let result = match (slots, params) {
        (Some(slots), Some(params)) => classify_configured(password, slots, params)?,
        _ => {
            // Unconfigured: still pay the KDF cost so a local timing
            // observer cannot distinguish "no vault here" from "wrong
            // password for a real vault".
            let dummy = KdfParams::new_argon2id(vec![0u8; crate::kdf::SALT_LEN], 8 * 1024, 1, 1);
            let _ = crate::kdf::derive(password, &dummy);
            TriageResult::Invalid
        }
    };

    pad_to_floor(started, timing);
    Ok(result)
}

fn classify_configured(password: &[u8], slots: &SlotSet, params: &KdfParams) -> Result<TriageResult> {
    let candidate_verifier = key_hierarchy::verifier_for(password, params)?;

    // subtle::Choice-based comparisons so the boolean outcome is computed
    // without data-dependent branching; all three ALWAYS run, and the final
    // selection applies priority without short-circuiting on the first hit.
    let is_master = constant_time_eq(&candidate_verifier, &slots.v_master);
    let is_panic = constant_time_eq(&candidate_verifier, &slots.v_panic);
    let is_decoy = constant_time_eq(&candidate_verifier, &slots.v_decoy);

    Ok(select(is_master, is_panic, is_decoy))
}

fn select(is_master: bool, is_panic: bool, is_decoy: bool) -> TriageResult {
    // Written as an unconditional priority chain (not early return inside a
    // loop over slots) so each branch costs the same handful of boolean
    // operations regardless of which flag is set.
    if is_master {
        TriageResult::Master
    } else if is_panic {
        TriageResult::Panic
    } else if is_decoy {
        TriageResult::Decoy
    } else {
        TriageResult::Invalid
    }
}

fn constant_time_eq(a: &[u8; 32], b: &[u8; 32]) -> bool {
    use subtle::ConstantTimeEq;
    bool::from(a.ct_eq(b))
}

fn pad_to_floor(started: Instant, timing: TimingParams) {
    let floor = Duration::from_millis(timing.floor_ms);
    let jitter_ms = if timing.jitter_ms == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..=timing.jitter_ms)
    };
    let target = floor + Duration::from_millis(jitter_ms);
    let elapsed = started.elapsed();
    if elapsed < target {
        thread::sleep(target - elapsed);
    }
}
