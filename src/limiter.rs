//! Attempt limiter (C7): persistent failed-attempt counter and lockout
//! state machine, stored outside the vault root so panic's erasure of the
//! vault cannot reset it (`spec.md` §4.7).

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::atomic_io;
use crate::error::{Result, VaultError};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_LOCKOUT_SECONDS: u64 = 300;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LimiterState {
    pub failed_count: u32,
    pub lockout_until_ms: u64,
}

impl Default for LimiterState {
    fn default() -> Self {
        Self { failed_count: 0, lockout_until_ms: 0 }
    }
}

pub struct AttemptLimiter {
    path: PathBuf,
    max_attempts: u32,
    lockout_seconds: u64,
    state: LimiterState,
}

impl AttemptLimiter {
    /// Default path per `spec.md` §6: `~/.ghostvault/attempts`, outside any
    /// vault root.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ghostvault")
            .join("attempts")
    }

    pub fn load(path: PathBuf, max_attempts: u32, lockout_seconds: u64) -> Self {
        let state = std::fs::read(&path)
            .ok()
            .and_then(|bytes| serde_cbor::from_slice(&bytes).ok())
            .unwrap_or_default();
        Self { path, max_attempts, lockout_seconds, state }
    }

    /// Check whether the limiter currently rejects attempts outright. When
    /// locked and the lockout window has elapsed, the state transitions to
    /// `Unlocked(0)` as a side effect, matching the table in `spec.md`
    /// §4.7 ("Locked(t), now≥t -> Unlocked(0), then classify").
    pub fn check(&mut self) -> Result<()> {
        let now = now_ms();
        if self.state.lockout_until_ms > now {
            let remaining_s = (self.state.lockout_until_ms - now) / 1000;
            return Err(VaultError::AuthLocked { remaining_s: remaining_s.max(1) });
        }
        if self.state.lockout_until_ms != 0 {
            self.state = LimiterState::default();
            self.persist()?;
        }
        Ok(())
    }

    /// Record an invalid password. Transitions to `Locked` once
    /// `failed_count` reaches `max_attempts`.
    pub fn register_failure(&mut self) -> Result<()> {
        self.state.failed_count += 1;
        if self.state.failed_count >= self.max_attempts {
            self.state.lockout_until_ms = now_ms() + self.lockout_seconds * 1000;
        }
        self.persist()
    }

    /// Record a valid Master/Decoy/Panic password: resets the counter.
    pub fn register_success(&mut self) -> Result<()> {
        self.state = LimiterState::default();
        self.persist()
    }

    pub fn state(&self) -> LimiterState {
        self.state
    }

    fn persist(&self) -> Result<()> {
        let bytes = serde_cbor::to_vec(&self.state)?;
        atomic_io::write_atomic(&self.path, &bytes)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(dir: &Path) -> AttemptLimiter {
        AttemptLimiter::load(dir.join("attempts"), 5, 300)
    }

    #[test]
    fn fifth_failure_locks_the_sixth_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let mut lim = limiter(dir.path());
        for _ in 0..5 {
            lim.check().unwrap();
            lim.register_failure().unwrap();
        }
        assert!(matches!(lim.check(), Err(VaultError::AuthLocked { .. })));
    }

    #[test]
    fn lockout_persists_across_reloads() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut lim = limiter(dir.path());
            for _ in 0..5 {
                lim.register_failure().unwrap();
            }
        }
        let mut reloaded = limiter(dir.path());
        assert!(matches!(reloaded.check(), Err(VaultError::AuthLocked { .. })));
    }

    #[test]
    fn success_resets_counter() {
        let dir = tempfile::tempdir().unwrap();
        let mut lim = limiter(dir.path());
        lim.register_failure().unwrap();
        lim.register_failure().unwrap();
        lim.register_success().unwrap();
        assert_eq!(lim.state().failed_count, 0);
    }

    #[test]
    fn lockout_expires_after_window() {
        let dir = tempfile::tempdir().unwrap();
        let mut lim = AttemptLimiter::load(dir.path().join("attempts"), 1, 0);
        lim.register_failure().unwrap();
        // lockout_seconds = 0, so lockout_until_ms is already in the past.
        assert!(lim.check().is_ok());
        assert_eq!(lim.state().failed_count, 0);
    }
}
