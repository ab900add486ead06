//! Runtime configuration: process-level knobs that are not part of the
//! on-disk vault format, sourced from `GHOSTVAULT_*` environment variables
//! with sensible defaults (`spec.md` §6).

use std::path::PathBuf;

use crate::kdf::SALT_LEN;
use crate::limiter::{DEFAULT_LOCKOUT_SECONDS, DEFAULT_MAX_ATTEMPTS};
use crate::triage::TimingParams;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub vault_root: PathBuf,
    /// Where the attempt limiter's persistent state lives. Deliberately a
    /// separate field from `vault_root`, not derived from it: the whole
    /// point of C7 is that it survives the vault root being erased by the
    /// panic executor (`spec.md` §4.7).
    pub attempts_path: PathBuf,
    pub attempts_max: u32,
    pub lockout_seconds: u64,
    pub triage_floor_ms: u64,
    pub triage_jitter_ms: u64,
    pub kdf_target_ms: u64,
    pub kdf_mem_cap_mb: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            vault_root: home.join(".ghostvault").join("vault"),
            attempts_path: home.join(".ghostvault").join("attempts"),
            attempts_max: DEFAULT_MAX_ATTEMPTS,
            lockout_seconds: DEFAULT_LOCKOUT_SECONDS,
            triage_floor_ms: 900,
            triage_jitter_ms: 300,
            kdf_target_ms: 500,
            kdf_mem_cap_mb: 128,
        }
    }
}

impl RuntimeConfig {
    /// Build a config from defaults, overriding each field whose
    /// `GHOSTVAULT_*` variable is set and parses. Unparsable values are
    /// ignored rather than treated as fatal, since a bad env var should not
    /// block opening the vault.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("GHOSTVAULT_VAULT_ROOT") {
            cfg.vault_root = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("GHOSTVAULT_ATTEMPTS_PATH") {
            cfg.attempts_path = PathBuf::from(v);
        }
        if let Some(v) = parse_env("GHOSTVAULT_ATTEMPTS_MAX") {
            cfg.attempts_max = v;
        }
        if let Some(v) = parse_env("GHOSTVAULT_LOCKOUT_SECONDS") {
            cfg.lockout_seconds = v;
        }
        if let Some(v) = parse_env("GHOSTVAULT_TRIAGE_FLOOR_MS") {
            cfg.triage_floor_ms = v;
        }
        if let Some(v) = parse_env("GHOSTVAULT_TRIAGE_JITTER_MS") {
            cfg.triage_jitter_ms = v;
        }
        if let Some(v) = parse_env("GHOSTVAULT_KDF_TARGET_MS") {
            cfg.kdf_target_ms = v;
        }
        if let Some(v) = parse_env("GHOSTVAULT_KDF_MEM_CAP_MB") {
            cfg.kdf_mem_cap_mb = v;
        }

        cfg
    }

    pub fn timing_params(&self) -> TimingParams {
        TimingParams { floor_ms: self.triage_floor_ms, jitter_ms: self.triage_jitter_ms }
    }

    pub fn salt_len(&self) -> usize {
        SALT_LEN
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_values() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.attempts_max, 5);
        assert_eq!(cfg.lockout_seconds, 300);
        assert_eq!(cfg.triage_floor_ms, 900);
        assert_eq!(cfg.triage_jitter_ms, 300);
    }

    #[test]
    fn env_override_parses_and_applies() {
        std::env::set_var("GHOSTVAULT_ATTEMPTS_MAX", "9");
        let cfg = RuntimeConfig::from_env();
        assert_eq!(cfg.attempts_max, 9);
        std::env::remove_var("GHOSTVAULT_ATTEMPTS_MAX");
    }

    #[test]
    fn unparsable_env_value_falls_back_to_default() {
        std::env::set_var("GHOSTVAULT_ATTEMPTS_MAX", "not-a-number");
        let cfg = RuntimeConfig::from_env();
        assert_eq!(cfg.attempts_max, 5);
        std::env::remove_var("GHOSTVAULT_ATTEMPTS_MAX");
    }
}
