//! Vault orchestrator (C10) and decoy vault facade (C11).
//!
//! A single `Orchestrator` owns a vault root and dispatches `setup`/`open`
//! against it. `open` runs password triage once and returns a session
//! carrying whichever master key (VMK or DVMK) the triage result selected —
//! the decoy facade is deliberately not a separate type, since every
//! operation it offers (list/get/put/delete/rename) is identical to the
//! real vault's, just scoped to a different key and a different metadata
//! blob (`spec.md` §4.11: "behaves identically to C10 from the caller's
//! perspective").

use std::path::PathBuf;
use std::sync::RwLock;

use crate::config::{self, ConfigRecord, ConfigState};
use crate::file_codec;
use crate::filler::FillerSource;
use crate::error::{Result, VaultError};
use crate::kdf;
use crate::key_hierarchy;
use crate::limiter::AttemptLimiter;
use crate::metadata::{FileInfo, MetadataIndex};
use crate::observer::{NullObserver, VaultObserver};
use crate::panic_executor::{self, ExecutionMode};
use crate::runtime_config::RuntimeConfig;
use crate::triage::{self, TriageResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Real,
    Decoy,
}

pub struct Orchestrator {
    root: PathBuf,
    runtime: RuntimeConfig,
    observer: Box<dyn VaultObserver>,
    filler: Box<dyn FillerSource>,
}

impl Orchestrator {
    pub fn new(root: PathBuf, runtime: RuntimeConfig) -> Self {
        Self { root, runtime, observer: Box::new(NullObserver), filler: Box::new(crate::filler::PlaceholderFillerSource) }
    }

    pub fn with_observer(mut self, observer: Box<dyn VaultObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_filler(mut self, filler: Box<dyn FillerSource>) -> Self {
        self.filler = filler;
        self
    }

    /// Create a fresh vault at `self.root`: benchmark KDF cost, generate the
    /// key hierarchy under the three passwords, persist the config record,
    /// and seed the decoy vault's metadata/files from the filler source.
    /// Errors with `AlreadyExists` if a config is already present, since
    /// setup is explicitly a one-time operation (`spec.md` §4.10).
    pub fn setup(&self, master_password: &[u8], panic_password: &[u8], decoy_password: &[u8]) -> Result<()> {
        if matches!(config::load(&self.root), ConfigState::Valid(_) | ConfigState::CorruptedRecoverable(_)) {
            return Err(VaultError::AlreadyExists("vault config".into()));
        }

        let params = kdf::benchmark(self.runtime.kdf_target_ms, self.runtime.kdf_mem_cap_mb);
        let setup_out = key_hierarchy::setup(master_password, panic_password, decoy_password, &params)?;

        config::save_atomic(&self.root, &ConfigRecord { kdf_params: params, slots: setup_out.slots })?;

        // Seed the decoy side with cover files so a Decoy-password open on a
        // brand-new vault is never visibly empty next to a real vault that
        // has content.
        let dvmk_arr = into_key_array(setup_out.dvmk.as_slice())?;
        let mut decoy_index = MetadataIndex::new_empty();
        for (mut info, body) in self.filler.seed() {
            let outcome = file_codec::put(&self.root, &dvmk_arr, &body)?;
            info.file_id = outcome.file_id;
            info.size = outcome.size;
            info.sha256 = outcome.sha256;
            decoy_index.insert(info);
        }
        crate::metadata::save_atomic(&self.root, &dvmk_arr, &decoy_index)?;

        tracing::info!(root = %self.root.display(), "vault setup completed");
        Ok(())
    }

    /// Run password triage against the attempt limiter and, on a Master or
    /// Decoy result, open a [`VaultSession`]. A Panic result runs the panic
    /// executor to completion and returns `Err(PanicCompleted)` rather than
    /// exiting the process directly, so this crate stays embeddable and
    /// testable; translating `PanicCompleted` into `std::process::exit` is
    /// the CLI's job, not this library's.
    pub fn open(&self, password: &[u8]) -> Result<VaultSession> {
        let mut limiter = AttemptLimiter::load(self.limiter_path(), self.runtime.attempts_max, self.runtime.lockout_seconds);
        limiter.check()?;

        let state = config::load(&self.root);
        // `ConfigState::Missing` is surfaced as `ConfigMissing` directly,
        // before triage ever runs: timing parity exists to hide *which*
        // password was wrong against a vault that exists (spec.md §4.5, P3),
        // not to disguise the literal absence of a vault, which spec.md §8
        // scenario 3 requires to surface distinctly after a panic wipe.
        if matches!(state, ConfigState::Missing) {
            return Err(VaultError::ConfigMissing);
        }
        let (slots, params) = match &state {
            ConfigState::Valid(record) | ConfigState::CorruptedRecoverable(record) => {
                (Some(&record.slots), Some(&record.kdf_params))
            }
            ConfigState::Missing => unreachable!("handled above"),
            ConfigState::CorruptedFatal => return Err(VaultError::ConfigCorruptedFatal),
        };

        let outcome = triage::classify(password, slots, params, self.runtime.timing_params())?;
        self.observer.on_pre_unlock(outcome);
        tracing::debug!(?outcome, "password triage classified attempt");

        let (slots, params) = match (slots, params) {
            (Some(s), Some(p)) => (s, p),
            _ => unreachable!("Missing was handled above; Valid/CorruptedRecoverable always carry slots+params"),
        };

        match outcome {
            TriageResult::Master => {
                limiter.register_success()?;
                let vmk = key_hierarchy::unwrap_vmk(password, slots, params)?;
                let session = self.open_session(SessionMode::Real, into_key_array(vmk.as_slice())?)?;
                tracing::info!("vault opened in real mode");
                Ok(session)
            }
            TriageResult::Decoy => {
                limiter.register_success()?;
                let dvmk = key_hierarchy::unwrap_dvmk(password, slots, params)?;
                let key = into_key_array(dvmk.as_slice())?;
                let mut session = self.open_session(SessionMode::Decoy, key)?;
                self.refresh_decoy(&mut session)?;
                tracing::info!("vault opened in decoy mode");
                Ok(session)
            }
            TriageResult::Panic => {
                limiter.register_success()?;
                tracing::warn!("panic password accepted, running destructive erasure");
                let report = panic_executor::execute(&self.root, ExecutionMode::Live, self.observer.as_ref());
                debug_assert!(report.crypto_erasure_succeeded(), "panic crypto erasure must not silently fail");
                Err(VaultError::PanicCompleted)
            }
            TriageResult::Invalid => {
                limiter.register_failure()?;
                Err(VaultError::AuthInvalid)
            }
        }
    }

    fn open_session(&self, mode: SessionMode, key: [u8; kdf::KEY_LEN]) -> Result<VaultSession> {
        let index = crate::metadata::load(&self.root, &key)?;
        Ok(VaultSession {
            root: self.root.clone(),
            mode,
            key,
            index: RwLock::new(index),
            observer: self.observer_ref(),
        })
    }

    fn refresh_decoy(&self, session: &mut VaultSession) -> Result<()> {
        let added = {
            let index = session.index.read().expect("metadata lock poisoned");
            self.filler.refresh(&index)
        };
        if added.is_empty() {
            return Ok(());
        }
        let mut index = session.index.write().expect("metadata lock poisoned");
        for (mut info, body) in added {
            let outcome = file_codec::put(&self.root, &session.key, &body)?;
            info.file_id = outcome.file_id;
            info.size = outcome.size;
            info.sha256 = outcome.sha256;
            index.insert(info);
        }
        crate::metadata::save_atomic(&self.root, &session.key, &index)
    }

    fn limiter_path(&self) -> PathBuf {
        self.runtime.attempts_path.clone()
    }

    fn observer_ref(&self) -> &dyn VaultObserver {
        self.observer.as_ref()
    }
}

/// An open vault, real or decoy. Closing drops `key`, which is a plain
/// `[u8; 32]` here rather than a `SecretBuffer` — the session wipes it
/// explicitly in `close()` and in `Drop`, since a bare array has no
/// zeroize-on-drop of its own.
pub struct VaultSession<'a> {
    root: PathBuf,
    mode: SessionMode,
    key: [u8; kdf::KEY_LEN],
    index: RwLock<MetadataIndex>,
    observer: &'a dyn VaultObserver,
}

impl<'a> VaultSession<'a> {
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn list(&self) -> Vec<FileInfo> {
        self.index.read().expect("metadata lock poisoned").list()
    }

    pub fn get(&self, name: &str) -> Result<Vec<u8>> {
        let file_id = {
            let index = self.index.read().expect("metadata lock poisoned");
            index.get(name).ok_or_else(|| VaultError::NotFound(name.to_string()))?.file_id
        };
        file_codec::get(&self.root, &self.key, &file_id)
    }

    pub fn put(&self, name: &str, body: &[u8], category: &str) -> Result<()> {
        {
            let index = self.index.read().expect("metadata lock poisoned");
            if index.contains(name) {
                return Err(VaultError::AlreadyExists(name.to_string()));
            }
        }
        let outcome = file_codec::put(&self.root, &self.key, body)?;
        let now = crate::metadata::now_unix_ms();
        let info = FileInfo {
            file_id: outcome.file_id,
            name: name.to_string(),
            size: outcome.size,
            sha256: outcome.sha256,
            created_unix_ms: now,
            modified_unix_ms: now,
            category: category.to_string(),
        };
        let mut index = self.index.write().expect("metadata lock poisoned");
        index.insert(info);
        crate::metadata::save_atomic(&self.root, &self.key, &index)
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        let file_id = {
            let mut index = self.index.write().expect("metadata lock poisoned");
            let info = index.remove(name).ok_or_else(|| VaultError::NotFound(name.to_string()))?;
            crate::metadata::save_atomic(&self.root, &self.key, &index)?;
            info.file_id
        };
        file_codec::delete(&self.root, &file_id)
    }

    pub fn rename(&self, old: &str, new: &str) -> Result<()> {
        let mut index = self.index.write().expect("metadata lock poisoned");
        index.rename(old, new).ok_or_else(|| VaultError::AlreadyExists(new.to_string()))?;
        crate::metadata::save_atomic(&self.root, &self.key, &index)
    }

    /// Flush metadata and wipe the active key. After `close()`, every method
    /// on this session that touches `self.key` is still callable (there is
    /// no type-state lock-out) but will operate against a zeroed key, so
    /// treat `close()` as consuming in practice.
    pub fn close(mut self) -> Result<()> {
        self.observer.on_post_lock();
        self.wipe_key();
        tracing::debug!(mode = ?self.mode, "vault session closed");
        Ok(())
    }

    fn wipe_key(&mut self) {
        use zeroize::Zeroize;
        self.key.zeroize();
    }
}

impl<'a> Drop for VaultSession<'a> {
    fn drop(&mut self) {
        self.wipe_key();
    }
}

fn into_key_array(bytes: &[u8]) -> Result<[u8; kdf::KEY_LEN]> {
    bytes
        .try_into()
        .map_err(|_| VaultError::InvalidArgument("derived key has unexpected length".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_runtime(root: PathBuf) -> RuntimeConfig {
        let attempts_path = root.join(".attempts");
        RuntimeConfig {
            vault_root: root,
            attempts_path,
            attempts_max: 5,
            lockout_seconds: 300,
            triage_floor_ms: 0,
            triage_jitter_ms: 0,
            kdf_target_ms: 1,
            kdf_mem_cap_mb: 8,
        }
    }

    fn orchestrator_at(dir: &std::path::Path) -> Orchestrator {
        Orchestrator::new(dir.to_path_buf(), fast_runtime(dir.to_path_buf()))
    }

    #[test]
    fn setup_then_open_with_master_grants_real_session() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator_at(dir.path());
        orch.setup(b"master-pw", b"panic-pw", b"decoy-pw").unwrap();

        let session = orch.open(b"master-pw").unwrap();
        assert_eq!(session.mode(), SessionMode::Real);
        assert!(session.list().is_empty());
    }

    #[test]
    fn open_with_decoy_password_returns_seeded_decoy_session() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator_at(dir.path());
        orch.setup(b"master-pw", b"panic-pw", b"decoy-pw").unwrap();

        let session = orch.open(b"decoy-pw").unwrap();
        assert_eq!(session.mode(), SessionMode::Decoy);
        assert!(!session.list().is_empty());
    }

    #[test]
    fn open_with_panic_password_destroys_vault_and_returns_panic_completed() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator_at(dir.path());
        orch.setup(b"master-pw", b"panic-pw", b"decoy-pw").unwrap();

        let err = orch.open(b"panic-pw").unwrap_err();
        assert!(matches!(err, VaultError::PanicCompleted));
        assert!(!dir.path().exists());
    }

    #[test]
    fn put_then_get_roundtrips_through_a_real_session() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator_at(dir.path());
        orch.setup(b"master-pw", b"panic-pw", b"decoy-pw").unwrap();
        let session = orch.open(b"master-pw").unwrap();

        session.put("diary.txt", b"dear diary", "document").unwrap();
        assert_eq!(session.get("diary.txt").unwrap(), b"dear diary");
        assert_eq!(session.list().len(), 1);
    }

    #[test]
    fn wrong_password_repeated_five_times_locks_out() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator_at(dir.path());
        orch.setup(b"master-pw", b"panic-pw", b"decoy-pw").unwrap();

        for _ in 0..5 {
            assert!(orch.open(b"nonsense").is_err());
        }
        let err = orch.open(b"nonsense").unwrap_err();
        assert!(matches!(err, VaultError::AuthLocked { .. }));
    }

    #[test]
    fn open_with_no_vault_present_returns_config_missing() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator_at(dir.path());
        let err = orch.open(b"anything").unwrap_err();
        assert!(matches!(err, VaultError::ConfigMissing));
    }

    #[test]
    fn setup_twice_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator_at(dir.path());
        orch.setup(b"master-pw", b"panic-pw", b"decoy-pw").unwrap();
        assert!(matches!(orch.setup(b"a", b"b", b"c"), Err(VaultError::AlreadyExists(_))));
    }
}
