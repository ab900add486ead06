//! Panic executor (C12): irreversible destruction of the vault, run in five
//! ordered phases (`spec.md` §4.12). Phase 1 (crypto-erasure) is the only
//! phase that must succeed for the panic to be considered effective; every
//! later phase runs best-effort and failures there never unwind or retry an
//! earlier phase — there is no "undo" path once Phase 1 has committed.

use std::path::Path;

use crate::config;
use crate::file_codec;
use crate::metadata;
use crate::observer::VaultObserver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Actually perform destructive filesystem operations.
    Live,
    /// Walk every phase and report what would happen, without touching
    /// disk. Used by tooling that wants to preview a panic run.
    DryRun,
}

#[derive(Debug, Clone)]
pub struct PhaseResult {
    pub name: &'static str,
    pub ok: bool,
    pub detail: String,
}

#[derive(Debug, Clone, Default)]
pub struct PanicReport {
    pub phases: Vec<PhaseResult>,
}

impl PanicReport {
    /// Phase 1 (crypto-erasure) is the only phase whose failure means the
    /// panic did not achieve its goal; everything after it is cleanup.
    pub fn crypto_erasure_succeeded(&self) -> bool {
        self.phases.first().map(|p| p.ok).unwrap_or(false)
    }
}

/// Run the full panic sequence against `root`. Never returns `Err` for a
/// failure in phases 2-5: those are recorded in the returned `PanicReport`
/// instead, since a failed overwrite or a failed directory removal must not
/// prevent the caller from reporting Phase 1 (the part that actually
/// matters) as complete.
pub fn execute(root: &Path, mode: ExecutionMode, observer: &dyn VaultObserver) -> PanicReport {
    observer.on_pre_panic();

    let mut report = PanicReport::default();

    report.phases.push(phase_crypto_erasure(root, mode));
    report.phases.push(phase_metadata_delete(root, mode));
    report.phases.push(phase_physical_overwrite(root, mode));
    report.phases.push(phase_directory_teardown(root, mode));
    report.phases.push(phase_memory_zeroization(mode));

    report
}

/// Phase 1: destroy the config record (and its backup). Once both the
/// config and config.bak are gone, the wrapped VMK/DVMK are unrecoverable
/// even if every file body survives untouched on disk.
fn phase_crypto_erasure(root: &Path, mode: ExecutionMode) -> PhaseResult {
    if mode == ExecutionMode::DryRun {
        return PhaseResult { name: "crypto_erasure", ok: true, detail: "dry-run: would delete config + config.bak".into() };
    }

    let targets = [config::config_path(root), config::config_backup_path(root), config::salt_path(root)];
    let mut failures = Vec::new();
    for target in &targets {
        if let Err(e) = remove_best_effort(target) {
            failures.push(format!("{}: {e}", target.display()));
        }
    }

    // The config path itself is the one that must be gone for the phase to
    // count as successful; a lingering .bak without a primary still leaves
    // the keys unrecoverable (config.rs has no fallback-only load path).
    let config_gone = !config::config_path(root).exists();
    PhaseResult {
        name: "crypto_erasure",
        ok: config_gone,
        detail: if failures.is_empty() { "config destroyed".into() } else { failures.join("; ") },
    }
}

fn phase_metadata_delete(root: &Path, mode: ExecutionMode) -> PhaseResult {
    if mode == ExecutionMode::DryRun {
        return PhaseResult { name: "metadata_delete", ok: true, detail: "dry-run: would delete metadata + metadata.bak".into() };
    }
    let targets = [metadata::metadata_path(root), metadata::metadata_backup_path(root)];
    let mut failures = Vec::new();
    for target in &targets {
        if let Err(e) = remove_best_effort(target) {
            failures.push(format!("{}: {e}", target.display()));
        }
    }
    PhaseResult {
        name: "metadata_delete",
        ok: failures.is_empty(),
        detail: if failures.is_empty() { "metadata destroyed".into() } else { failures.join("; ") },
    }
}

/// Phase 3: best-effort random overwrite of every file body before unlink.
/// Explicitly best-effort: on copy-on-write or log-structured filesystems
/// this does not guarantee the old blocks are actually overwritten, but it
/// costs nothing to attempt and helps on plain filesystems.
fn phase_physical_overwrite(root: &Path, mode: ExecutionMode) -> PhaseResult {
    let dir = file_codec::files_dir(root);
    if !dir.exists() {
        return PhaseResult { name: "physical_overwrite", ok: true, detail: "no files directory".into() };
    }
    if mode == ExecutionMode::DryRun {
        return PhaseResult { name: "physical_overwrite", ok: true, detail: "dry-run: would overwrite + remove file bodies".into() };
    }

    let entries = match std::fs::read_dir(&dir) {
        Ok(e) => e,
        Err(e) => return PhaseResult { name: "physical_overwrite", ok: false, detail: e.to_string() },
    };

    let mut count = 0usize;
    let mut failures = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if let Err(e) = overwrite_and_remove(&path) {
            failures.push(format!("{}: {e}", path.display()));
        } else {
            count += 1;
        }
    }

    PhaseResult {
        name: "physical_overwrite",
        ok: failures.is_empty(),
        detail: if failures.is_empty() {
            format!("{count} file bodies overwritten and removed")
        } else {
            failures.join("; ")
        },
    }
}

fn phase_directory_teardown(root: &Path, mode: ExecutionMode) -> PhaseResult {
    if mode == ExecutionMode::DryRun {
        return PhaseResult { name: "directory_teardown", ok: true, detail: "dry-run: would remove vault root".into() };
    }
    for dir in [file_codec::files_dir(root), file_codec::quarantine_dir(root), root.to_path_buf()] {
        let _ = std::fs::remove_dir_all(&dir);
    }
    PhaseResult {
        name: "directory_teardown",
        ok: !root.exists(),
        detail: if root.exists() { "vault root not fully removed".into() } else { "vault root removed".into() },
    }
}

/// Phase 5: in-process zeroization is handled by the orchestrator dropping
/// its active `SecretBuffer`/`SecretArray32` key handles, which already
/// wipe on `Drop`. This phase just records that the caller must drop its
/// key handles now; there is nothing left for this module to zero.
fn phase_memory_zeroization(mode: ExecutionMode) -> PhaseResult {
    PhaseResult {
        name: "memory_zeroization",
        ok: true,
        detail: match mode {
            ExecutionMode::Live => "caller must drop active key handles".into(),
            ExecutionMode::DryRun => "dry-run: no in-process key material to drop".into(),
        },
    }
}

fn remove_best_effort(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn overwrite_and_remove(path: &Path) -> std::io::Result<()> {
    use std::io::{Seek, SeekFrom, Write};
    let len = std::fs::metadata(path)?.len();
    {
        let mut file = std::fs::OpenOptions::new().write(true).open(path)?;
        for _ in 0..3 {
            let mut buf = vec![0u8; len as usize];
            rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut buf);
            file.write_all(&buf)?;
            file.sync_all()?;
            file.seek(SeekFrom::Start(0))?;
        }
    }
    std::fs::remove_file(path)
}
