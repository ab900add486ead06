//! Observer hooks (C14): optional, secret-blind notifications for embedding
//! applications. None of these hooks ever receive key material, passwords,
//! or plaintext file contents — only the fact that an event occurred.

use crate::triage::TriageResult;

/// Observes vault lifecycle events. All methods have no-op default bodies so
/// an embedder can implement only what it needs. Object-safe so a vault can
/// hold `Box<dyn VaultObserver>`.
pub trait VaultObserver: Send + Sync {
    /// Called after password triage classifies an attempt but before the
    /// corresponding action (unlock/decoy/panic) runs.
    fn on_pre_unlock(&self, _outcome: TriageResult) {}

    /// Called after a vault (real or decoy) has been locked/closed.
    fn on_post_lock(&self) {}

    /// Called immediately before the panic executor begins erasure. This is
    /// the last observable moment before the vault's key material and
    /// config are destroyed.
    fn on_pre_panic(&self) {}
}

/// Observer that does nothing; the default when an embedder registers none.
pub struct NullObserver;

impl VaultObserver for NullObserver {}
