//! GhostVault: a single-user encrypted file vault with plausible-deniability
//! panic and decoy modes. See the module-level docs on each component for
//! the on-disk formats and invariants; this file only wires them together.

pub mod aead;
pub mod atomic_io;
pub mod config;
pub mod error;
pub mod file_codec;
pub mod filler;
pub mod fslock;
pub mod kdf;
pub mod key_hierarchy;
pub mod limiter;
pub mod metadata;
pub mod observer;
pub mod orchestrator;
pub mod panic_executor;
pub mod runtime_config;
pub mod secret;
pub mod triage;

pub use error::{Result, VaultError};
pub use orchestrator::{Orchestrator, SessionMode, VaultSession};
pub use runtime_config::RuntimeConfig;
