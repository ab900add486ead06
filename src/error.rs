use thiserror::Error;

/// Coarse severity banding for [`VaultError`], used by front-ends to decide
/// whether to surface a message, log it, or treat it as an incident.
///
/// Kept as a method rather than a struct field so the error enum itself stays
/// a flat match target (see `spec.md` §9 on replacing exception hierarchies
/// with tagged variants).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Fatal,
    SecurityCritical,
}

#[derive(Debug, Error)]
pub enum VaultError {
    /// Wrong password. Deliberately worded identically regardless of *why*
    /// the password was rejected (malformed vs. simply wrong) — see §7.
    #[error("authentication failed")]
    AuthInvalid,

    #[error("vault is locked, retry in {remaining_s}s")]
    AuthLocked { remaining_s: u64 },

    #[error("no vault configuration found at this root")]
    ConfigMissing,

    #[error("vault configuration corrupted, recovered from backup")]
    ConfigCorruptedRecoverable,

    #[error("vault configuration corrupted and no valid backup exists")]
    ConfigCorruptedFatal,

    #[error("no key derivation backend is available on this host")]
    KdfUnavailable,

    #[error("tampering detected in {0}")]
    Tampered(String),

    #[error("io failure: {0}")]
    IoFailure(#[from] std::io::Error),

    #[error("panic executor completed")]
    PanicCompleted,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("serialization failure: {0}")]
    Serialization(String),

    #[error("failed to acquire advisory lock on {0}")]
    LockFailed(String),
}

impl VaultError {
    pub fn severity(&self) -> Severity {
        use VaultError::*;
        match self {
            AuthInvalid | AuthLocked { .. } => Severity::Warn,
            ConfigMissing => Severity::Warn,
            ConfigCorruptedRecoverable => Severity::Warn,
            ConfigCorruptedFatal => Severity::Fatal,
            KdfUnavailable => Severity::Fatal,
            Tampered(_) => Severity::SecurityCritical,
            IoFailure(_) => Severity::Fatal,
            PanicCompleted => Severity::SecurityCritical,
            NotFound(_) | AlreadyExists(_) | InvalidArgument(_) => Severity::Info,
            Serialization(_) => Severity::Fatal,
            LockFailed(_) => Severity::Fatal,
        }
    }

    /// Exit codes from `spec.md` §6.
    pub fn exit_code(&self) -> u8 {
        use VaultError::*;
        match self {
            AuthInvalid => 2,
            AuthLocked { .. } => 3,
            ConfigMissing | ConfigCorruptedRecoverable | ConfigCorruptedFatal => 4,
            Tampered(_) => 5,
            PanicCompleted => 6,
            KdfUnavailable | IoFailure(_) | NotFound(_) | AlreadyExists(_)
            | InvalidArgument(_) | Serialization(_) | LockFailed(_) => 1,
        }
    }
}

impl From<serde_cbor::Error> for VaultError {
    fn from(e: serde_cbor::Error) -> Self {
        VaultError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, VaultError>;
