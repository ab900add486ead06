//! Decoy filler source (C13): produces the synthetic file set shown when a
//! Decoy password unlocks the vault. Pluggable so a caller can substitute
//! genuinely-meaningful cover documents instead of placeholders.

use crate::metadata::{FileInfo, MetadataIndex};

/// Supplies the contents of a freshly-created decoy vault. Implementations
/// never see the real VMK or real metadata; they only ever populate the
/// decoy side.
pub trait FillerSource {
    /// Produce the initial decoy file set at `setup` time.
    fn seed(&self) -> Vec<(FileInfo, Vec<u8>)>;

    /// Called when the decoy vault is opened, to let an implementation
    /// top up the cover story (e.g. add a plausibly-dated new file). The
    /// default implementation adds nothing.
    fn refresh(&self, _existing: &MetadataIndex) -> Vec<(FileInfo, Vec<u8>)> {
        Vec::new()
    }
}

/// Minimal `FillerSource` that seeds a couple of innocuous placeholder
/// documents. Good enough for tests and for a vault with no real cover
/// story configured.
pub struct PlaceholderFillerSource;

impl FillerSource for PlaceholderFillerSource {
    fn seed(&self) -> Vec<(FileInfo, Vec<u8>)> {
        let now = crate::metadata::now_unix_ms();
        let make = |name: &str, body: &[u8]| {
            use sha2::{Digest, Sha256};
            let mut hasher = Sha256::new();
            hasher.update(body);
            let digest = hasher.finalize();
            let mut sha256 = [0u8; 32];
            sha256.copy_from_slice(&digest);
            let info = FileInfo {
                file_id: crate::aead::random_bytes::<16>(),
                name: name.to_string(),
                size: body.len() as u64,
                sha256,
                created_unix_ms: now,
                modified_unix_ms: now,
                category: "document".to_string(),
            };
            (info, body.to_vec())
        };

        vec![
            make("shopping-list.txt", b"milk\neggs\nbread\n"),
            make("notes.txt", b"call plumber about the leak\n"),
        ]
    }
}
