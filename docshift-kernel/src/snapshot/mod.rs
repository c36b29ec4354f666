// ABOUTME: Content-hash-addressed snapshot store with atomic writes
// ABOUTME: Snapshot names carry their own integrity check; reads verify it

pub mod gc;

pub use gc::GcReport;

use crate::atomic::atomic_write;
use docshift_core::{KernelResult, MigrationError, SchemaVersion};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Filename suffix every snapshot carries.
pub const SNAPSHOT_SUFFIX: &str = ".snapshot.json";

/// Hex digest of SHA-256 over the given bytes.
pub fn content_hash_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// First eight lowercase hex characters of the SHA-256 digest; the prefix
/// embedded in snapshot names. Integrity only, not a security boundary.
pub fn short_hash(bytes: &[u8]) -> String {
    content_hash_hex(bytes)[..8].to_string()
}

/// Parsed components of a snapshot filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotNameParts {
    pub source_stem: String,
    pub version: SchemaVersion,
    pub hash8: String,
}

/// Basename of a source identifier with its final extension stripped.
pub fn source_stem(source_id: &str) -> String {
    Path::new(source_id)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| source_id.to_string())
}

/// Deterministic snapshot name: `<stem>.v<version>.<hash8>.snapshot.json`.
pub fn snapshot_name(source_id: &str, version: &SchemaVersion, content: &[u8]) -> String {
    format!(
        "{}.v{}.{}{}",
        source_stem(source_id),
        version,
        short_hash(content),
        SNAPSHOT_SUFFIX
    )
}

/// Parse a snapshot filename back into its components. Any deviation from
/// the canonical pattern is an integrity failure.
pub fn parse_snapshot_name(name: &str) -> KernelResult<SnapshotNameParts> {
    let malformed = || {
        MigrationError::SnapshotIntegrity(format!(
            "snapshot name '{name}' does not match '<stem>.v<version>.<hash8>{SNAPSHOT_SUFFIX}'"
        ))
    };

    let trunk = name.strip_suffix(SNAPSHOT_SUFFIX).ok_or_else(malformed)?;
    let (rest, hash8) = trunk.rsplit_once('.').ok_or_else(malformed)?;
    if hash8.len() != 8
        || !hash8
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
    {
        return Err(malformed());
    }

    // The version itself contains dots, so scan for the rightmost ".v"
    // whose tail parses as a version and leaves a non-empty stem.
    for (index, _) in rest.rmatch_indices(".v") {
        if index == 0 {
            continue;
        }
        if let Ok(version) = rest[index + 2..].parse::<SchemaVersion>() {
            return Ok(SnapshotNameParts {
                source_stem: rest[..index].to_string(),
                version,
                hash8: hash8.to_string(),
            });
        }
    }
    Err(malformed())
}

/// Directory-rooted store of integrity-checked snapshots.
///
/// Names are content-addressed, so re-creating an identical snapshot is a
/// no-op overwrite and two concurrent writers of the same destination
/// produce identical bytes.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Persist snapshot content atomically and return its name. On error
    /// the destination is never created.
    pub async fn create(
        &self,
        source_id: &str,
        content: &[u8],
        version: &SchemaVersion,
    ) -> KernelResult<String> {
        let name = snapshot_name(source_id, version, content);
        atomic_write(&self.path_of(&name), content).await?;
        debug!(snapshot = %name, bytes = content.len(), "snapshot created");
        Ok(name)
    }

    /// Read a snapshot and verify its content against the hash embedded in
    /// its name. Mismatch or a malformed name is an integrity failure.
    pub async fn read_and_verify(&self, name: &str) -> KernelResult<Vec<u8>> {
        let parts = parse_snapshot_name(name)?;
        let bytes = tokio::fs::read(self.path_of(name)).await.map_err(|e| {
            MigrationError::SnapshotIntegrity(format!("snapshot '{name}' unreadable: {e}"))
        })?;

        let actual = short_hash(&bytes);
        if actual != parts.hash8 {
            return Err(MigrationError::SnapshotIntegrity(format!(
                "snapshot '{name}' content hash {actual} does not match its name"
            )));
        }
        Ok(bytes)
    }

    pub async fn delete(&self, name: &str) -> KernelResult<()> {
        tokio::fs::remove_file(self.path_of(name)).await?;
        debug!(snapshot = %name, "snapshot deleted");
        Ok(())
    }

    /// Names of all snapshots in the store belonging to the given source.
    pub async fn list_for_source(&self, source_id: &str) -> KernelResult<Vec<String>> {
        let stem = source_stem(source_id);
        let mut names = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Ok(parts) = parse_snapshot_name(&name) {
                if parts.source_stem == stem {
                    names.push(name);
                }
            }
        }
        names.sort();
        Ok(names)
    }
}
