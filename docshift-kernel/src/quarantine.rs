// ABOUTME: Side storage for documents the kernel refuses to migrate
// ABOUTME: Moves the file aside and writes a structured diagnostic report next to it

use crate::atomic::atomic_write;
use docshift_core::{KernelResult, QuarantineRecord};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Result of a quarantine request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuarantineOutcome {
    /// The document was moved aside; the report lives at this path.
    Stored(PathBuf),
    /// No quarantine directory is configured; nothing was touched.
    Disabled,
}

/// File-system quarantine. Quarantined names embed the first eight hex
/// characters of the record's content hash for traceability.
#[derive(Debug, Clone)]
pub struct QuarantineStore {
    dir: Option<PathBuf>,
}

impl QuarantineStore {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    /// Move `source_path` into quarantine and write the report beside it.
    /// The write is awaited so the returned report path is deterministic.
    pub async fn quarantine(
        &self,
        source_path: &Path,
        record: &QuarantineRecord,
    ) -> KernelResult<QuarantineOutcome> {
        let Some(dir) = &self.dir else {
            return Ok(QuarantineOutcome::Disabled);
        };
        tokio::fs::create_dir_all(dir).await?;

        let quarantined_name = quarantined_file_name(source_path, &record.content_hash);
        let destination = dir.join(&quarantined_name);

        if tokio::fs::try_exists(source_path).await? {
            // Overwriting an identically named quarantined file is allowed.
            move_file(source_path, &destination).await?;
        } else {
            warn!(
                source = %source_path.display(),
                "quarantine source missing, writing report only"
            );
        }

        let report_path = dir.join(format!("{quarantined_name}.quarantine.json"));
        atomic_write(&report_path, &serde_json::to_vec_pretty(record)?).await?;

        info!(
            doc = %record.id,
            reason = ?record.reason,
            report = %report_path.display(),
            "document quarantined"
        );
        Ok(QuarantineOutcome::Stored(report_path))
    }
}

/// `<stem>.<hash8>.<extension>`, falling back to `json` when the source
/// has no extension and `00000000` when the record carries no hash.
fn quarantined_file_name(source_path: &Path, content_hash: &str) -> String {
    let stem = source_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let extension = source_path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "json".to_string());
    let hash8 = if content_hash.len() >= 8 {
        &content_hash[..8]
    } else {
        "00000000"
    };
    format!("{stem}.{hash8}.{extension}")
}

async fn move_file(from: &Path, to: &Path) -> KernelResult<()> {
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(_) => {
            // Rename fails across filesystems; fall back to copy + remove.
            tokio::fs::copy(from, to).await?;
            tokio::fs::remove_file(from).await?;
            Ok(())
        }
    }
}
