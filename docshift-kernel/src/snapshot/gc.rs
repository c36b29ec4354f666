// ABOUTME: Garbage collection of obsolete snapshots
// ABOUTME: A snapshot is obsolete iff its version is at or below the live document's

use super::{parse_snapshot_name, SnapshotStore};
use docshift_core::{DocumentMeta, KernelResult};
use tracing::{info, warn};

/// Outcome of one GC pass over a document's snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcReport {
    pub examined: usize,
    pub deleted: Vec<String>,
    pub retained: usize,
    pub corrupt: Vec<String>,
}

impl GcReport {
    pub fn merge(&mut self, other: GcReport) {
        self.examined += other.examined;
        self.deleted.extend(other.deleted);
        self.retained += other.retained;
        self.corrupt.extend(other.corrupt);
    }

    pub fn log_summary(&self) {
        info!(
            examined = self.examined,
            deleted = self.deleted.len(),
            retained = self.retained,
            corrupt = self.corrupt.len(),
            "snapshot gc pass complete"
        );
        for name in &self.corrupt {
            warn!(snapshot = %name, "corrupt snapshot left in place");
        }
    }
}

impl SnapshotStore {
    /// Delete snapshots made obsolete by the live document state.
    ///
    /// Obsolete means `snapshot.version <= live.version`; anything above
    /// the live version is pre-rollback history and is always preserved.
    /// A snapshot that fails verification is never deleted, only reported.
    pub async fn collect_obsolete(
        &self,
        live: &DocumentMeta,
        snapshot_names: &[String],
    ) -> KernelResult<GcReport> {
        let mut report = GcReport::default();

        for name in snapshot_names {
            report.examined += 1;
            let Ok(parts) = parse_snapshot_name(name) else {
                report.corrupt.push(name.clone());
                continue;
            };
            if parts.version > live.schema_version {
                report.retained += 1;
                continue;
            }
            match self.read_and_verify(name).await {
                Ok(_) => {
                    self.delete(name).await?;
                    report.deleted.push(name.clone());
                }
                Err(_) => {
                    report.corrupt.push(name.clone());
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docshift_core::SchemaVersion;

    fn version(s: &str) -> SchemaVersion {
        s.parse().unwrap()
    }

    fn live(v: &str) -> DocumentMeta {
        DocumentMeta::new("PkgConf", version(v))
    }

    #[tokio::test]
    async fn test_gc_deletes_only_obsolete() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());

        let old = store.create("pkg.json", b"old", &version("1.0")).await.unwrap();
        let same = store.create("pkg.json", b"same", &version("2.0")).await.unwrap();
        let newer = store.create("pkg.json", b"newer", &version("3.0")).await.unwrap();

        let names = store.list_for_source("pkg.json").await.unwrap();
        let report = store.collect_obsolete(&live("2.0"), &names).await.unwrap();

        assert_eq!(report.examined, 3);
        assert!(report.deleted.contains(&old));
        assert!(report.deleted.contains(&same));
        assert_eq!(report.retained, 1);
        assert!(store.read_and_verify(&newer).await.is_ok());
        assert!(store.read_and_verify(&old).await.is_err());
    }

    #[tokio::test]
    async fn test_gc_never_deletes_pre_rollback_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());

        let critical = store.create("pkg.json", b"edits", &version("2.0")).await.unwrap();
        let names = store.list_for_source("pkg.json").await.unwrap();

        let report = store.collect_obsolete(&live("1.0"), &names).await.unwrap();
        assert!(report.deleted.is_empty());
        assert_eq!(report.retained, 1);
        assert!(store.read_and_verify(&critical).await.is_ok());
    }

    #[tokio::test]
    async fn test_gc_reports_corrupt_without_deleting() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());

        let name = store.create("pkg.json", b"data", &version("1.0")).await.unwrap();
        std::fs::write(store.path_of(&name), b"tampered").unwrap();

        let names = store.list_for_source("pkg.json").await.unwrap();
        let report = store.collect_obsolete(&live("2.0"), &names).await.unwrap();

        assert_eq!(report.corrupt, vec![name.clone()]);
        assert!(report.deleted.is_empty());
        assert!(store.path_of(&name).exists());
    }
}
