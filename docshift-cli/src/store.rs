// ABOUTME: File-backed document store: bundle loading and result persistence
// ABOUTME: Snapshots live beside their documents and are verified on read

use async_trait::async_trait;
use docshift_core::{
    read_wire_document, write_wire_document, DataMigrationResult, DocumentBundle, DocumentMeta,
    FailedMigration, KernelResult, MigrationError, QuarantineRecord, SchemaVersion, Snapshot,
    VersionedDocument,
};
use docshift_kernel::atomic::atomic_write;
use docshift_kernel::snapshot::{content_hash_hex, parse_snapshot_name, SnapshotStore};
use docshift_kernel::{DocumentSink, MigrationRegistry, ShapeValidator};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// How strictly bundles load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// For planning: corrupt snapshots contribute their filename version
    /// so classification still sees the rollback history; shape
    /// validation is skipped.
    Planning,
    /// For execution: snapshots must verify and documents must conform to
    /// their registered shape. Violations fail the item.
    Execution,
}

/// Outcome of loading a batch of document files.
#[derive(Debug, Default)]
pub struct LoadedBundles {
    pub bundles: Vec<DocumentBundle>,
    pub failures: Vec<FailedMigration>,
}

/// Loads document bundles from disk and writes migration results back.
pub struct DocumentStore {
    registry: Arc<MigrationRegistry>,
    fallback_doc_type: String,
    validate_on_load: bool,
}

impl DocumentStore {
    pub fn new(registry: Arc<MigrationRegistry>, validate_on_load: bool) -> Self {
        let fallback_doc_type = registry
            .registered_doc_types()
            .first()
            .cloned()
            .unwrap_or_else(|| "Document".to_string());
        Self {
            registry,
            fallback_doc_type,
            validate_on_load,
        }
    }

    /// Load every path; documents that cannot be loaded become failures
    /// instead of aborting the batch.
    pub async fn load_bundles(&self, paths: &[PathBuf], mode: LoadMode) -> LoadedBundles {
        let mut loaded = LoadedBundles::default();
        for path in paths {
            match self.load_bundle(path, mode).await {
                Ok(bundle) => loaded.bundles.push(bundle),
                Err(failure) => {
                    warn!(
                        doc = %failure.id,
                        reason = ?failure.record.reason,
                        "document failed to load"
                    );
                    loaded.failures.push(*failure);
                }
            }
        }
        loaded
    }

    async fn load_bundle(
        &self,
        path: &Path,
        mode: LoadMode,
    ) -> Result<DocumentBundle, Box<FailedMigration>> {
        let id = path.to_string_lossy().into_owned();
        let unknown_meta =
            || DocumentMeta::new(&self.fallback_doc_type, SchemaVersion::major_minor(1, 0));

        let bytes = tokio::fs::read(path).await.map_err(|e| {
            failure(&id, Value::Null, unknown_meta(), "", MigrationError::from(e))
        })?;
        let content_hash = content_hash_hex(&bytes);

        let (data, meta) = read_wire_document(&bytes, &self.fallback_doc_type)
            .map_err(|e| failure(&id, Value::Null, unknown_meta(), &content_hash, e))?;

        if mode == LoadMode::Execution && self.validate_on_load {
            if let Ok(shape_id) = self.registry.shape_for(&meta.doc_type, &meta.schema_version) {
                let verdict = ShapeValidator::validate(&data, self.registry.shape(shape_id));
                if !verdict.passed {
                    return Err(failure(
                        &id,
                        data,
                        meta,
                        &content_hash,
                        MigrationError::SchemaValidation(verdict.details()),
                    ));
                }
            }
        }

        let snapshots = self
            .load_snapshots(path, &meta, mode)
            .await
            .map_err(|e| failure(&id, data.clone(), meta.clone(), &content_hash, e))?;

        let current = VersionedDocument::new(id.clone(), data.clone(), meta.clone());
        DocumentBundle::new(current, snapshots)
            .map_err(|e| failure(&id, data, meta, &content_hash, e))
    }

    async fn load_snapshots(
        &self,
        path: &Path,
        meta: &DocumentMeta,
        mode: LoadMode,
    ) -> KernelResult<Vec<Snapshot>> {
        let dir = parent_dir(path);
        let store = SnapshotStore::new(dir);
        let source = file_name_of(path);

        let mut snapshots = Vec::new();
        for name in store.list_for_source(&source).await? {
            match store.read_and_verify(&name).await {
                Ok(bytes) => {
                    let (data, snapshot_meta) = read_wire_document(&bytes, &meta.doc_type)?;
                    snapshots.push(Snapshot::new(data, snapshot_meta));
                }
                Err(err) => match mode {
                    LoadMode::Execution => return Err(err),
                    LoadMode::Planning => {
                        // Classification only needs the version, which the
                        // filename still carries.
                        let Ok(parts) = parse_snapshot_name(&name) else {
                            warn!(snapshot = %name, "unparseable snapshot name skipped");
                            continue;
                        };
                        debug!(snapshot = %name, "corrupt snapshot counted for planning only");
                        snapshots.push(Snapshot::new(
                            Value::Null,
                            DocumentMeta::new(&meta.doc_type, parts.version),
                        ));
                    }
                },
            }
        }
        Ok(snapshots)
    }

    /// Persist one document's migration result: new snapshots first, then
    /// the document itself, then snapshot retirements.
    pub async fn apply_result(&self, id: &str, result: &DataMigrationResult) -> KernelResult<()> {
        let path = PathBuf::from(id);
        let store = SnapshotStore::new(parent_dir(&path));
        let source = file_name_of(&path);

        let existing = store.list_for_source(&source).await?;

        let mut created = HashSet::new();
        for snapshot in &result.snapshots_to_persist {
            let bytes = write_wire_document(&snapshot.data, &snapshot.meta)?;
            let name = store
                .create(&source, &bytes, &snapshot.meta.schema_version)
                .await?;
            created.insert(name);
        }

        let bytes = write_wire_document(&result.data, &result.new_meta)?;
        atomic_write(&path, &bytes).await?;

        for meta in &result.snapshots_to_delete {
            for name in &existing {
                if created.contains(name) {
                    continue;
                }
                if let Ok(parts) = parse_snapshot_name(name) {
                    if parts.version == meta.schema_version {
                        store.delete(name).await?;
                    }
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentSink for DocumentStore {
    async fn apply(&mut self, id: &str, result: &DataMigrationResult) -> KernelResult<()> {
        self.apply_result(id, result).await
    }
}

fn failure(
    id: &str,
    data: Value,
    meta: DocumentMeta,
    content_hash: &str,
    err: MigrationError,
) -> Box<FailedMigration> {
    let reason = err.quarantine_reason();
    Box::new(FailedMigration {
        id: id.to_string(),
        original_data: data,
        original_meta: meta,
        record: QuarantineRecord::new(id, reason, err.to_string(), content_hash),
    })
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
