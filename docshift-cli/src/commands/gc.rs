// ABOUTME: gc command: retire snapshots made obsolete by live document versions

use crate::cli::OutputFormat;
use crate::discovery::{discover_documents, Manifest};
use crate::output;
use crate::shapes;
use docshift_core::{read_wire_document, KernelResult};
use docshift_kernel::snapshot::SnapshotStore;
use docshift_kernel::GcReport;
use std::path::Path;
use tracing::warn;

pub async fn gc(manifest_path: &Path, format: OutputFormat) -> KernelResult<i32> {
    let registry = shapes::build_registry()?;
    let fallback = registry
        .registered_doc_types()
        .first()
        .cloned()
        .unwrap_or_else(|| "Document".to_string());

    let manifest = Manifest::load(manifest_path).await?;
    let base_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));
    let paths = discover_documents(&manifest, base_dir).await?;

    let mut total = GcReport::default();
    for path in &paths {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(doc = %path.display(), error = %e, "document unreadable, skipped by gc");
                continue;
            }
        };
        let (_, live_meta) = match read_wire_document(&bytes, &fallback) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(doc = %path.display(), error = %e, "document unparseable, skipped by gc");
                continue;
            }
        };

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let store = SnapshotStore::new(dir);
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let names = store.list_for_source(&source).await?;
        let report = store.collect_obsolete(&live_meta, &names).await?;
        total.merge(report);
    }

    total.log_summary();
    output::print_gc_report(&total, format)?;
    Ok(0)
}
