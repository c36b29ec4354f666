// ABOUTME: plan-upgrade and plan-rollback commands
// ABOUTME: Discover documents, classify them, serialize the plan

use super::write_json;
use crate::cli::OutputFormat;
use crate::discovery::{discover_documents, Manifest};
use crate::output;
use crate::shapes;
use crate::store::{DocumentStore, LoadMode};
use docshift_core::{KernelResult, MigrationError, SchemaVersion};
use docshift_kernel::MigrationPlanner;
use std::path::Path;
use tracing::warn;

async fn load_for_planning(
    manifest_path: &Path,
) -> KernelResult<(MigrationPlanner, Vec<docshift_core::DocumentBundle>)> {
    let registry = shapes::build_registry()?;
    let store = DocumentStore::new(registry.clone(), false);

    let manifest = Manifest::load(manifest_path).await?;
    let base_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));
    let paths = discover_documents(&manifest, base_dir).await?;

    let loaded = store.load_bundles(&paths, LoadMode::Planning).await;
    for failure in &loaded.failures {
        warn!(
            doc = %failure.id,
            details = %failure.record.details,
            "document unreadable, left out of the plan"
        );
    }

    Ok((MigrationPlanner::new(registry), loaded.bundles))
}

pub async fn plan_upgrade(
    manifest_path: &Path,
    out: &Path,
    format: OutputFormat,
) -> KernelResult<i32> {
    let (planner, bundles) = load_for_planning(manifest_path).await?;
    let plan = planner.plan_upgrade(&bundles);

    write_json(out, &plan).await?;
    output::print_plan(&plan, format)?;
    Ok(0)
}

pub async fn plan_rollback(
    target_version: &str,
    manifest_path: &Path,
    out: &Path,
    format: OutputFormat,
) -> KernelResult<i32> {
    let target: SchemaVersion = target_version
        .parse()
        .map_err(|e| MigrationError::InvalidVersion(format!("{e}")))?;

    let (planner, bundles) = load_for_planning(manifest_path).await?;
    let plan = planner.plan_downgrade(&bundles, &target);

    write_json(out, &plan).await?;
    output::print_plan(&plan, format)?;
    Ok(0)
}
