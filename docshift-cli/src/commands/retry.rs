// ABOUTME: retry command: re-run exactly the failed items of a previous result

use super::{read_json, run_plan, RunOptions};
use crate::cli::OutputFormat;
use crate::shapes;
use docshift_core::{KernelResult, MigrationReport};
use docshift_kernel::MigrationPlanner;
use std::path::{Path, PathBuf};
use tracing::info;

pub async fn retry(
    result_path: &Path,
    transactions: Option<PathBuf>,
    quarantine: Option<PathBuf>,
    out: &Path,
    format: OutputFormat,
) -> KernelResult<i32> {
    let previous: MigrationReport = read_json(result_path).await?;
    if previous.failures.is_empty() {
        info!("previous result has no failures, nothing to retry");
    }

    let registry = shapes::build_registry()?;
    let plan = MigrationPlanner::new(registry).plan_retry(&previous);
    info!(actions = plan.actions.len(), "retry plan generated");

    run_plan(
        plan,
        RunOptions {
            transactions,
            quarantine,
            out: out.to_path_buf(),
            format,
        },
    )
    .await
}
