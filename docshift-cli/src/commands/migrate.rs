// ABOUTME: migrate command: execute a previously generated plan

use super::{read_json, run_plan, RunOptions};
use crate::cli::OutputFormat;
use docshift_core::{KernelResult, MigrationPlan};
use std::path::{Path, PathBuf};
use tracing::info;

pub async fn migrate(
    plan_path: &Path,
    transactions: Option<PathBuf>,
    quarantine: Option<PathBuf>,
    out: &Path,
    format: OutputFormat,
) -> KernelResult<i32> {
    let plan: MigrationPlan = read_json(plan_path).await?;
    info!(
        plan = %plan_path.display(),
        actions = plan.actions.len(),
        target = %plan.header.target_version,
        "executing plan"
    );

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
