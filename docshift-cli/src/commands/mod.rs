// ABOUTME: Command dispatch and the shared plan-execution path
// ABOUTME: Each subcommand returns a process exit code

pub mod gc;
pub mod migrate;
pub mod plan;
pub mod resume;
pub mod retry;

use crate::cli::{Cli, Commands, OutputFormat};
use crate::output;
use crate::shapes;
use crate::store::{DocumentStore, LoadMode};
use docshift_core::{KernelResult, MigrationPlan};
use docshift_kernel::atomic::atomic_write;
use docshift_kernel::{KernelConfig, MigrationService};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::info;

/// Dispatch the parsed command line.
pub async fn execute(cli: Cli) -> KernelResult<i32> {
    let format = cli.output;
    match cli.command {
        Commands::PlanUpgrade { manifest, out } => plan::plan_upgrade(&manifest, &out, format).await,
        Commands::PlanRollback {
            target_version,
            manifest,
            out,
        } => plan::plan_rollback(&target_version, &manifest, &out, format).await,
        Commands::Migrate {
            plan,
            transactions,
            quarantine,
            out,
        } => migrate::migrate(&plan, transactions, quarantine, &out, format).await,
        Commands::Retry {
            result,
            transactions,
            quarantine,
            out,
        } => retry::retry(&result, transactions, quarantine, &out, format).await,
        Commands::Gc { manifest } => gc::gc(&manifest, format).await,
        Commands::Resume { transactions } => resume::resume(&transactions, format).await,
    }
}

pub(crate) struct RunOptions {
    pub transactions: Option<PathBuf>,
    pub quarantine: Option<PathBuf>,
    pub out: PathBuf,
    pub format: OutputFormat,
}

/// Execute a plan against the documents it names and persist everything:
/// migrated documents, snapshot deltas, quarantined failures, and the
/// serialized result.
pub(crate) async fn run_plan(plan: MigrationPlan, options: RunOptions) -> KernelResult<i32> {
    let registry = shapes::build_registry()?;

    let mut config = KernelConfig::default();
    if let Some(dir) = &options.quarantine {
        config = config.with_quarantine_dir(dir);
    }
    if let Some(dir) = &options.transactions {
        config = config.with_transaction_dir(dir);
    }
    let service = MigrationService::new(registry.clone(), config);
    let mut store = DocumentStore::new(registry, true);

    // Load strictly; documents that fail to load become failures up front
    // and their actions drop out of the executable plan.
    let paths: Vec<PathBuf> = plan.actions.iter().map(|a| PathBuf::from(&a.id)).collect();
    let loaded = store.load_bundles(&paths, LoadMode::Execution).await;
    let failed_ids: HashSet<&str> = loaded.failures.iter().map(|f| f.id.as_str()).collect();

    let executable = MigrationPlan {
        header: plan.header.clone(),
        actions: plan
            .actions
            .iter()
            .filter(|a| !failed_ids.contains(a.id.as_str()))
            .cloned()
            .collect(),
    };
    let bundles: HashMap<String, _> = loaded
        .bundles
        .into_iter()
        .map(|b| (b.current.id.clone(), b))
        .collect();

    let mut report = if options.transactions.is_some() {
        service
            .execute_transactional(&executable, &bundles, &mut store)
            .await?
    } else {
        service
            .execute_with_sink(&executable, &bundles, &mut store)
            .await?
    };

    for failure in loaded.failures {
        report.absorb_preflight_failure(failure);
    }

    let outcomes = service
        .quarantine_failures(&report, |id| PathBuf::from(id))
        .await?;
    for (id, outcome) in &outcomes {
        info!(doc = %id, outcome = ?outcome, "quarantine outcome");
    }

    write_json(&options.out, &report).await?;
    output::print_report(&report, options.format)?;
    Ok(i32::from(report.has_failures()))
}

pub(crate) async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> KernelResult<()> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    atomic_write(path, &bytes).await
}

pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> KernelResult<T> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        docshift_core::MigrationError::Storage(anyhow::anyhow!(
            "'{}' unreadable: {e}",
            path.display()
        ))
    })?;
    Ok(serde_json::from_slice(&bytes)?)
}
