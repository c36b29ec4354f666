// ABOUTME: Facade composing planner, runner, and side stores into one entry point
// ABOUTME: All collaborators are injected at construction; no global state

use crate::config::KernelConfig;
use crate::planner::MigrationPlanner;
use crate::quarantine::{QuarantineOutcome, QuarantineStore};
use crate::registry::MigrationRegistry;
use crate::runner::MigrationRunner;
use crate::transaction::TransactionStore;
use async_trait::async_trait;
use docshift_core::{
    ActionKind, DataMigrationResult, DocumentBundle, KernelResult, MigrationError, MigrationPlan,
    MigrationReport, SchemaVersion,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

/// Receives per-document results for persistence. The service applies
/// successes through the sink in plan order, inside the transaction
/// envelope when one is active.
#[async_trait]
pub trait DocumentSink: Send {
    async fn apply(&mut self, id: &str, result: &DataMigrationResult) -> KernelResult<()>;
}

/// Sink that discards results; in-memory runs and dry runs use it.
pub struct NullSink;

#[async_trait]
impl DocumentSink for NullSink {
    async fn apply(&mut self, _id: &str, _result: &DataMigrationResult) -> KernelResult<()> {
        Ok(())
    }
}

/// Bookkeeping for a run currently inside `execute`.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub started_at: Instant,
    pub total_actions: usize,
}

/// High-level entry point over the migration kernel.
pub struct MigrationService {
    planner: MigrationPlanner,
    runner: MigrationRunner,
    config: KernelConfig,
    quarantine: QuarantineStore,
    transactions: Option<TransactionStore>,
    active_runs: Arc<RwLock<HashMap<Uuid, RunContext>>>,
}

impl MigrationService {
    pub fn new(registry: Arc<MigrationRegistry>, config: KernelConfig) -> Self {
        let quarantine = QuarantineStore::new(config.quarantine_dir.clone());
        let transactions = config.transaction_dir.clone().map(TransactionStore::new);
        Self {
            planner: MigrationPlanner::new(registry.clone()),
            runner: MigrationRunner::new(registry),
            config,
            quarantine,
            transactions,
            active_runs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn quarantine_store(&self) -> &QuarantineStore {
        &self.quarantine
    }

    pub fn active_runs(&self) -> Vec<RunContext> {
        self.active_runs.read().values().cloned().collect()
    }

    pub fn plan_upgrade(&self, bundles: &[DocumentBundle]) -> MigrationPlan {
        self.planner.plan_upgrade(bundles)
    }

    pub fn plan_downgrade(
        &self,
        bundles: &[DocumentBundle],
        target: &SchemaVersion,
    ) -> MigrationPlan {
        self.planner.plan_downgrade(bundles, target)
    }

    pub fn plan_retry(&self, previous: &MigrationReport) -> MigrationPlan {
        self.planner.plan_retry(previous)
    }

    /// Execute a plan purely in memory. Nothing is persisted.
    pub async fn execute(
        &self,
        plan: &MigrationPlan,
        bundles: &HashMap<String, DocumentBundle>,
    ) -> KernelResult<MigrationReport> {
        self.execute_with_sink(plan, bundles, &mut NullSink).await
    }

    /// Execute a plan and push every non-SKIP success through the sink.
    pub async fn execute_with_sink(
        &self,
        plan: &MigrationPlan,
        bundles: &HashMap<String, DocumentBundle>,
        sink: &mut dyn DocumentSink,
    ) -> KernelResult<MigrationReport> {
        if self.config.dry_run {
            info!(actions = plan.actions.len(), "dry run, nothing executed");
            let mut report = MigrationReport::started();
            report.finalize(0, std::time::Duration::ZERO);
            return Ok(report);
        }

        let context = RunContext {
            run_id: Uuid::new_v4(),
            started_at: Instant::now(),
            total_actions: plan.actions.len(),
        };
        self.active_runs.write().insert(context.run_id, context.clone());
        let result = self.runner.execute(plan, bundles).await;
        self.active_runs.write().remove(&context.run_id);
        let report = result?;

        self.apply_successes(plan, &report, sink).await?;
        Ok(report)
    }

    /// Execute a plan under a resumable transaction. Identifiers in the
    /// plan are taken to be file paths; non-SKIP files are backed up before
    /// any step runs, every success is persisted through the sink, and a
    /// crash before commit leaves an `InProgress` journal for
    /// [`Self::resume`].
    pub async fn execute_transactional(
        &self,
        plan: &MigrationPlan,
        bundles: &HashMap<String, DocumentBundle>,
        sink: &mut dyn DocumentSink,
    ) -> KernelResult<MigrationReport> {
        let store = self.transactions.as_ref().ok_or_else(|| {
            MigrationError::Configuration(
                "transactional execution requested without a transaction directory".to_string(),
            )
        })?;

        if self.config.dry_run {
            return self.execute_with_sink(plan, bundles, sink).await;
        }

        let file_paths: Vec<PathBuf> = plan
            .effective_actions()
            .map(|action| PathBuf::from(&action.id))
            .collect();

        let mut transaction = store.begin(file_paths).await?;
        transaction.backup_files().await?;

        let context = RunContext {
            run_id: Uuid::new_v4(),
            started_at: Instant::now(),
            total_actions: plan.actions.len(),
        };
        self.active_runs.write().insert(context.run_id, context.clone());
        let result = self.runner.execute(plan, bundles).await;
        self.active_runs.write().remove(&context.run_id);
        let report = result?;

        let kinds: HashMap<&str, ActionKind> = plan
            .actions
            .iter()
            .map(|a| (a.id.as_str(), a.kind))
            .collect();
        for success in &report.successes {
            if kinds.get(success.id.as_str()) == Some(&ActionKind::Skip) {
                continue;
            }
            transaction.mark_processing(&success.id).await?;
            sink.apply(&success.id, &success.result).await?;
            transaction.mark_completed(&success.id).await?;
        }

        transaction.commit().await?;
        Ok(report)
    }

    async fn apply_successes(
        &self,
        plan: &MigrationPlan,
        report: &MigrationReport,
        sink: &mut dyn DocumentSink,
    ) -> KernelResult<()> {
        let kinds: HashMap<&str, ActionKind> = plan
            .actions
            .iter()
            .map(|a| (a.id.as_str(), a.kind))
            .collect();
        for success in &report.successes {
            if kinds.get(success.id.as_str()) == Some(&ActionKind::Skip) {
                continue;
            }
            sink.apply(&success.id, &success.result).await?;
        }
        Ok(())
    }

    /// Roll back the interrupted transaction in the configured directory.
    pub async fn resume(&self) -> KernelResult<MigrationReport> {
        let store = self.transactions.as_ref().ok_or_else(|| {
            MigrationError::Configuration(
                "resume requested without a transaction directory".to_string(),
            )
        })?;
        store.resume().await
    }

    /// Quarantine every failed item of a report. `resolve` maps an
    /// identifier to the file to move aside. Writes are awaited so every
    /// returned report path exists on return.
    pub async fn quarantine_failures(
        &self,
        report: &MigrationReport,
        resolve: impl Fn(&str) -> PathBuf,
    ) -> KernelResult<Vec<(String, QuarantineOutcome)>> {
        let mut outcomes = Vec::with_capacity(report.failures.len());
        for failure in &report.failures {
            let source = resolve(&failure.id);
            let outcome = self.quarantine.quarantine(&source, &failure.record).await?;
            outcomes.push((failure.id.clone(), outcome));
        }
        Ok(outcomes)
    }
}
