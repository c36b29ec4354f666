// ABOUTME: Executes a migration plan against loaded bundles
// ABOUTME: Per-item failures never abort the batch; every item lands in the report

use crate::events::MigrationEvent;
use crate::merge::ThreeWayMerger;
use crate::registry::MigrationRegistry;
use crate::snapshot::content_hash_hex;
use docshift_core::{
    write_wire_document, ActionKind, DataMigrationResult, DocumentBundle, DocumentMeta,
    FailedMigration, KernelResult, MigrationError, MigrationPlan, MigrationReport, PlanAction,
    QuarantineReason, QuarantineRecord, SchemaVersion, Snapshot,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;
use uuid::Uuid;

/// Executes [`MigrationPlan`]s. Serial over actions; identifiers must be
/// unique across the plan.
pub struct MigrationRunner {
    registry: Arc<MigrationRegistry>,
    merger: ThreeWayMerger,
}

impl MigrationRunner {
    pub fn new(registry: Arc<MigrationRegistry>) -> Self {
        let merger = ThreeWayMerger::new(registry.clone());
        Self { registry, merger }
    }

    /// Run every action of the plan against the bundles keyed by
    /// identifier. Infrastructure problems (duplicate identifiers) error
    /// out before any work; everything per-item is captured in the report.
    pub async fn execute(
        &self,
        plan: &MigrationPlan,
        bundles: &HashMap<String, DocumentBundle>,
    ) -> KernelResult<MigrationReport> {
        let mut seen = HashSet::new();
        for action in &plan.actions {
            if !seen.insert(action.id.as_str()) {
                return Err(MigrationError::DuplicatePlanIdentifier(action.id.clone()));
            }
        }

        let run_id = Uuid::new_v4();
        let started = Instant::now();
        MigrationEvent::RunStarted {
            run_id,
            target_version: plan.header.target_version.clone(),
            total_actions: plan.actions.len(),
        }
        .emit();

        let mut report = MigrationReport::started();

        for action in &plan.actions {
            let bundle = bundles.get(&action.id);
            match self.execute_action(action, bundle, &plan.header.target_version).await {
                Ok(result) => {
                    MigrationEvent::ItemCompleted {
                        run_id,
                        id: action.id.clone(),
                        kind: action.kind,
                    }
                    .emit();
                    if action.kind == ActionKind::Skip {
                        report.record_skip(&action.id, result);
                    } else {
                        report.record_success(&action.id, result);
                    }
                }
                Err(err) => {
                    let reason = err.quarantine_reason();
                    MigrationEvent::ItemFailed {
                        run_id,
                        id: action.id.clone(),
                        reason,
                    }
                    .emit();
                    report.record_failure(self.failure(action, bundle, reason, err));
                }
            }
        }

        report.finalize(plan.actions.len(), started.elapsed());
        MigrationEvent::RunCompleted {
            run_id,
            succeeded: report.summary.succeeded,
            failed: report.summary.failed,
            skipped: report.summary.skipped,
            duration: report.summary.duration,
        }
        .emit();
        Ok(report)
    }

    async fn execute_action(
        &self,
        action: &PlanAction,
        bundle: Option<&DocumentBundle>,
        plan_target: &SchemaVersion,
    ) -> KernelResult<DataMigrationResult> {
        if action.kind == ActionKind::Quarantine {
            return Err(MigrationError::PlannedQuarantine(action.details.clone()));
        }

        let bundle = bundle.ok_or_else(|| {
            MigrationError::Execution(format!("no bundle loaded for '{}'", action.id))
        })?;

        match action.kind {
            ActionKind::Skip => Ok(DataMigrationResult::unchanged(
                bundle.current.data.clone(),
                bundle.current.meta.clone(),
            )),
            ActionKind::StandardUpgrade => self.standard_upgrade(bundle).await,
            ActionKind::StandardDowngrade => self.standard_downgrade(bundle, plan_target).await,
            ActionKind::ThreeWayMerge => self.three_way_merge(bundle).await,
            ActionKind::Quarantine => unreachable!("handled above"),
        }
    }

    async fn standard_upgrade(&self, bundle: &DocumentBundle) -> KernelResult<DataMigrationResult> {
        let current = &bundle.current;
        let doc_type = &current.meta.doc_type;
        let target = self.registry.latest_version(doc_type).ok_or_else(|| {
            MigrationError::Execution(format!("doc type '{doc_type}' has no registered shapes"))
        })?;

        let from = self.registry.shape_for(doc_type, &current.meta.schema_version)?;
        let to = self.registry.shape_for(doc_type, &target)?;
        let path = self.registry.find_path(from, to)?;

        debug!(doc = %current.id, from = %current.meta.schema_version, to = %target, "standard upgrade");
        let data = self.registry.apply_path(&path, current.data.clone()).await?;

        Ok(DataMigrationResult {
            data,
            new_meta: DocumentMeta::new(doc_type, target),
            snapshots_to_persist: vec![Snapshot::new(
                current.data.clone(),
                current.meta.clone(),
            )],
            snapshots_to_delete: Vec::new(),
        })
    }

    async fn standard_downgrade(
        &self,
        bundle: &DocumentBundle,
        target: &SchemaVersion,
    ) -> KernelResult<DataMigrationResult> {
        let current = &bundle.current;
        let doc_type = &current.meta.doc_type;

        // The forward chain target -> current, inverted step-wise.
        let target_shape = self.registry.shape_for(doc_type, target)?;
        let current_shape = self.registry.shape_for(doc_type, &current.meta.schema_version)?;
        let path = self.registry.find_path(target_shape, current_shape)?;

        debug!(doc = %current.id, from = %current.meta.schema_version, to = %target, "standard downgrade");
        let data = self.registry.reverse_path(&path, current.data.clone()).await?;

        Ok(DataMigrationResult {
            data,
            new_meta: DocumentMeta::new(doc_type, target.clone()),
            snapshots_to_persist: vec![Snapshot::new(
                current.data.clone(),
                current.meta.clone(),
            )],
            snapshots_to_delete: Vec::new(),
        })
    }

    async fn three_way_merge(&self, bundle: &DocumentBundle) -> KernelResult<DataMigrationResult> {
        let current = &bundle.current;
        let base = bundle.oldest_snapshot().ok_or_else(|| {
            MigrationError::Execution(format!(
                "'{}' planned for merge but carries no snapshots",
                current.id
            ))
        })?;
        let theirs = bundle.newest_snapshot().ok_or_else(|| {
            MigrationError::Execution(format!(
                "'{}' planned for merge but carries no snapshots",
                current.id
            ))
        })?;

        debug!(
            doc = %current.id,
            base = %base.meta.schema_version,
            theirs = %theirs.meta.schema_version,
            "three-way merge"
        );
        let data = self.merger.merge(base, current, theirs).await?;

        let mut snapshots_to_delete = vec![base.meta.clone()];
        if theirs.meta != base.meta {
            snapshots_to_delete.push(theirs.meta.clone());
        }

        Ok(DataMigrationResult {
            data,
            new_meta: DocumentMeta::new(&current.meta.doc_type, theirs.meta.schema_version.clone()),
            snapshots_to_persist: vec![Snapshot::new(
                current.data.clone(),
                current.meta.clone(),
            )],
            snapshots_to_delete,
        })
    }

    fn failure(
        &self,
        action: &PlanAction,
        bundle: Option<&DocumentBundle>,
        reason: QuarantineReason,
        err: MigrationError,
    ) -> FailedMigration {
        let (original_data, original_meta) = match bundle {
            Some(b) => (b.current.data.clone(), b.current.meta.clone()),
            None => (
                Value::Null,
                DocumentMeta::new("unknown", SchemaVersion::major_minor(0, 0)),
            ),
        };

        let content_hash = write_wire_document(&original_data, &original_meta)
            .map(|bytes| content_hash_hex(&bytes))
            .unwrap_or_default();

        let details = match reason {
            QuarantineReason::PlannedQuarantine => action.details.clone(),
            _ => err.to_string(),
        };

        FailedMigration {
            id: action.id.clone(),
            original_data,
            original_meta,
            record: QuarantineRecord::new(&action.id, reason, details, content_hash),
        }
    }
}
