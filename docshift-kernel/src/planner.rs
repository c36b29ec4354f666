// ABOUTME: Pure classification of document bundles into a migration plan
// ABOUTME: Never mutates bundles; action order equals input order

use crate::registry::MigrationRegistry;
use docshift_core::{
    ActionKind, DocumentBundle, MigrationPlan, MigrationReport, PlanAction, SchemaVersion,
};
use std::sync::Arc;
use tracing::debug;

/// Classifies bundles against a target version, producing a [`MigrationPlan`].
///
/// The planner is pure and read-only: registry lookups that fail become
/// QUARANTINE actions, never errors.
pub struct MigrationPlanner {
    registry: Arc<MigrationRegistry>,
}

impl MigrationPlanner {
    pub fn new(registry: Arc<MigrationRegistry>) -> Self {
        Self { registry }
    }

    /// Plan an upgrade of every bundle to its doc type's latest registered
    /// version.
    pub fn plan_upgrade(&self, bundles: &[DocumentBundle]) -> MigrationPlan {
        let mut actions = Vec::with_capacity(bundles.len());
        let mut header_target: Option<SchemaVersion> = None;

        for bundle in bundles {
            let doc_type = &bundle.current.meta.doc_type;
            match self.registry.latest_version(doc_type) {
                Some(target) => {
                    raise_target(&mut header_target, &target);
                    actions.push(self.classify_upgrade(bundle, &target));
                }
                None => {
                    actions.push(PlanAction::new(
                        &bundle.current.id,
                        ActionKind::Quarantine,
                        format!("no path: doc type '{doc_type}' has no registered shapes"),
                    ));
                }
            }
        }

        let target = header_target.unwrap_or_else(|| self.fallback_target());
        debug!(actions = actions.len(), target = %target, "upgrade plan generated");
        MigrationPlan::new(target, actions)
    }

    /// Plan a downgrade of every bundle to an explicit target version.
    pub fn plan_downgrade(
        &self,
        bundles: &[DocumentBundle],
        target: &SchemaVersion,
    ) -> MigrationPlan {
        let actions = bundles
            .iter()
            .map(|bundle| self.classify_downgrade(bundle, target))
            .collect();
        debug!(target = %target, "downgrade plan generated");
        MigrationPlan::new(target.clone(), actions)
    }

    /// Plan a re-run covering exactly the failed identifiers of a previous
    /// report. Target versions are re-resolved from the registry per doc
    /// type; the previous run's target is never trusted.
    pub fn plan_retry(&self, previous: &MigrationReport) -> MigrationPlan {
        let mut actions = Vec::with_capacity(previous.failures.len());
        let mut header_target: Option<SchemaVersion> = None;

        for failure in &previous.failures {
            let doc_type = &failure.original_meta.doc_type;
            let current = &failure.original_meta.schema_version;
            match self.registry.latest_version(doc_type) {
                None => actions.push(PlanAction::new(
                    &failure.id,
                    ActionKind::Quarantine,
                    format!("no path: doc type '{doc_type}' has no registered shapes"),
                )),
                Some(target) => {
                    raise_target(&mut header_target, &target);
                    if current == &target {
                        actions.push(PlanAction::new(
                            &failure.id,
                            ActionKind::Skip,
                            format!("already at target {target}"),
                        ));
                    } else if current > &target {
                        actions.push(PlanAction::new(
                            &failure.id,
                            ActionKind::Quarantine,
                            format!("newer than target: document at {current}, target {target}"),
                        ));
                    } else {
                        actions.push(PlanAction::new(
                            &failure.id,
                            ActionKind::StandardUpgrade,
                            format!("retry {current} -> {target}"),
                        ));
                    }
                }
            }
        }

        let target = header_target.unwrap_or_else(|| self.fallback_target());
        MigrationPlan::new(target, actions)
    }

    fn classify_upgrade(&self, bundle: &DocumentBundle, target: &SchemaVersion) -> PlanAction {
        let id = &bundle.current.id;
        let doc_type = &bundle.current.meta.doc_type;
        let current = &bundle.current.meta.schema_version;

        if current == target {
            return PlanAction::new(id, ActionKind::Skip, format!("already at target {target}"));
        }
        if current > target {
            return PlanAction::new(
                id,
                ActionKind::Quarantine,
                format!("newer than target: document at {current}, target {target}"),
            );
        }

        let path = self
            .registry
            .shape_for(doc_type, current)
            .and_then(|from| {
                let to = self.registry.shape_for(doc_type, target)?;
                self.registry.find_path(from, to)
            });

        match path {
            Ok(_) => {
                if bundle.has_snapshot_newer_than_current() {
                    PlanAction::new(
                        id,
                        ActionKind::ThreeWayMerge,
                        format!("re-upgrade with rollback history {current} -> {target}"),
                    )
                } else {
                    PlanAction::new(
                        id,
                        ActionKind::StandardUpgrade,
                        format!("{current} -> {target}"),
                    )
                }
            }
            Err(err) => PlanAction::new(id, ActionKind::Quarantine, format!("no path: {err}")),
        }
    }

    fn classify_downgrade(&self, bundle: &DocumentBundle, target: &SchemaVersion) -> PlanAction {
        let id = &bundle.current.id;
        let doc_type = &bundle.current.meta.doc_type;
        let current = &bundle.current.meta.schema_version;

        if current == target {
            return PlanAction::new(id, ActionKind::Skip, format!("already at target {target}"));
        }
        if current < target {
            return PlanAction::new(
                id,
                ActionKind::Quarantine,
                format!("older than target: document at {current}, target {target}"),
            );
        }

        // A downgrade runs the forward chain target -> current in reverse,
        // so that chain's existence is what gets checked.
        let path = self
            .registry
            .shape_for(doc_type, target)
            .and_then(|target_shape| {
                let current_shape = self.registry.shape_for(doc_type, current)?;
                self.registry.find_path(target_shape, current_shape)
            });

        match path {
            Ok(_) => PlanAction::new(
                id,
                ActionKind::StandardDowngrade,
                format!("{current} -> {target}"),
            ),
            Err(err) => PlanAction::new(id, ActionKind::Quarantine, format!("no path: {err}")),
        }
    }

    /// Header target when no bundle resolved one: the highest latest
    /// version across all registered doc types, or "0.0" for an empty
    /// registry.
    fn fallback_target(&self) -> SchemaVersion {
        self.registry
            .registered_doc_types()
            .iter()
            .filter_map(|doc_type| self.registry.latest_version(doc_type))
            .max()
            .unwrap_or_else(|| SchemaVersion::major_minor(0, 0))
    }
}

fn raise_target(header_target: &mut Option<SchemaVersion>, candidate: &SchemaVersion) {
    match header_target {
        Some(existing) if &*existing >= candidate => {}
        _ => *header_target = Some(candidate.clone()),
    }
}
