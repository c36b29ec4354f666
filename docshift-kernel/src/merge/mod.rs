// ABOUTME: Hybrid three-way merger for re-upgrades over rollback history
// ABOUTME: Semantic pass via step-claimed properties, structural pass via diff/patch

pub mod diff;

pub use diff::{apply_op, diff, render_path, DiffOp, DiffPath, PathSegment};

use crate::registry::{MergeOutcome, MigrationRegistry};
use docshift_core::{KernelResult, Snapshot, VersionedDocument};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Which side a structural conflict resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// The pre-rollback snapshot (THEIRS) wins. Edits against the newer
    /// schema reflect intent against the newer feature set.
    TheirsWins,
    /// The post-rollback working copy (MINE) wins.
    MineWins,
}

/// The conflict policy for re-upgrade merges.
pub const CONFLICT_POLICY: ConflictPolicy = ConflictPolicy::TheirsWins;

/// Merges BASE (common ancestor), MINE (post-rollback edits), and THEIRS
/// (pre-rollback edits) into a single document at the target version.
pub struct ThreeWayMerger {
    registry: Arc<MigrationRegistry>,
}

impl ThreeWayMerger {
    pub fn new(registry: Arc<MigrationRegistry>) -> Self {
        Self { registry }
    }

    /// Produce the merged document data at `theirs`'s schema version.
    ///
    /// Both BASE and MINE are first lifted through the forward migration
    /// chain so all three sides compare at the target shape. Properties
    /// claimed by the final step merge semantically; everything else gets
    /// the patch-based structural treatment.
    pub async fn merge(
        &self,
        base: &Snapshot,
        mine: &VersionedDocument,
        theirs: &Snapshot,
    ) -> KernelResult<Value> {
        let doc_type = &mine.meta.doc_type;
        let target = &theirs.meta.schema_version;
        let target_shape = self.registry.shape_for(doc_type, target)?;

        let base_shape = self.registry.shape_for(doc_type, &base.meta.schema_version)?;
        let base_chain = self.registry.find_path(base_shape, target_shape)?;
        let base_lifted = self.registry.apply_path(&base_chain, base.data.clone()).await?;

        let mine_shape = self.registry.shape_for(doc_type, &mine.meta.schema_version)?;
        let mine_chain = self.registry.find_path(mine_shape, target_shape)?;
        let mine_lifted = self.registry.apply_path(&mine_chain, mine.data.clone()).await?;

        debug!(
            doc = %mine.id,
            base = %base.meta.schema_version,
            target = %target,
            "three-way merge: sides lifted to target shape"
        );

        // Semantic pass: the step arriving at the target shape may claim
        // properties and merge them itself.
        let mut handled: HashSet<String> = HashSet::new();
        let mut semantic: Map<String, Value> = Map::new();
        let final_step_id = mine_chain.last().or(base_chain.last());

        if let Some(&step_id) = final_step_id {
            let step = self.registry.step(step_id);
            for property in step.claimed_properties() {
                let base_value = base_lifted.get(property.as_str());
                let mine_value = mine_lifted.get(property.as_str());
                let theirs_value = theirs.data.get(property.as_str());

                match step.merge_property(property, base_value, mine_value, theirs_value) {
                    MergeOutcome::Merged(value) => {
                        semantic.insert(property.clone(), value);
                        handled.insert(property.clone());
                    }
                    MergeOutcome::Drop => {
                        handled.insert(property.clone());
                    }
                    MergeOutcome::Unhandled => {}
                }
            }
        }

        // Structural pass over everything the semantic pass left alone.
        let base_rest = without_keys(&base_lifted, &handled);
        let mine_rest = without_keys(&mine_lifted, &handled);
        let theirs_rest = without_keys(&theirs.data, &handled);

        let mine_delta = diff(&base_rest, &mine_rest);
        let theirs_delta = diff(&base_rest, &theirs_rest);
        let theirs_paths: HashSet<DiffPath> =
            theirs_delta.iter().map(|op| op.path().clone()).collect();

        let mut merged = base_rest;
        for op in &theirs_delta {
            if !apply_op(&mut merged, op) {
                warn!(path = %render_path(op.path()), "theirs-side edit did not apply");
            }
        }
        for op in &mine_delta {
            if theirs_paths.contains(op.path()) {
                match CONFLICT_POLICY {
                    ConflictPolicy::TheirsWins => {
                        debug!(
                            doc = %mine.id,
                            path = %render_path(op.path()),
                            losing = ?op,
                            "merge conflict, keeping theirs"
                        );
                    }
                    ConflictPolicy::MineWins => {
                        if !apply_op(&mut merged, op) {
                            warn!(path = %render_path(op.path()), "mine-side edit did not apply");
                        }
                    }
                }
            } else if !apply_op(&mut merged, op) {
                warn!(path = %render_path(op.path()), "mine-side edit did not apply");
            }
        }

        // Compose: structural result plus semantically merged properties.
        let mut composed = match merged {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        for (key, value) in semantic {
            composed.insert(key, value);
        }
        Ok(Value::Object(composed))
    }
}

fn without_keys(value: &Value, keys: &HashSet<String>) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| !keys.contains(*k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        other => other.clone(),
    }
}
