// ABOUTME: Registry of versioned shapes and the migration steps between them
// ABOUTME: Built once at configuration time, immutable afterwards; BFS path search

pub mod shape;
pub mod step;

pub use shape::{FieldSchema, ShapeDefinition};
pub use step::{FnStep, MergeOutcome, MigrationStep};

use docshift_core::{KernelResult, MigrationError, SchemaVersion};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::debug;

/// Opaque handle to a registered shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeId(usize);

/// Opaque handle to a registered migration step. Ordering of the inner
/// index is registration order, which breaks path-search ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StepId(usize);

/// Builder for [`MigrationRegistry`]. All registration errors are
/// configuration errors: they surface at setup, never during execution.
#[derive(Default)]
pub struct RegistryBuilder {
    shapes: Vec<ShapeDefinition>,
    by_key: HashMap<(String, SchemaVersion), ShapeId>,
    declared_families: HashSet<String>,
    steps: Vec<Arc<dyn MigrationStep>>,
    edges: HashMap<ShapeId, Vec<(ShapeId, StepId)>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single shape. The `(doc_type, version)` pair must be new.
    pub fn register_shape(&mut self, shape: ShapeDefinition) -> KernelResult<ShapeId> {
        let key = (shape.doc_type.clone(), shape.version.clone());
        if self.by_key.contains_key(&key) {
            return Err(MigrationError::Configuration(format!(
                "shape for doc type '{}' version {} registered twice",
                key.0, key.1
            )));
        }
        let id = ShapeId(self.shapes.len());
        self.by_key.insert(key, id);
        self.shapes.push(shape);
        Ok(id)
    }

    /// Register a whole document family at once. Declaring the same family
    /// a second time is a fatal configuration error.
    pub fn register_doc_type(
        &mut self,
        doc_type: &str,
        shapes: Vec<ShapeDefinition>,
    ) -> KernelResult<Vec<ShapeId>> {
        if !self.declared_families.insert(doc_type.to_string()) {
            return Err(MigrationError::Configuration(format!(
                "doc type '{doc_type}' declared twice"
            )));
        }
        let mut ids = Vec::with_capacity(shapes.len());
        for shape in shapes {
            if shape.doc_type != doc_type {
                return Err(MigrationError::Configuration(format!(
                    "shape for doc type '{}' declared under family '{doc_type}'",
                    shape.doc_type
                )));
            }
            ids.push(self.register_shape(shape)?);
        }
        Ok(ids)
    }

    /// Register a step. Both endpoint shapes must already be registered.
    pub fn register_step(&mut self, step: Arc<dyn MigrationStep>) -> KernelResult<StepId> {
        let from = self.lookup(step.doc_type(), step.from_version())?;
        let to = self.lookup(step.doc_type(), step.to_version())?;

        let id = StepId(self.steps.len());
        self.steps.push(step);
        self.edges.entry(from).or_default().push((to, id));
        Ok(id)
    }

    fn lookup(&self, doc_type: &str, version: &SchemaVersion) -> KernelResult<ShapeId> {
        self.by_key
            .get(&(doc_type.to_string(), version.clone()))
            .copied()
            .ok_or_else(|| {
                MigrationError::Configuration(format!(
                    "step references unregistered shape: doc type '{doc_type}' version {version}"
                ))
            })
    }

    pub fn build(self) -> MigrationRegistry {
        debug!(
            shapes = self.shapes.len(),
            steps = self.steps.len(),
            "migration registry built"
        );
        MigrationRegistry {
            shapes: self.shapes,
            by_key: self.by_key,
            steps: self.steps,
            edges: self.edges,
        }
    }
}

/// Immutable map of `(doc_type, version) -> shape` and the step graph
/// between shapes. Safe to share across any number of concurrent readers.
pub struct MigrationRegistry {
    shapes: Vec<ShapeDefinition>,
    by_key: HashMap<(String, SchemaVersion), ShapeId>,
    steps: Vec<Arc<dyn MigrationStep>>,
    edges: HashMap<ShapeId, Vec<(ShapeId, StepId)>>,
}

impl MigrationRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Exact shape lookup.
    pub fn shape_for(&self, doc_type: &str, version: &SchemaVersion) -> KernelResult<ShapeId> {
        self.by_key
            .get(&(doc_type.to_string(), version.clone()))
            .copied()
            .ok_or_else(|| MigrationError::NoSuchShape {
                doc_type: doc_type.to_string(),
                version: version.clone(),
            })
    }

    pub fn shape(&self, id: ShapeId) -> &ShapeDefinition {
        &self.shapes[id.0]
    }

    pub fn step(&self, id: StepId) -> &Arc<dyn MigrationStep> {
        &self.steps[id.0]
    }

    /// Highest registered version for a doc type, by numeric comparison.
    pub fn latest_version(&self, doc_type: &str) -> Option<SchemaVersion> {
        self.shapes
            .iter()
            .filter(|s| s.doc_type == doc_type)
            .map(|s| s.version.clone())
            .max()
    }

    pub fn registered_doc_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .shapes
            .iter()
            .map(|s| s.doc_type.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        names.sort();
        names
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Shortest step chain from one shape to another, by hop count.
    ///
    /// Breadth-first search over the step graph; ties between equal-length
    /// paths resolve to the earliest-registered steps. `find_path(x, x)`
    /// is the empty chain.
    pub fn find_path(&self, from: ShapeId, to: ShapeId) -> KernelResult<Vec<StepId>> {
        if from == to {
            return Ok(Vec::new());
        }

        let mut queue = VecDeque::new();
        let mut visited = HashSet::new();
        let mut parent: HashMap<ShapeId, (ShapeId, StepId)> = HashMap::new();

        queue.push_back(from);
        visited.insert(from);

        while let Some(current) = queue.pop_front() {
            if current == to {
                break;
            }
            let Some(neighbors) = self.edges.get(&current) else {
                continue;
            };
            for &(next, step_id) in neighbors {
                if visited.insert(next) {
                    parent.insert(next, (current, step_id));
                    queue.push_back(next);
                }
            }
        }

        if !parent.contains_key(&to) {
            let from_shape = self.shape(from);
            let to_shape = self.shape(to);
            return Err(MigrationError::NoMigrationPath {
                doc_type: from_shape.doc_type.clone(),
                from: from_shape.version.clone(),
                to: to_shape.version.clone(),
            });
        }

        let mut path = Vec::new();
        let mut node = to;
        while node != from {
            let (prev, step_id) = parent[&node];
            path.push(step_id);
            node = prev;
        }
        path.reverse();
        Ok(path)
    }

    /// Thread a document through a forward step chain.
    pub async fn apply_path(&self, path: &[StepId], mut data: Value) -> KernelResult<Value> {
        for &step_id in path {
            let step = self.step(step_id);
            debug!(
                doc_type = step.doc_type(),
                from = %step.from_version(),
                to = %step.to_version(),
                "applying migration step"
            );
            data = step.apply(data).await?;
        }
        Ok(data)
    }

    /// Undo a forward step chain by applying each step's reverse in
    /// reverse order.
    pub async fn reverse_path(&self, path: &[StepId], mut data: Value) -> KernelResult<Value> {
        for &step_id in path.iter().rev() {
            let step = self.step(step_id);
            debug!(
                doc_type = step.doc_type(),
                from = %step.to_version(),
                to = %step.from_version(),
                "reversing migration step"
            );
            data = step.reverse(data).await?;
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn version(s: &str) -> SchemaVersion {
        s.parse().unwrap()
    }

    fn identity_step(doc_type: &str, from: &str, to: &str) -> Arc<dyn MigrationStep> {
        Arc::new(FnStep::new(
            doc_type,
            version(from),
            version(to),
            Ok,
            Ok,
        ))
    }

    fn registry_with_chain() -> MigrationRegistry {
        let mut builder = RegistryBuilder::new();
        builder
            .register_doc_type(
                "PkgConf",
                vec![
                    ShapeDefinition::new("PkgConf", version("1.0")),
                    ShapeDefinition::new("PkgConf", version("2.0")),
                    ShapeDefinition::new("PkgConf", version("3.0")),
                ],
            )
            .unwrap();
        builder
            .register_step(identity_step("PkgConf", "1.0", "2.0"))
            .unwrap();
        builder
            .register_step(identity_step("PkgConf", "2.0", "3.0"))
            .unwrap();
        builder.build()
    }

    #[test]
    fn test_duplicate_shape_is_configuration_error() {
        let mut builder = RegistryBuilder::new();
        builder
            .register_shape(ShapeDefinition::new("PkgConf", version("1.0")))
            .unwrap();
        let result = builder.register_shape(ShapeDefinition::new("PkgConf", version("1.0")));
        assert!(matches!(result, Err(MigrationError::Configuration(_))));
    }

    #[test]
    fn test_duplicate_family_is_configuration_error() {
        let mut builder = RegistryBuilder::new();
        builder.register_doc_type("PkgConf", vec![]).unwrap();
        let result = builder.register_doc_type("PkgConf", vec![]);
        assert!(matches!(result, Err(MigrationError::Configuration(_))));
    }

    #[test]
    fn test_step_requires_registered_shapes() {
        let mut builder = RegistryBuilder::new();
        let result = builder.register_step(identity_step("PkgConf", "1.0", "2.0"));
        assert!(matches!(result, Err(MigrationError::Configuration(_))));
    }

    #[test]
    fn test_latest_version_is_numeric() {
        let mut builder = RegistryBuilder::new();
        builder
            .register_shape(ShapeDefinition::new("PkgConf", version("2.0")))
            .unwrap();
        builder
            .register_shape(ShapeDefinition::new("PkgConf", version("10.0")))
            .unwrap();
        let registry = builder.build();

        assert_eq!(registry.latest_version("PkgConf"), Some(version("10.0")));
        assert_eq!(registry.latest_version("Unknown"), None);
    }

    #[test]
    fn test_find_path_walks_the_chain() {
        let registry = registry_with_chain();
        let from = registry.shape_for("PkgConf", &version("1.0")).unwrap();
        let to = registry.shape_for("PkgConf", &version("3.0")).unwrap();

        let path = registry.find_path(from, to).unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(registry.step(path[0]).to_version(), &version("2.0"));
        assert_eq!(registry.step(path[1]).to_version(), &version("3.0"));
    }

    #[test]
    fn test_find_path_same_shape_is_empty() {
        let registry = registry_with_chain();
        let shape = registry.shape_for("PkgConf", &version("2.0")).unwrap();
        assert!(registry.find_path(shape, shape).unwrap().is_empty());
    }

    #[test]
    fn test_find_path_prefers_fewer_hops() {
        let mut builder = RegistryBuilder::new();
        for v in ["1.0", "2.0", "3.0"] {
            builder
                .register_shape(ShapeDefinition::new("PkgConf", version(v)))
                .unwrap();
        }
        builder
            .register_step(identity_step("PkgConf", "1.0", "2.0"))
            .unwrap();
        builder
            .register_step(identity_step("PkgConf", "2.0", "3.0"))
            .unwrap();
        // Direct shortcut registered last still wins on hop count.
        builder
            .register_step(identity_step("PkgConf", "1.0", "3.0"))
            .unwrap();
        let registry = builder.build();

        let from = registry.shape_for("PkgConf", &version("1.0")).unwrap();
        let to = registry.shape_for("PkgConf", &version("3.0")).unwrap();
        let path = registry.find_path(from, to).unwrap();
        assert_eq!(path.len(), 1);
    }

    #[test]
    fn test_no_path_is_typed_error() {
        let mut builder = RegistryBuilder::new();
        builder
            .register_shape(ShapeDefinition::new("PkgConf", version("1.0")))
            .unwrap();
        builder
            .register_shape(ShapeDefinition::new("PkgConf", version("2.0")))
            .unwrap();
        let registry = builder.build();

        let from = registry.shape_for("PkgConf", &version("1.0")).unwrap();
        let to = registry.shape_for("PkgConf", &version("2.0")).unwrap();
        assert!(matches!(
            registry.find_path(from, to),
            Err(MigrationError::NoMigrationPath { .. })
        ));
    }

    #[test]
    fn test_missing_shape_is_typed_error() {
        let registry = registry_with_chain();
        assert!(matches!(
            registry.shape_for("PkgConf", &version("9.9")),
            Err(MigrationError::NoSuchShape { .. })
        ));
    }

    #[tokio::test]
    async fn test_apply_and_reverse_path() {
        let mut builder = RegistryBuilder::new();
        builder
            .register_shape(ShapeDefinition::new("Counter", version("1.0")))
            .unwrap();
        builder
            .register_shape(ShapeDefinition::new("Counter", version("2.0")))
            .unwrap();
        builder
            .register_step(Arc::new(FnStep::new(
                "Counter",
                version("1.0"),
                version("2.0"),
                |mut data| {
                    let n = data["n"].as_i64().unwrap_or(0);
                    data["n"] = json!(n + 1);
                    Ok(data)
                },
                |mut data| {
                    let n = data["n"].as_i64().unwrap_or(0);
                    data["n"] = json!(n - 1);
                    Ok(data)
                },
            )))
            .unwrap();
        let registry = builder.build();

        let from = registry.shape_for("Counter", &version("1.0")).unwrap();
        let to = registry.shape_for("Counter", &version("2.0")).unwrap();
        let path = registry.find_path(from, to).unwrap();

        let upgraded = registry.apply_path(&path, json!({"n": 1})).await.unwrap();
        assert_eq!(upgraded, json!({"n": 2}));

        let restored = registry.reverse_path(&path, upgraded).await.unwrap();
        assert_eq!(restored, json!({"n": 1}));
    }
}
