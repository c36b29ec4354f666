// ABOUTME: Bidirectional migration step trait plus a closure-backed implementation
// ABOUTME: A step may additionally claim properties for semantic three-way merging

use async_trait::async_trait;
use docshift_core::{KernelResult, SchemaVersion};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Decision returned by a step's semantic merge handler for one property.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// Use this value for the property.
    Merged(Value),
    /// Omit the property from the merged document entirely.
    Drop,
    /// The handler declines; the structural pass covers the property.
    Unhandled,
}

/// A reversible transformation between two versions of one document family.
///
/// `apply` carries a document from `from_version` shape to `to_version`
/// shape; `reverse` undoes it. Both may suspend (steps are allowed to do
/// blocking or cooperative work) and both may fail with a typed error.
#[async_trait]
pub trait MigrationStep: Send + Sync {
    fn doc_type(&self) -> &str;
    fn from_version(&self) -> &SchemaVersion;
    fn to_version(&self) -> &SchemaVersion;

    async fn apply(&self, data: Value) -> KernelResult<Value>;
    async fn reverse(&self, data: Value) -> KernelResult<Value>;

    /// Property names this step merges semantically during re-upgrade.
    /// Empty by default; a step whose property types change across the
    /// versions (list to map, say) should claim those properties.
    fn claimed_properties(&self) -> &[String] {
        &[]
    }

    /// Merge one claimed property from the three sides of a re-upgrade.
    /// Only invoked for names in `claimed_properties`; the default declines
    /// so the structural pass takes over.
    fn merge_property(
        &self,
        _property: &str,
        _base: Option<&Value>,
        _mine: Option<&Value>,
        _theirs: Option<&Value>,
    ) -> MergeOutcome {
        MergeOutcome::Unhandled
    }
}

type ApplyFn = Arc<dyn Fn(Value) -> KernelResult<Value> + Send + Sync>;
type MergeFn =
    Arc<dyn Fn(&str, Option<&Value>, Option<&Value>, Option<&Value>) -> MergeOutcome + Send + Sync>;

/// A migration step assembled from closures at the host boundary.
#[derive(Clone)]
pub struct FnStep {
    doc_type: String,
    from_version: SchemaVersion,
    to_version: SchemaVersion,
    apply: ApplyFn,
    reverse: ApplyFn,
    claimed: Vec<String>,
    merge: Option<MergeFn>,
}

impl FnStep {
    pub fn new(
        doc_type: impl Into<String>,
        from_version: SchemaVersion,
        to_version: SchemaVersion,
        apply: impl Fn(Value) -> KernelResult<Value> + Send + Sync + 'static,
        reverse: impl Fn(Value) -> KernelResult<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            doc_type: doc_type.into(),
            from_version,
            to_version,
            apply: Arc::new(apply),
            reverse: Arc::new(reverse),
            claimed: Vec::new(),
            merge: None,
        }
    }

    /// Attach a semantic merge handler claiming the given property names.
    pub fn with_semantic_merge(
        mut self,
        claimed: Vec<String>,
        merge: impl Fn(&str, Option<&Value>, Option<&Value>, Option<&Value>) -> MergeOutcome
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.claimed = claimed;
        self.merge = Some(Arc::new(merge));
        self
    }
}

impl fmt::Debug for FnStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStep")
            .field("doc_type", &self.doc_type)
            .field("from_version", &self.from_version)
            .field("to_version", &self.to_version)
            .field("claimed", &self.claimed)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MigrationStep for FnStep {
    fn doc_type(&self) -> &str {
        &self.doc_type
    }

    fn from_version(&self) -> &SchemaVersion {
        &self.from_version
    }

    fn to_version(&self) -> &SchemaVersion {
        &self.to_version
    }

    async fn apply(&self, data: Value) -> KernelResult<Value> {
        (self.apply)(data)
    }

    async fn reverse(&self, data: Value) -> KernelResult<Value> {
        (self.reverse)(data)
    }

    fn claimed_properties(&self) -> &[String] {
        &self.claimed
    }

    fn merge_property(
        &self,
        property: &str,
        base: Option<&Value>,
        mine: Option<&Value>,
        theirs: Option<&Value>,
    ) -> MergeOutcome {
        match &self.merge {
            Some(handler) => handler(property, base, mine, theirs),
            None => MergeOutcome::Unhandled,
        }
    }
}
