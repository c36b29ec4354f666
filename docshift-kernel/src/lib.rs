// ABOUTME: Migration kernel for versioned structured documents
// ABOUTME: Registry, planner, three-way merger, runner, snapshots, transactions, quarantine

//! # docshift-kernel
//!
//! The migration kernel manages the lifecycle of versioned JSON-like
//! documents as application schemas evolve:
//!
//! - A [`registry::MigrationRegistry`] maps `(doc_type, version)` pairs to
//!   shapes and holds the bidirectional steps between them.
//! - The [`planner::MigrationPlanner`] classifies each document bundle
//!   into one action against a target version; plans are pure data.
//! - The [`runner::MigrationRunner`] executes plans, invoking the
//!   [`merge::ThreeWayMerger`] whenever rollback history is present, so a
//!   sequence of upgrade, edit, rollback, edit, re-upgrade loses nothing.
//! - The [`snapshot::SnapshotStore`] keeps integrity-checked history and
//!   the [`transaction::TransactionStore`] makes batch runs resumable.
//! - The [`quarantine::QuarantineStore`] moves refused documents aside
//!   with a structured diagnostic.
//!
//! ## Example
//!
//! ```rust,ignore
//! use docshift_kernel::prelude::*;
//!
//! let mut builder = MigrationRegistry::builder();
//! builder.register_doc_type("PkgConf", shapes)?;
//! builder.register_step(step)?;
//! let service = MigrationService::new(Arc::new(builder.build()), KernelConfig::default());
//!
//! let plan = service.plan_upgrade(&bundles);
//! let report = service.execute(&plan, &bundles_by_id).await?;
//! ```

pub mod atomic;
pub mod config;
pub mod events;
pub mod merge;
pub mod planner;
pub mod quarantine;
pub mod registry;
pub mod runner;
pub mod service;
pub mod snapshot;
pub mod transaction;
pub mod validation;

pub use config::KernelConfig;
pub use events::MigrationEvent;
pub use merge::{ConflictPolicy, ThreeWayMerger, CONFLICT_POLICY};
pub use planner::MigrationPlanner;
pub use quarantine::{QuarantineOutcome, QuarantineStore};
pub use registry::{
    FieldSchema, FnStep, MergeOutcome, MigrationRegistry, MigrationStep, RegistryBuilder,
    ShapeDefinition, ShapeId, StepId,
};
pub use runner::MigrationRunner;
pub use service::{DocumentSink, MigrationService, NullSink, RunContext};
pub use snapshot::{GcReport, SnapshotStore};
pub use transaction::{ActiveTransaction, TransactionStore};
pub use validation::{ShapeValidator, ValidationIssue, ValidationVerdict};

/// Prelude for hosts wiring up the kernel.
pub mod prelude {
    pub use crate::{
        FieldSchema, FnStep, KernelConfig, MergeOutcome, MigrationRegistry, MigrationService,
        MigrationStep, RegistryBuilder, ShapeDefinition, SnapshotStore,
    };
    pub use docshift_core::{
        ActionKind, DocumentBundle, DocumentMeta, KernelResult, MigrationError, MigrationPlan,
        MigrationReport, SchemaVersion, Snapshot, VersionedDocument,
    };
}
