// ABOUTME: Shared document model and error taxonomy for the docshift workspace
// ABOUTME: Pure data types; all machinery lives in docshift-kernel

//! # docshift-core
//!
//! Core data model for versioned structured documents:
//! - Schema versions as dotted numeric tuples with component-wise ordering
//! - Documents, snapshots, and bundles with the `_meta` wire codec
//! - Migration plans and per-batch reports as pure serializable data
//! - The kernel-wide error taxonomy

pub mod document;
pub mod error;
pub mod plan;
pub mod report;
pub mod version;

pub use document::{
    attach_wire_meta, read_wire_document, split_wire_document, write_wire_document, DocumentBundle,
    DocumentMeta, Snapshot, VersionedDocument, META_KEY,
};
pub use error::{KernelResult, MigrationError};
pub use plan::{ActionKind, MigrationPlan, PlanAction, PlanHeader};
pub use report::{
    DataMigrationResult, FailedMigration, JournalOperation, JournalStatus, MigrationReport,
    MigrationSuccess, MigrationSummary, OperationStatus, QuarantineReason, QuarantineRecord,
    ReportStatus, TransactionJournal,
};
pub use version::{SchemaVersion, VersionParseError};
