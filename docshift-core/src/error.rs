// ABOUTME: Kernel-wide error taxonomy for document migration operations
// ABOUTME: Expected per-item failures are typed variants; infrastructure errors wrap anyhow

use crate::report::QuarantineReason;
use crate::version::{SchemaVersion, VersionParseError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no shape registered for doc type '{doc_type}' at version {version}")]
    NoSuchShape {
        doc_type: String,
        version: SchemaVersion,
    },

    #[error("no migration path for doc type '{doc_type}' from {from} to {to}")]
    NoMigrationPath {
        doc_type: String,
        from: SchemaVersion,
        to: SchemaVersion,
    },

    #[error("snapshot integrity failure: {0}")]
    SnapshotIntegrity(String),

    #[error("schema validation failure: {0}")]
    SchemaValidation(String),

    #[error("execution failure: {0}")]
    Execution(String),

    #[error("planned quarantine: {0}")]
    PlannedQuarantine(String),

    #[error("incomplete transaction: {0}")]
    IncompleteTransaction(String),

    #[error("duplicate identifier in plan: {0}")]
    DuplicatePlanIdentifier(String),

    #[error("invalid schema version: {0}")]
    InvalidVersion(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl MigrationError {
    /// The quarantine reason a per-item failure with this error reports as.
    pub fn quarantine_reason(&self) -> QuarantineReason {
        match self {
            MigrationError::PlannedQuarantine(_) => QuarantineReason::PlannedQuarantine,
            MigrationError::SnapshotIntegrity(_) => QuarantineReason::SnapshotIntegrityFailure,
            MigrationError::SchemaValidation(_) => QuarantineReason::SchemaValidationFailure,
            MigrationError::NoMigrationPath { .. } | MigrationError::NoSuchShape { .. } => {
                QuarantineReason::NoMigrationPath
            }
            _ => QuarantineReason::ExecutionFailure,
        }
    }
}

impl From<std::io::Error> for MigrationError {
    fn from(err: std::io::Error) -> Self {
        MigrationError::Storage(err.into())
    }
}

impl From<serde_json::Error> for MigrationError {
    fn from(err: serde_json::Error) -> Self {
        MigrationError::Serialization(err.to_string())
    }
}

impl From<VersionParseError> for MigrationError {
    fn from(err: VersionParseError) -> Self {
        MigrationError::InvalidVersion(err.to_string())
    }
}

pub type KernelResult<T> = Result<T, MigrationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_maps_to_storage() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: MigrationError = io.into();
        assert!(matches!(err, MigrationError::Storage(_)));
    }

    #[test]
    fn test_version_parse_error_maps_to_invalid_version() {
        let parse_err = "not-a-version".parse::<SchemaVersion>().unwrap_err();
        let err: MigrationError = parse_err.into();
        assert!(matches!(err, MigrationError::InvalidVersion(_)));
    }
}
