// ABOUTME: Per-document and per-batch migration results, quarantine records
// ABOUTME: Also defines the durable transaction journal wire form

use crate::document::{DocumentMeta, Snapshot};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// What the runner produced for one successfully processed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataMigrationResult {
    pub data: Value,
    pub new_meta: DocumentMeta,
    pub snapshots_to_persist: Vec<Snapshot>,
    pub snapshots_to_delete: Vec<DocumentMeta>,
}

impl DataMigrationResult {
    /// A result that leaves the document untouched (SKIP).
    pub fn unchanged(data: Value, meta: DocumentMeta) -> Self {
        Self {
            data,
            new_meta: meta,
            snapshots_to_persist: Vec::new(),
            snapshots_to_delete: Vec::new(),
        }
    }
}

/// Why a document was refused and moved aside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuarantineReason {
    SchemaValidationFailure,
    SnapshotIntegrityFailure,
    ExecutionFailure,
    PlannedQuarantine,
    NoMigrationPath,
}

impl QuarantineReason {
    /// Canned operator guidance included in every quarantine report.
    pub fn suggested_next_steps(self) -> &'static str {
        match self {
            QuarantineReason::SchemaValidationFailure => {
                "Fix the document so it conforms to its declared shape, then retry."
            }
            QuarantineReason::SnapshotIntegrityFailure => {
                "Restore the snapshot file from backup or delete it if its history is expendable, then retry."
            }
            QuarantineReason::ExecutionFailure => {
                "Inspect the failure details, correct the document or the migration step, then retry."
            }
            QuarantineReason::PlannedQuarantine => {
                "Re-plan after registering the missing shapes or choosing a reachable target version."
            }
            QuarantineReason::NoMigrationPath => {
                "Register a migration step chain covering this version span, then re-plan."
            }
        }
    }
}

/// Structured diagnostic written alongside a quarantined document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuarantineRecord {
    pub id: String,
    pub reason: QuarantineReason,
    pub details: String,
    pub content_hash: String,
    pub suggested_next_steps: String,
}

impl QuarantineRecord {
    pub fn new(
        id: impl Into<String>,
        reason: QuarantineReason,
        details: impl Into<String>,
        content_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            reason,
            details: details.into(),
            content_hash: content_hash.into(),
            suggested_next_steps: reason.suggested_next_steps().to_string(),
        }
    }
}

/// Terminal state of a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportStatus {
    #[serde(rename = "Completed")]
    Completed,
    #[serde(rename = "Rolled Back")]
    RolledBack,
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportStatus::Completed => write!(f, "Completed"),
            ReportStatus::RolledBack => write!(f, "Rolled Back"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationSummary {
    pub status: ReportStatus,
    pub duration: Duration,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationSuccess {
    pub id: String,
    pub result: DataMigrationResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedMigration {
    pub id: String,
    pub original_data: Value,
    pub original_meta: DocumentMeta,
    pub record: QuarantineRecord,
}

/// Outcome of running a plan. The kernel never aborts a batch on a
/// per-item failure: every item lands in `successes` or `failures`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub summary: MigrationSummary,
    pub successes: Vec<MigrationSuccess>,
    pub failures: Vec<FailedMigration>,
}

impl MigrationReport {
    pub fn started() -> Self {
        Self {
            summary: MigrationSummary {
                status: ReportStatus::Completed,
                duration: Duration::ZERO,
                processed: 0,
                succeeded: 0,
                failed: 0,
                skipped: 0,
            },
            successes: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// The report a resume operation returns: nothing processed, batch
    /// restored to its pre-transaction state.
    pub fn rolled_back(duration: Duration) -> Self {
        Self {
            summary: MigrationSummary {
                status: ReportStatus::RolledBack,
                duration,
                processed: 0,
                succeeded: 0,
                failed: 0,
                skipped: 0,
            },
            successes: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn record_success(&mut self, id: impl Into<String>, result: DataMigrationResult) {
        self.successes.push(MigrationSuccess {
            id: id.into(),
            result,
        });
        self.summary.succeeded += 1;
    }

    pub fn record_skip(&mut self, id: impl Into<String>, result: DataMigrationResult) {
        self.record_success(id, result);
        self.summary.skipped += 1;
    }

    pub fn record_failure(&mut self, failure: FailedMigration) {
        self.failures.push(failure);
        self.summary.failed += 1;
    }

    /// Fold in a failure detected before the runner saw the item (for
    /// example a snapshot that would not verify at load time).
    pub fn absorb_preflight_failure(&mut self, failure: FailedMigration) {
        self.summary.processed += 1;
        self.record_failure(failure);
    }

    pub fn finalize(&mut self, processed: usize, duration: Duration) {
        self.summary.processed += processed;
        self.summary.duration = duration;
    }

    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }
}

/// Per-file progress inside a resumable transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationStatus {
    Pending,
    BackedUp,
    Processing,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalStatus {
    InProgress,
    Committed,
    RolledBack,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalOperation {
    pub file_path: String,
    pub status: OperationStatus,
}

/// Durable record of one resumable batch transaction. Serialized as
/// `{"transactionId", "status", "operations": [{"filePath", "status"}]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionJournal {
    pub transaction_id: String,
    pub status: JournalStatus,
    pub operations: Vec<JournalOperation>,
}

impl TransactionJournal {
    pub fn new(transaction_id: impl Into<String>, file_paths: Vec<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            status: JournalStatus::InProgress,
            operations: file_paths
                .into_iter()
                .map(|file_path| JournalOperation {
                    file_path,
                    status: OperationStatus::Pending,
                })
                .collect(),
        }
    }

    pub fn operation_mut(&mut self, file_path: &str) -> Option<&mut JournalOperation> {
        self.operations
            .iter_mut()
            .find(|op| op.file_path == file_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(version: &str) -> DocumentMeta {
        DocumentMeta::new("PkgConf", version.parse().unwrap())
    }

    #[test]
    fn test_report_counters() {
        let mut report = MigrationReport::started();
        report.record_skip("a", DataMigrationResult::unchanged(json!({}), meta("1.0")));
        report.record_success("b", DataMigrationResult::unchanged(json!({}), meta("2.0")));
        report.record_failure(FailedMigration {
            id: "c".to_string(),
            original_data: json!({}),
            original_meta: meta("1.0"),
            record: QuarantineRecord::new(
                "c",
                QuarantineReason::ExecutionFailure,
                "boom",
                "deadbeef",
            ),
        });
        report.finalize(3, Duration::from_millis(5));

        assert_eq!(report.summary.processed, 3);
        assert_eq!(report.summary.succeeded, 2);
        assert_eq!(report.summary.skipped, 1);
        assert_eq!(report.summary.failed, 1);
        assert!(report.has_failures());
    }

    #[test]
    fn test_rolled_back_report_is_empty() {
        let report = MigrationReport::rolled_back(Duration::from_secs(1));
        assert_eq!(report.summary.status, ReportStatus::RolledBack);
        assert_eq!(report.summary.processed, 0);
        assert!(report.successes.is_empty() && report.failures.is_empty());
    }

    #[test]
    fn test_report_status_wire_form() {
        let json = serde_json::to_string(&ReportStatus::RolledBack).unwrap();
        assert_eq!(json, "\"Rolled Back\"");
    }

    #[test]
    fn test_journal_wire_form() {
        let journal = TransactionJournal::new("tx-1", vec!["a.json".to_string()]);
        let json = serde_json::to_value(&journal).unwrap();

        assert_eq!(json["transactionId"], "tx-1");
        assert_eq!(json["status"], "InProgress");
        assert_eq!(json["operations"][0]["filePath"], "a.json");
        assert_eq!(json["operations"][0]["status"], "Pending");
    }

    #[test]
    fn test_quarantine_record_carries_guidance() {
        let record = QuarantineRecord::new(
            "doc-1",
            QuarantineReason::NoMigrationPath,
            "no step chain from 1.0 to 3.0",
            "abcd1234",
        );
        assert!(record.suggested_next_steps.contains("migration step"));
    }
}
