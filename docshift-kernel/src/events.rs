// ABOUTME: Typed migration events for observability
// ABOUTME: Emitted through tracing by the runner and transaction store

use docshift_core::{ActionKind, QuarantineReason, SchemaVersion};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Lifecycle events of one batch run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum MigrationEvent {
    RunStarted {
        run_id: Uuid,
        target_version: SchemaVersion,
        total_actions: usize,
    },
    ItemCompleted {
        run_id: Uuid,
        id: String,
        kind: ActionKind,
    },
    ItemFailed {
        run_id: Uuid,
        id: String,
        reason: QuarantineReason,
    },
    RunCompleted {
        run_id: Uuid,
        succeeded: usize,
        failed: usize,
        skipped: usize,
        duration: Duration,
    },
    RollbackCompleted {
        transaction_id: String,
        files_restored: usize,
    },
}

impl MigrationEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            MigrationEvent::RunStarted { .. } => "run_started",
            MigrationEvent::ItemCompleted { .. } => "item_completed",
            MigrationEvent::ItemFailed { .. } => "item_failed",
            MigrationEvent::RunCompleted { .. } => "run_completed",
            MigrationEvent::RollbackCompleted { .. } => "rollback_completed",
        }
    }

    /// Emit this event as a structured tracing record.
    pub fn emit(&self) {
        match self {
            MigrationEvent::RunStarted {
                run_id,
                target_version,
                total_actions,
            } => info!(
                event = self.event_type(),
                %run_id,
                target = %target_version,
                total_actions,
                "migration run started"
            ),
            MigrationEvent::ItemCompleted { run_id, id, kind } => info!(
                event = self.event_type(),
                %run_id,
                doc = %id,
                kind = ?kind,
                "document migrated"
            ),
            MigrationEvent::ItemFailed { run_id, id, reason } => warn!(
                event = self.event_type(),
                %run_id,
                doc = %id,
                reason = ?reason,
                "document failed"
            ),
            MigrationEvent::RunCompleted {
                run_id,
                succeeded,
                failed,
                skipped,
                duration,
            } => info!(
                event = self.event_type(),
                %run_id,
                succeeded,
                failed,
                skipped,
                duration_ms = duration.as_millis() as u64,
                "migration run completed"
            ),
            MigrationEvent::RollbackCompleted {
                transaction_id,
                files_restored,
            } => info!(
                event = self.event_type(),
                transaction = %transaction_id,
                files_restored,
                "transaction rolled back"
            ),
        }
    }
}
