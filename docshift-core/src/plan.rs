// ABOUTME: Migration plans as pure serializable data
// ABOUTME: A plan is an ordered classification of documents into actions

use crate::version::SchemaVersion;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the runner should do with one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    Skip,
    StandardUpgrade,
    StandardDowngrade,
    ThreeWayMerge,
    Quarantine,
}

/// One planned action. `details` carries the planner's reasoning for
/// quarantines and a short description otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanAction {
    pub id: String,
    pub kind: ActionKind,
    pub details: String,
}

impl PlanAction {
    pub fn new(id: impl Into<String>, kind: ActionKind, details: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            details: details.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanHeader {
    pub target_version: SchemaVersion,
    pub generated_at_utc: DateTime<Utc>,
}

/// An ordered, pure classification of a bundle collection. Action order
/// equals the planner's input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationPlan {
    pub header: PlanHeader,
    pub actions: Vec<PlanAction>,
}

impl MigrationPlan {
    pub fn new(target_version: SchemaVersion, actions: Vec<PlanAction>) -> Self {
        Self {
            header: PlanHeader {
                target_version,
                generated_at_utc: Utc::now(),
            },
            actions,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn count_of(&self, kind: ActionKind) -> usize {
        self.actions.iter().filter(|a| a.kind == kind).count()
    }

    /// Actions the runner will actually touch on disk (everything but SKIP).
    pub fn effective_actions(&self) -> impl Iterator<Item = &PlanAction> {
        self.actions.iter().filter(|a| a.kind != ActionKind::Skip)
    }
}
