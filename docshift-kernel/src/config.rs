// ABOUTME: Kernel configuration consumed by the migration service
// ABOUTME: Paths for side storage plus execution toggles

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for one kernel instance. Everything is optional; the
/// default runs non-transactionally with quarantine disabled and shape
/// validation on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KernelConfig {
    /// Where refused documents are moved. `None` disables quarantine.
    pub quarantine_dir: Option<PathBuf>,

    /// Where transaction journals and backups live. `None` disables
    /// resumable execution.
    pub transaction_dir: Option<PathBuf>,

    /// Plan and report without touching any document.
    pub dry_run: bool,

    /// Validate documents against their registered shape at load time.
    pub validate_on_load: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            quarantine_dir: None,
            transaction_dir: None,
            dry_run: false,
            validate_on_load: true,
        }
    }
}

impl KernelConfig {
    pub fn with_quarantine_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.quarantine_dir = Some(dir.into());
        self
    }

    pub fn with_transaction_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.transaction_dir = Some(dir.into());
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_validate_on_load(mut self, validate: bool) -> Self {
        self.validate_on_load = validate;
        self
    }
}
