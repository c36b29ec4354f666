// ABOUTME: Command-line argument parsing for the docshift driver
// ABOUTME: Global trace/output flags plus one subcommand per migration operation

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Trace level for logging output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TraceLevel {
    /// No trace output
    Off,
    /// Error level only
    Error,
    /// Warning level and above
    Warn,
    /// Info level and above
    Info,
    /// Debug level and above
    Debug,
    /// Trace level (most verbose)
    Trace,
}

impl From<TraceLevel> for tracing::Level {
    fn from(trace_level: TraceLevel) -> Self {
        match trace_level {
            TraceLevel::Off | TraceLevel::Error => tracing::Level::ERROR,
            TraceLevel::Warn => tracing::Level::WARN,
            TraceLevel::Info => tracing::Level::INFO,
            TraceLevel::Debug => tracing::Level::DEBUG,
            TraceLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Command-line interface for the docshift migration driver
#[derive(Parser, Debug)]
#[command(name = "docshift")]
#[command(version)]
#[command(about = "Migrate versioned JSON documents across schema versions")]
#[command(
    long_about = "docshift migrates collections of versioned JSON documents between \
schema versions without losing data, even across upgrade, edit, rollback, edit, \
and re-upgrade cycles.

EXAMPLES:
    docshift plan-upgrade --manifest manifest.json
    docshift migrate --plan migration-plan.json --transactions .docshift-tx
    docshift plan-rollback --target-version 1.0
    docshift retry --result migration-result.json
    docshift gc
    docshift resume --transactions .docshift-tx"
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Trace level (GLOBAL)
    #[arg(long, global = true, value_enum, default_value = "warn")]
    pub trace: TraceLevel,

    /// Output format (GLOBAL)
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify every discovered document against its latest schema version
    PlanUpgrade {
        /// Manifest listing the documents to consider
        #[arg(long, env = "DOCSHIFT_MANIFEST", default_value = "manifest.json")]
        manifest: PathBuf,

        /// Where the generated plan is written
        #[arg(long, default_value = "migration-plan.json")]
        out: PathBuf,
    },

    /// Classify every discovered document against an explicit older version
    PlanRollback {
        /// Version to roll the documents back to
        #[arg(long)]
        target_version: String,

        /// Manifest listing the documents to consider
        #[arg(long, env = "DOCSHIFT_MANIFEST", default_value = "manifest.json")]
        manifest: PathBuf,

        /// Where the generated plan is written
        #[arg(long, default_value = "migration-plan.json")]
        out: PathBuf,
    },

    /// Execute a previously generated plan
    Migrate {
        /// Plan file produced by plan-upgrade or plan-rollback
        #[arg(long)]
        plan: PathBuf,

        /// Directory for transaction journals; enables resumable execution
        #[arg(long, env = "DOCSHIFT_TRANSACTIONS")]
        transactions: Option<PathBuf>,

        /// Directory for refused documents; enables quarantine
        #[arg(long, env = "DOCSHIFT_QUARANTINE")]
        quarantine: Option<PathBuf>,

        /// Where the migration result is written
        #[arg(long, default_value = "migration-result.json")]
        out: PathBuf,
    },

    /// Re-run exactly the failed items of a previous result
    Retry {
        /// Result file produced by an earlier migrate run
        #[arg(long)]
        result: PathBuf,

        /// Directory for transaction journals; enables resumable execution
        #[arg(long, env = "DOCSHIFT_TRANSACTIONS")]
        transactions: Option<PathBuf>,

        /// Directory for refused documents; enables quarantine
        #[arg(long, env = "DOCSHIFT_QUARANTINE")]
        quarantine: Option<PathBuf>,

        /// Where the migration result is written
        #[arg(long, default_value = "migration-result.json")]
        out: PathBuf,
    },

    /// Delete snapshots made obsolete by the live document versions
    Gc {
        /// Manifest listing the documents to consider
        #[arg(long, env = "DOCSHIFT_MANIFEST", default_value = "manifest.json")]
        manifest: PathBuf,
    },

    /// Roll back an interrupted transaction
    Resume {
        /// Directory holding the in-progress transaction journal
        #[arg(long, env = "DOCSHIFT_TRANSACTIONS")]
        transactions: PathBuf,
    },
}
