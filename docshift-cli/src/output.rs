// ABOUTME: Human and JSON rendering of plans, reports, and GC results

use crate::cli::OutputFormat;
use docshift_core::{ActionKind, KernelResult, MigrationPlan, MigrationReport};
use docshift_kernel::GcReport;

pub fn print_plan(plan: &MigrationPlan, format: OutputFormat) -> KernelResult<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(plan)?),
        OutputFormat::Text => {
            println!(
                "Plan targeting version {} ({} actions)",
                plan.header.target_version,
                plan.actions.len()
            );
            for action in &plan.actions {
                println!("  {:<18} {} - {}", kind_label(action.kind), action.id, action.details);
            }
        }
    }
    Ok(())
}

pub fn print_report(report: &MigrationReport, format: OutputFormat) -> KernelResult<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Text => {
            let summary = &report.summary;
            println!(
                "{}: {} processed, {} succeeded, {} failed, {} skipped in {:?}",
                summary.status,
                summary.processed,
                summary.succeeded,
                summary.failed,
                summary.skipped,
                summary.duration
            );
            for failure in &report.failures {
                println!(
                    "  FAILED {} ({:?}): {}",
                    failure.id, failure.record.reason, failure.record.details
                );
            }
        }
    }
    Ok(())
}

pub fn print_gc_report(report: &GcReport, format: OutputFormat) -> KernelResult<()> {
    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "examined": report.examined,
                "deleted": report.deleted,
                "retained": report.retained,
                "corrupt": report.corrupt,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => {
            println!(
                "GC: {} examined, {} deleted, {} retained, {} corrupt",
                report.examined,
                report.deleted.len(),
                report.retained,
                report.corrupt.len()
            );
            for name in &report.corrupt {
                println!("  CORRUPT {name}");
            }
        }
    }
    Ok(())
}

fn kind_label(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Skip => "SKIP",
        ActionKind::StandardUpgrade => "STANDARD_UPGRADE",
        ActionKind::StandardDowngrade => "STANDARD_DOWNGRADE",
        ActionKind::ThreeWayMerge => "THREE_WAY_MERGE",
        ActionKind::Quarantine => "QUARANTINE",
    }
}
