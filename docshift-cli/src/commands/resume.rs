// ABOUTME: resume command: roll back an interrupted transaction

use crate::cli::OutputFormat;
use crate::output;
use docshift_core::KernelResult;
use docshift_kernel::TransactionStore;
use std::path::Path;

pub async fn resume(transactions: &Path, format: OutputFormat) -> KernelResult<i32> {
    let store = TransactionStore::new(transactions);
    let report = store.resume().await?;
    output::print_report(&report, format)?;
    Ok(0)
}
