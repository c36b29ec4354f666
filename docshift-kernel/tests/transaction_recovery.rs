// ABOUTME: Crash recovery of resumable batch transactions
// ABOUTME: A batch interrupted after backup restores bit-exactly on resume

mod common;

use common::{package_config_registry, version};
use docshift_core::{
    DocumentBundle, DocumentMeta, MigrationError, ReportStatus, VersionedDocument,
};
use docshift_kernel::{KernelConfig, MigrationService, NullSink, TransactionStore};
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

async fn write_doc(path: &Path, timeout: i64) {
    let content = serde_json::to_vec_pretty(&json!({
        "_meta": {"DocType": "PkgConf", "SchemaVersion": "1.0"},
        "timeout": timeout,
        "plugins": []
    }))
    .unwrap();
    tokio::fs::write(path, content).await.unwrap();
}

fn doc_bundle(path: &Path, timeout: i64) -> DocumentBundle {
    DocumentBundle::without_history(VersionedDocument::new(
        path.to_string_lossy().into_owned(),
        json!({"timeout": timeout, "plugins": []}),
        DocumentMeta::new("PkgConf", version("1.0")),
    ))
}

#[tokio::test]
async fn test_crash_between_backup_and_commit_is_recoverable() {
    let dir = tempfile::tempdir().unwrap();
    let tx_dir = dir.path().join("transactions");

    let paths: Vec<PathBuf> = (0..3)
        .map(|i| dir.path().join(format!("doc-{i}.json")))
        .collect();
    let mut originals = Vec::new();
    for (i, path) in paths.iter().enumerate() {
        write_doc(path, i as i64 * 10).await;
        originals.push(tokio::fs::read(path).await.unwrap());
    }

    // Start a transaction, back everything up, mutate the files, then
    // crash before commit by dropping the handle.
    let store = TransactionStore::new(&tx_dir);
    let mut transaction = store.begin(paths.clone()).await.unwrap();
    transaction.backup_files().await.unwrap();
    for path in &paths {
        tokio::fs::write(path, b"half-migrated garbage").await.unwrap();
    }
    drop(transaction);

    // A new batch refuses to start while the journal is in progress.
    let config = KernelConfig::default().with_transaction_dir(&tx_dir);
    let service = MigrationService::new(package_config_registry(), config);
    let bundles: Vec<DocumentBundle> = paths
        .iter()
        .enumerate()
        .map(|(i, p)| doc_bundle(p, i as i64 * 10))
        .collect();
    let by_id: HashMap<String, DocumentBundle> = bundles
        .iter()
        .map(|b| (b.current.id.clone(), b.clone()))
        .collect();
    let plan = service.plan_upgrade(&bundles);
    let refused = service
        .execute_transactional(&plan, &by_id, &mut NullSink)
        .await;
    assert!(matches!(
        refused,
        Err(MigrationError::IncompleteTransaction(_))
    ));

    // Resume restores all three originals bit-exactly and cleans up.
    let report = service.resume().await.unwrap();
    assert_eq!(report.summary.status, ReportStatus::RolledBack);
    assert_eq!(report.summary.processed, 0);
    assert_eq!(report.summary.succeeded + report.summary.failed, 0);

    for (path, original) in paths.iter().zip(&originals) {
        assert_eq!(&tokio::fs::read(path).await.unwrap(), original);
    }
    let leftovers: Vec<String> = std::fs::read_dir(&tx_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert!(leftovers.is_empty(), "leftovers: {leftovers:?}");

    // With the journal gone, the next transactional batch goes through.
    let report = service
        .execute_transactional(&plan, &by_id, &mut NullSink)
        .await
        .unwrap();
    assert_eq!(report.summary.succeeded, 3);
}

#[tokio::test]
async fn test_resume_with_nothing_pending_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = KernelConfig::default().with_transaction_dir(dir.path().join("tx"));
    let service = MigrationService::new(package_config_registry(), config);

    let result = service.resume().await;
    assert!(matches!(
        result,
        Err(MigrationError::IncompleteTransaction(_))
    ));
}

#[tokio::test]
async fn test_committed_batch_leaves_no_transaction_state() {
    let dir = tempfile::tempdir().unwrap();
    let tx_dir = dir.path().join("transactions");
    let doc = dir.path().join("doc.json");
    write_doc(&doc, 30).await;

    let config = KernelConfig::default().with_transaction_dir(&tx_dir);
    let service = MigrationService::new(package_config_registry(), config);

    let bundles = vec![doc_bundle(&doc, 30)];
    let by_id: HashMap<String, DocumentBundle> = bundles
        .iter()
        .map(|b| (b.current.id.clone(), b.clone()))
        .collect();
    let plan = service.plan_upgrade(&bundles);

    let report = service
        .execute_transactional(&plan, &by_id, &mut NullSink)
        .await
        .unwrap();
    assert_eq!(report.summary.succeeded, 1);

    let leftovers: Vec<String> = std::fs::read_dir(&tx_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert!(leftovers.is_empty());
}
