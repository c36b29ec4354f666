// ABOUTME: Durable, resumable batch transactions over file-system documents
// ABOUTME: Journal scan doubles as the batch lock; backups restore on resume

use crate::atomic::atomic_write;
use crate::events::MigrationEvent;
use docshift_core::{
    JournalStatus, KernelResult, MigrationError, MigrationReport, OperationStatus,
    TransactionJournal,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

const JOURNAL_PREFIX: &str = "journal-";
const JOURNAL_EXT: &str = ".json";

/// Store of transaction journals under one directory.
///
/// The preflight scan is the lock: a second process seeing an `InProgress`
/// journal refuses to start new work.
#[derive(Debug, Clone)]
pub struct TransactionStore {
    root: PathBuf,
}

impl TransactionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn journal_path(&self, transaction_id: &str) -> PathBuf {
        self.root
            .join(format!("{JOURNAL_PREFIX}{transaction_id}{JOURNAL_EXT}"))
    }

    fn backup_dir(&self, transaction_id: &str) -> PathBuf {
        self.root.join(format!("backup-{transaction_id}"))
    }

    async fn scan(&self) -> KernelResult<Vec<(PathBuf, TransactionJournal)>> {
        let mut journals = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(journals),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(JOURNAL_PREFIX) || !name.ends_with(JOURNAL_EXT) {
                continue;
            }
            let path = entry.path();
            let bytes = tokio::fs::read(&path).await?;
            let journal: TransactionJournal = serde_json::from_slice(&bytes).map_err(|e| {
                MigrationError::Serialization(format!(
                    "journal '{}' unreadable: {e}",
                    path.display()
                ))
            })?;
            journals.push((path, journal));
        }
        Ok(journals)
    }

    async fn find_in_progress(&self) -> KernelResult<Option<(PathBuf, TransactionJournal)>> {
        Ok(self
            .scan()
            .await?
            .into_iter()
            .find(|(_, journal)| journal.status == JournalStatus::InProgress))
    }

    /// Refuse to start while a prior transaction is still in progress.
    pub async fn preflight(&self) -> KernelResult<()> {
        if let Some((path, journal)) = self.find_in_progress().await? {
            return Err(MigrationError::IncompleteTransaction(format!(
                "transaction '{}' is in progress (journal {}); run resume before starting new work",
                journal.transaction_id,
                path.display()
            )));
        }
        Ok(())
    }

    /// Mint a transaction covering the given files and persist its journal.
    pub async fn begin(&self, file_paths: Vec<PathBuf>) -> KernelResult<ActiveTransaction> {
        self.preflight().await?;

        let transaction_id = Uuid::new_v4().to_string();
        let journal = TransactionJournal::new(
            transaction_id.clone(),
            file_paths
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
        );

        let mut active = ActiveTransaction {
            journal_path: self.journal_path(&transaction_id),
            backup_dir: self.backup_dir(&transaction_id),
            journal,
        };
        active.write_journal().await?;
        info!(transaction = %transaction_id, files = file_paths.len(), "transaction started");
        Ok(active)
    }

    /// Roll the in-progress transaction back: restore every backed-up file
    /// bit-exactly, then remove the journal and backup directory.
    pub async fn resume(&self) -> KernelResult<MigrationReport> {
        let started = Instant::now();
        let Some((journal_path, mut journal)) = self.find_in_progress().await? else {
            return Err(MigrationError::IncompleteTransaction(
                "no in-progress transaction to resume".to_string(),
            ));
        };

        info!(transaction = %journal.transaction_id, "resuming interrupted transaction");
        let backup_dir = self.backup_dir(&journal.transaction_id);

        let mut restored = 0usize;
        for operation in &journal.operations {
            let original = PathBuf::from(&operation.file_path);
            let backup = backup_file_path(&backup_dir, &original, &journal.transaction_id);
            if tokio::fs::try_exists(&backup).await? {
                tokio::fs::copy(&backup, &original).await?;
                restored += 1;
                debug!(file = %original.display(), "restored from backup");
            }
        }

        journal.status = JournalStatus::RolledBack;
        atomic_write(&journal_path, &serde_json::to_vec_pretty(&journal)?).await?;

        if tokio::fs::try_exists(&backup_dir).await? {
            tokio::fs::remove_dir_all(&backup_dir).await?;
        }
        tokio::fs::remove_file(&journal_path).await?;

        MigrationEvent::RollbackCompleted {
            transaction_id: journal.transaction_id.clone(),
            files_restored: restored,
        }
        .emit();
        Ok(MigrationReport::rolled_back(started.elapsed()))
    }
}

fn backup_file_path(backup_dir: &Path, original: &Path, transaction_id: &str) -> PathBuf {
    let basename = original
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unnamed".to_string());
    backup_dir.join(format!("{basename}.{transaction_id}.backup"))
}

/// A live transaction: journal plus backup directory, both owned until
/// commit or abandonment.
pub struct ActiveTransaction {
    journal_path: PathBuf,
    backup_dir: PathBuf,
    journal: TransactionJournal,
}

impl ActiveTransaction {
    pub fn transaction_id(&self) -> &str {
        &self.journal.transaction_id
    }

    pub fn journal(&self) -> &TransactionJournal {
        &self.journal
    }

    async fn write_journal(&mut self) -> KernelResult<()> {
        atomic_write(&self.journal_path, &serde_json::to_vec_pretty(&self.journal)?).await
    }

    /// Copy every existing file into the backup directory, advancing each
    /// operation to `BackedUp` with an atomic journal rewrite per file.
    pub async fn backup_files(&mut self) -> KernelResult<()> {
        let paths: Vec<String> = self
            .journal
            .operations
            .iter()
            .map(|op| op.file_path.clone())
            .collect();

        for file_path in paths {
            let original = PathBuf::from(&file_path);
            if !tokio::fs::try_exists(&original).await? {
                debug!(file = %original.display(), "nothing to back up, file does not exist yet");
                continue;
            }
            tokio::fs::create_dir_all(&self.backup_dir).await?;
            let backup =
                backup_file_path(&self.backup_dir, &original, &self.journal.transaction_id);
            tokio::fs::copy(&original, &backup).await?;

            if let Some(op) = self.journal.operation_mut(&file_path) {
                op.status = OperationStatus::BackedUp;
            }
            self.write_journal().await?;
            debug!(file = %original.display(), backup = %backup.display(), "file backed up");
        }
        Ok(())
    }

    pub async fn mark_processing(&mut self, file_path: &str) -> KernelResult<()> {
        self.set_status(file_path, OperationStatus::Processing).await
    }

    pub async fn mark_completed(&mut self, file_path: &str) -> KernelResult<()> {
        self.set_status(file_path, OperationStatus::Completed).await
    }

    async fn set_status(&mut self, file_path: &str, status: OperationStatus) -> KernelResult<()> {
        match self.journal.operation_mut(file_path) {
            Some(op) => {
                op.status = status;
                self.write_journal().await
            }
            None => {
                warn!(file = %file_path, "no journal operation for file");
                Ok(())
            }
        }
    }

    /// Mark the journal committed, then remove the backup directory and
    /// the journal itself.
    pub async fn commit(mut self) -> KernelResult<()> {
        self.journal.status = JournalStatus::Committed;
        self.write_journal().await?;

        if tokio::fs::try_exists(&self.backup_dir).await? {
            tokio::fs::remove_dir_all(&self.backup_dir).await?;
        }
        tokio::fs::remove_file(&self.journal_path).await?;
        info!(transaction = %self.journal.transaction_id, "transaction committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docshift_core::ReportStatus;

    async fn write_file(path: &Path, content: &str) {
        tokio::fs::write(path, content).await.unwrap();
    }

    #[tokio::test]
    async fn test_begin_writes_journal() {
        let dir = tempfile::tempdir().unwrap();
        let store = TransactionStore::new(dir.path().join("tx"));

        let active = store.begin(vec![PathBuf::from("a.json")]).await.unwrap();
        let journal_name = format!("journal-{}.json", active.transaction_id());
        assert!(dir.path().join("tx").join(journal_name).exists());
        assert_eq!(active.journal().status, JournalStatus::InProgress);
        assert_eq!(
            active.journal().operations[0].status,
            OperationStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_preflight_refuses_second_transaction() {
        let dir = tempfile::tempdir().unwrap();
        let store = TransactionStore::new(dir.path().join("tx"));

        let _active = store.begin(vec![]).await.unwrap();
        let result = store.begin(vec![]).await;
        assert!(matches!(
            result,
            Err(MigrationError::IncompleteTransaction(_))
        ));
    }

    #[tokio::test]
    async fn test_backup_and_resume_restore_bit_exact() {
        let dir = tempfile::tempdir().unwrap();
        let store = TransactionStore::new(dir.path().join("tx"));

        let doc_a = dir.path().join("a.json");
        let doc_b = dir.path().join("b.json");
        write_file(&doc_a, "original-a").await;
        write_file(&doc_b, "original-b").await;

        let mut active = store
            .begin(vec![doc_a.clone(), doc_b.clone()])
            .await
            .unwrap();
        active.backup_files().await.unwrap();

        // Simulate partial execution, then a crash before commit.
        write_file(&doc_a, "mutated-a").await;
        write_file(&doc_b, "mutated-b").await;
        drop(active);

        let report = store.resume().await.unwrap();
        assert_eq!(report.summary.status, ReportStatus::RolledBack);
        assert_eq!(report.summary.processed, 0);

        assert_eq!(tokio::fs::read(&doc_a).await.unwrap(), b"original-a");
        assert_eq!(tokio::fs::read(&doc_b).await.unwrap(), b"original-b");

        // Journal and backups are gone; new work may begin.
        assert!(store.find_in_progress().await.unwrap().is_none());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("tx"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(leftovers.is_empty(), "leftovers: {leftovers:?}");
        store.preflight().await.unwrap();
    }

    #[tokio::test]
    async fn test_commit_removes_journal_and_backups() {
        let dir = tempfile::tempdir().unwrap();
        let store = TransactionStore::new(dir.path().join("tx"));

        let doc = dir.path().join("doc.json");
        write_file(&doc, "content").await;

        let mut active = store.begin(vec![doc.clone()]).await.unwrap();
        active.backup_files().await.unwrap();
        active.commit().await.unwrap();

        assert!(store.find_in_progress().await.unwrap().is_none());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("tx"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(leftovers.is_empty());
        // The document itself keeps its (possibly migrated) content.
        assert_eq!(tokio::fs::read(&doc).await.unwrap(), b"content");
    }

    #[tokio::test]
    async fn test_resume_without_journal_is_typed_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = TransactionStore::new(dir.path().join("tx"));

        let result = store.resume().await;
        assert!(matches!(
            result,
            Err(MigrationError::IncompleteTransaction(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_source_file_is_skipped_in_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = TransactionStore::new(dir.path().join("tx"));

        let ghost = dir.path().join("ghost.json");
        let mut active = store.begin(vec![ghost.clone()]).await.unwrap();
        active.backup_files().await.unwrap();

        assert_eq!(
            active.journal().operations[0].status,
            OperationStatus::Pending
        );
        active.commit().await.unwrap();
    }
}
