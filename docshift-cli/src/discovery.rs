// ABOUTME: Manifest-driven document discovery
// ABOUTME: Expands include paths into concrete document files; rules pass through

use docshift_core::{KernelResult, MigrationError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A discovery rule the manifest may carry. The kernel never interprets
/// these; they ride along for external tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryRule {
    pub rule_name: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

/// Manifest file: `{"includePaths": [...], "discoveryRules": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub include_paths: Vec<PathBuf>,
    #[serde(default)]
    pub discovery_rules: Vec<DiscoveryRule>,
}

impl Manifest {
    pub async fn load(path: &Path) -> KernelResult<Self> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            MigrationError::Storage(anyhow::anyhow!(
                "manifest '{}' unreadable: {e}",
                path.display()
            ))
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Whether a directory entry is a migratable document rather than one of
/// the kernel's own artifacts.
fn is_document(name: &str) -> bool {
    name.ends_with(".json")
        && !name.ends_with(".snapshot.json")
        && !name.ends_with(".quarantine.json")
        && !(name.starts_with("journal-") && name.ends_with(".json"))
}

/// Expand the manifest's include paths into document files. Directories
/// are scanned one level deep; explicit file paths are taken as-is.
/// Relative paths resolve against `base_dir`.
pub async fn discover_documents(manifest: &Manifest, base_dir: &Path) -> KernelResult<Vec<PathBuf>> {
    let mut documents = Vec::new();

    for include in &manifest.include_paths {
        let path = if include.is_absolute() {
            include.clone()
        } else {
            base_dir.join(include)
        };

        let metadata = tokio::fs::metadata(&path).await.map_err(|e| {
            MigrationError::Storage(anyhow::anyhow!(
                "include path '{}' unreadable: {e}",
                path.display()
            ))
        })?;

        if metadata.is_file() {
            documents.push(path);
            continue;
        }

        let mut entries = tokio::fs::read_dir(&path).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_document(&name) {
                documents.push(entry.path());
            }
        }
    }

    documents.sort();
    documents.dedup();
    debug!(count = documents.len(), "documents discovered");
    Ok(documents)
}
