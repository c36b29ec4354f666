// ABOUTME: Core document model: metadata, versioned documents, snapshots, bundles
// ABOUTME: Includes the wire codec that extracts and reattaches the _meta member

use crate::error::{KernelResult, MigrationError};
use crate::version::SchemaVersion;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key of the metadata member carried by persisted documents.
pub const META_KEY: &str = "_meta";

/// Identity of a document's schema: its family and version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentMeta {
    #[serde(rename = "DocType")]
    pub doc_type: String,

    #[serde(rename = "SchemaVersion")]
    pub schema_version: SchemaVersion,
}

impl DocumentMeta {
    pub fn new(doc_type: impl Into<String>, schema_version: SchemaVersion) -> Self {
        Self {
            doc_type: doc_type.into(),
            schema_version,
        }
    }
}

/// A document tagged with its schema identity. The identifier is opaque to
/// the kernel (a path, a primary key, whatever the host uses).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedDocument {
    pub id: String,
    pub data: Value,
    pub meta: DocumentMeta,
}

impl VersionedDocument {
    pub fn new(id: impl Into<String>, data: Value, meta: DocumentMeta) -> Self {
        Self {
            id: id.into(),
            data,
            meta,
        }
    }
}

/// An immutable historical state of a document at some prior version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub data: Value,
    pub meta: DocumentMeta,
}

impl Snapshot {
    pub fn new(data: Value, meta: DocumentMeta) -> Self {
        Self { data, meta }
    }
}

/// A document together with its historical snapshots.
///
/// Invariant: every snapshot shares the current document's doc type;
/// construction rejects mismatches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentBundle {
    pub current: VersionedDocument,
    pub snapshots: Vec<Snapshot>,
}

impl DocumentBundle {
    pub fn new(current: VersionedDocument, snapshots: Vec<Snapshot>) -> KernelResult<Self> {
        for snapshot in &snapshots {
            if snapshot.meta.doc_type != current.meta.doc_type {
                return Err(MigrationError::Configuration(format!(
                    "snapshot doc type '{}' does not match document '{}' of doc type '{}'",
                    snapshot.meta.doc_type, current.id, current.meta.doc_type
                )));
            }
        }
        Ok(Self { current, snapshots })
    }

    pub fn without_history(current: VersionedDocument) -> Self {
        Self {
            current,
            snapshots: Vec::new(),
        }
    }

    /// Highest-versioned snapshot, if any.
    pub fn newest_snapshot(&self) -> Option<&Snapshot> {
        self.snapshots
            .iter()
            .max_by(|a, b| a.meta.schema_version.cmp(&b.meta.schema_version))
    }

    /// Lowest-versioned snapshot, if any.
    pub fn oldest_snapshot(&self) -> Option<&Snapshot> {
        self.snapshots
            .iter()
            .min_by(|a, b| a.meta.schema_version.cmp(&b.meta.schema_version))
    }

    /// Whether any snapshot sits above the current version. A true result
    /// marks rollback history that a re-upgrade must merge instead of
    /// overwrite.
    pub fn has_snapshot_newer_than_current(&self) -> bool {
        self.snapshots
            .iter()
            .any(|s| s.meta.schema_version > self.current.meta.schema_version)
    }
}

/// Split a parsed wire document into data and metadata, removing `_meta`.
///
/// Absent or malformed `_meta` is tolerated: the caller's fallback doc type
/// is assumed together with schema version `"1.0"`.
pub fn split_wire_document(mut value: Value, fallback_doc_type: &str) -> (Value, DocumentMeta) {
    let meta = value
        .as_object_mut()
        .and_then(|obj| obj.remove(META_KEY))
        .and_then(|raw| serde_json::from_value::<DocumentMeta>(raw).ok())
        .unwrap_or_else(|| {
            DocumentMeta::new(fallback_doc_type, SchemaVersion::major_minor(1, 0))
        });
    (value, meta)
}

/// Parse wire bytes into data and metadata.
pub fn read_wire_document(bytes: &[u8], fallback_doc_type: &str) -> KernelResult<(Value, DocumentMeta)> {
    let value: Value = serde_json::from_slice(bytes)?;
    Ok(split_wire_document(value, fallback_doc_type))
}

/// Reattach `_meta` to document data for persistence. Non-object data is
/// wrapped so the metadata always has a top-level object to live in.
pub fn attach_wire_meta(data: &Value, meta: &DocumentMeta) -> Value {
    let mut object = match data {
        Value::Object(map) => map.clone(),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other.clone());
            map
        }
    };
    object.insert(
        META_KEY.to_string(),
        serde_json::to_value(meta).expect("document meta serializes"),
    );
    Value::Object(object)
}

/// Serialize a document to its wire form.
pub fn write_wire_document(data: &Value, meta: &DocumentMeta) -> KernelResult<Vec<u8>> {
    let wire = attach_wire_meta(data, meta);
    let mut bytes = serde_json::to_vec_pretty(&wire)?;
    bytes.push(b'\n');
    Ok(bytes)
}
