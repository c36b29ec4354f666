// ABOUTME: Typed shape declarations handed to the registry by the host
// ABOUTME: A shape describes a document family's structure at one version

use docshift_core::SchemaVersion;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Declared structure of a single field within a shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub field_type: String,
    pub required: bool,
    pub default_value: Option<Value>,
    pub validators: Vec<String>,
}

impl FieldSchema {
    pub fn required(field_type: impl Into<String>) -> Self {
        Self {
            field_type: field_type.into(),
            required: true,
            default_value: None,
            validators: Vec::new(),
        }
    }

    pub fn optional(field_type: impl Into<String>, default_value: Option<Value>) -> Self {
        Self {
            field_type: field_type.into(),
            required: false,
            default_value,
            validators: Vec::new(),
        }
    }
}

/// A host-registered document shape at a specific `(doc_type, version)`.
///
/// Shapes are declared explicitly at the host boundary; the kernel never
/// infers them from data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeDefinition {
    pub doc_type: String,
    pub version: SchemaVersion,
    pub fields: HashMap<String, FieldSchema>,
}

impl ShapeDefinition {
    pub fn new(doc_type: impl Into<String>, version: SchemaVersion) -> Self {
        Self {
            doc_type: doc_type.into(),
            version,
            fields: HashMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, field: FieldSchema) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    pub fn add_field(&mut self, name: impl Into<String>, field: FieldSchema) {
        self.fields.insert(name.into(), field);
    }
}
