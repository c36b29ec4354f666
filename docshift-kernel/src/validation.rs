// ABOUTME: Shape conformance validation for documents at load time
// ABOUTME: The kernel only consumes the verdict; a failure quarantines the item

use crate::registry::ShapeDefinition;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One problem found while validating a document against its shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

/// Verdict of validating one document against one shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub passed: bool,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationVerdict {
    fn passed() -> Self {
        Self {
            passed: true,
            issues: Vec::new(),
        }
    }

    fn add_issue(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.passed = false;
        self.issues.push(ValidationIssue {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Flattened issue list for quarantine report details.
    pub fn details(&self) -> String {
        self.issues
            .iter()
            .map(|i| format!("{}: {}", i.field, i.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Validates documents against registered shapes: required fields must be
/// present and declared primitive types must match. Unknown declared type
/// names are not checked.
pub struct ShapeValidator;

impl ShapeValidator {
    pub fn validate(data: &Value, shape: &ShapeDefinition) -> ValidationVerdict {
        let mut verdict = ValidationVerdict::passed();

        let Some(object) = data.as_object() else {
            verdict.add_issue("$", "document is not an object");
            return verdict;
        };

        let mut fields: Vec<_> = shape.fields.iter().collect();
        fields.sort_by_key(|(name, _)| name.as_str());

        for (name, field) in fields {
            match object.get(name) {
                None => {
                    if field.required {
                        verdict.add_issue(name, "required field is missing");
                    }
                }
                Some(value) => {
                    if let Some(expected) = primitive_name(&field.field_type) {
                        let actual = type_name(value);
                        if actual != expected {
                            verdict.add_issue(
                                name,
                                format!("expected {expected}, got {actual}"),
                            );
                        }
                    }
                }
            }
        }
        verdict
    }
}

fn primitive_name(declared: &str) -> Option<&'static str> {
    match declared {
        "string" => Some("string"),
        "number" => Some("number"),
        "bool" | "boolean" => Some("bool"),
        "array" | "list" => Some("array"),
        "object" | "map" => Some("object"),
        "null" => Some("null"),
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
