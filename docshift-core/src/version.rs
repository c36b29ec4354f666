// ABOUTME: Schema version type modelled as a dotted numeric tuple
// ABOUTME: Ordering and equality are component-wise numeric with implicit trailing zeros

use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VersionParseError {
    #[error("schema version is empty")]
    Empty,

    #[error("schema version component is not numeric: '{component}' in '{input}'")]
    InvalidComponent { input: String, component: String },
}

/// A schema version such as `"1.0"` or `"2.5.1"`.
///
/// Versions compare component-wise numerically, so `"10.0" > "2.0"` and
/// `"1.0" == "1.0.0"`. The original component count is preserved for display.
#[derive(Debug, Clone)]
pub struct SchemaVersion {
    components: Vec<u64>,
}

impl SchemaVersion {
    pub fn new(components: Vec<u64>) -> Self {
        debug_assert!(!components.is_empty());
        Self { components }
    }

    /// Convenience constructor for the common two-component form.
    pub fn major_minor(major: u64, minor: u64) -> Self {
        Self::new(vec![major, minor])
    }

    pub fn components(&self) -> &[u64] {
        &self.components
    }

    /// Components with trailing zeros stripped; the canonical form used for
    /// comparison and hashing. `"1.0"` and `"1.0.0"` normalize identically.
    fn normalized(&self) -> &[u64] {
        let mut end = self.components.len();
        while end > 1 && self.components[end - 1] == 0 {
            end -= 1;
        }
        &self.components[..end]
    }
}

impl FromStr for SchemaVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(VersionParseError::Empty);
        }
        let mut components = Vec::new();
        for part in s.split('.') {
            let value = part
                .parse::<u64>()
                .map_err(|_| VersionParseError::InvalidComponent {
                    input: s.to_string(),
                    component: part.to_string(),
                })?;
            components.push(value);
        }
        Ok(Self { components })
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.components.iter().map(u64::to_string).collect();
        write!(f, "{}", rendered.join("."))
    }
}

impl PartialEq for SchemaVersion {
    fn eq(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }
}

impl Eq for SchemaVersion {}

impl Hash for SchemaVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized().hash(state);
    }
}

impl Ord for SchemaVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let a = self.normalized();
        let b = other.normalized();
        for i in 0..a.len().max(b.len()) {
            let left = a.get(i).copied().unwrap_or(0);
            let right = b.get(i).copied().unwrap_or(0);
            match left.cmp(&right) {
                Ordering::Equal => {}
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for SchemaVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for SchemaVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

struct VersionVisitor;

impl Visitor<'_> for VersionVisitor {
    type Value = SchemaVersion;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a dotted numeric schema version string")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        value.parse().map_err(de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for SchemaVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(VersionVisitor)
    }
}
