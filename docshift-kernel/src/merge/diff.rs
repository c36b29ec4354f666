// ABOUTME: Structural diff and patch over JSON trees
// ABOUTME: Objects diff by key, arrays by element index; ops carry full paths

use serde_json::Value;
use std::fmt;

/// One step into a JSON tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => write!(f, "{k}"),
            PathSegment::Index(i) => write!(f, "[{i}]"),
        }
    }
}

pub type DiffPath = Vec<PathSegment>;

pub fn render_path(path: &DiffPath) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// A single edit taking the base tree toward the other tree.
#[derive(Debug, Clone, PartialEq)]
pub enum DiffOp {
    Add { path: DiffPath, value: Value },
    Remove { path: DiffPath },
    Replace { path: DiffPath, value: Value },
}

impl DiffOp {
    pub fn path(&self) -> &DiffPath {
        match self {
            DiffOp::Add { path, .. } | DiffOp::Remove { path } | DiffOp::Replace { path, .. } => {
                path
            }
        }
    }

    /// The top-level property this op touches, when it touches one.
    pub fn top_level_key(&self) -> Option<&str> {
        match self.path().first() {
            Some(PathSegment::Key(k)) => Some(k),
            _ => None,
        }
    }
}

/// Compute the edits that transform `base` into `other`.
///
/// Array element removals are emitted highest-index-first so applying the
/// ops in order never shifts a pending index.
pub fn diff(base: &Value, other: &Value) -> Vec<DiffOp> {
    let mut ops = Vec::new();
    walk(&mut ops, &mut Vec::new(), base, other);
    ops
}

fn walk(ops: &mut Vec<DiffOp>, path: &mut DiffPath, base: &Value, other: &Value) {
    match (base, other) {
        (Value::Object(a), Value::Object(b)) => {
            for (key, other_value) in b {
                path.push(PathSegment::Key(key.clone()));
                match a.get(key) {
                    Some(base_value) => {
                        if base_value != other_value {
                            walk(ops, path, base_value, other_value);
                        }
                    }
                    None => ops.push(DiffOp::Add {
                        path: path.clone(),
                        value: other_value.clone(),
                    }),
                }
                path.pop();
            }
            for key in a.keys() {
                if !b.contains_key(key) {
                    path.push(PathSegment::Key(key.clone()));
                    ops.push(DiffOp::Remove { path: path.clone() });
                    path.pop();
                }
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            let common = a.len().min(b.len());
            for i in 0..common {
                if a[i] != b[i] {
                    path.push(PathSegment::Index(i));
                    walk(ops, path, &a[i], &b[i]);
                    path.pop();
                }
            }
            for (i, item) in b.iter().enumerate().skip(common) {
                path.push(PathSegment::Index(i));
                ops.push(DiffOp::Add {
                    path: path.clone(),
                    value: item.clone(),
                });
                path.pop();
            }
            for i in (common..a.len()).rev() {
                path.push(PathSegment::Index(i));
                ops.push(DiffOp::Remove { path: path.clone() });
                path.pop();
            }
        }
        _ => {
            if base != other {
                ops.push(DiffOp::Replace {
                    path: path.clone(),
                    value: other.clone(),
                });
            }
        }
    }
}

fn resolve_parent<'a>(root: &'a mut Value, path: &[PathSegment]) -> Option<&'a mut Value> {
    let mut current = root;
    for segment in path {
        current = match segment {
            PathSegment::Key(key) => current.as_object_mut()?.get_mut(key)?,
            PathSegment::Index(index) => current.as_array_mut()?.get_mut(*index)?,
        };
    }
    Some(current)
}

/// Apply one op to a tree. Returns whether the op landed; removing an
/// already-absent member counts as landed (the edit is idempotent).
pub fn apply_op(target: &mut Value, op: &DiffOp) -> bool {
    let path = op.path();
    let Some((last, parents)) = path.split_last() else {
        // Whole-document replacement.
        return match op {
            DiffOp::Replace { value, .. } | DiffOp::Add { value, .. } => {
                *target = value.clone();
                true
            }
            DiffOp::Remove { .. } => false,
        };
    };

    let Some(parent) = resolve_parent(target, parents) else {
        return false;
    };

    match (op, last) {
        (DiffOp::Add { value, .. } | DiffOp::Replace { value, .. }, PathSegment::Key(key)) => {
            match parent.as_object_mut() {
                Some(obj) => {
                    obj.insert(key.clone(), value.clone());
                    true
                }
                None => false,
            }
        }
        (DiffOp::Add { value, .. } | DiffOp::Replace { value, .. }, PathSegment::Index(index)) => {
            match parent.as_array_mut() {
                Some(arr) => {
                    if *index < arr.len() {
                        arr[*index] = value.clone();
                    } else if *index == arr.len() {
                        arr.push(value.clone());
                    } else {
                        return false;
                    }
                    true
                }
                None => false,
            }
        }
        (DiffOp::Remove { .. }, PathSegment::Key(key)) => match parent.as_object_mut() {
            Some(obj) => {
                obj.remove(key);
                true
            }
            None => false,
        },
        (DiffOp::Remove { .. }, PathSegment::Index(index)) => match parent.as_array_mut() {
            Some(arr) => {
                if *index < arr.len() {
                    arr.remove(*index);
                    true
                } else {
                    false
                }
            }
            None => false,
        },
    }
}
