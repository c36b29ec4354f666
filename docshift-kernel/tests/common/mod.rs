// ABOUTME: Shared fixtures for kernel integration tests
// ABOUTME: A package-configuration document family with a 1.0 -> 2.0 step

#![allow(dead_code)]

use docshift_core::{DocumentBundle, DocumentMeta, SchemaVersion, Snapshot, VersionedDocument};
use docshift_kernel::{
    FieldSchema, FnStep, MergeOutcome, MigrationRegistry, RegistryBuilder, ShapeDefinition,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;

pub fn version(s: &str) -> SchemaVersion {
    s.parse().unwrap()
}

pub fn meta(v: &str) -> DocumentMeta {
    DocumentMeta::new("PkgConf", version(v))
}

/// v1.0: `{timeout: number, plugins: [string]}`
/// v2.0: `{execution_timeout: number, plugins: {name: {enabled: bool}}, reporting: {format}}`
pub fn package_config_shapes() -> Vec<ShapeDefinition> {
    vec![
        ShapeDefinition::new("PkgConf", version("1.0"))
            .with_field("timeout", FieldSchema::required("number"))
            .with_field("plugins", FieldSchema::optional("array", Some(json!([])))),
        ShapeDefinition::new("PkgConf", version("2.0"))
            .with_field("execution_timeout", FieldSchema::required("number"))
            .with_field("plugins", FieldSchema::optional("object", Some(json!({}))))
            .with_field(
                "reporting",
                FieldSchema::optional("object", Some(json!({"format": "json"}))),
            ),
    ]
}

fn upgrade_package_config(mut data: Value) -> docshift_core::KernelResult<Value> {
    let obj = data.as_object_mut().ok_or_else(|| {
        docshift_core::MigrationError::Execution("package config is not an object".to_string())
    })?;

    if let Some(timeout) = obj.remove("timeout") {
        obj.insert("execution_timeout".to_string(), timeout);
    }
    if let Some(Value::Array(names)) = obj.remove("plugins") {
        let mut plugins = Map::new();
        for name in names {
            if let Value::String(name) = name {
                plugins.insert(name, json!({"enabled": true}));
            }
        }
        obj.insert("plugins".to_string(), Value::Object(plugins));
    }
    obj.insert("reporting".to_string(), json!({"format": "json"}));
    Ok(data)
}

fn downgrade_package_config(mut data: Value) -> docshift_core::KernelResult<Value> {
    let obj = data.as_object_mut().ok_or_else(|| {
        docshift_core::MigrationError::Execution("package config is not an object".to_string())
    })?;

    if let Some(timeout) = obj.remove("execution_timeout") {
        obj.insert("timeout".to_string(), timeout);
    }
    if let Some(Value::Object(plugins)) = obj.remove("plugins") {
        let names: Vec<Value> = plugins.keys().cloned().map(Value::String).collect();
        obj.insert("plugins".to_string(), Value::Array(names));
    }
    obj.remove("reporting");
    Ok(data)
}

/// Semantic merge for the `plugins` map: THEIRS is the baseline, entries
/// MINE deleted relative to BASE are removed, entries MINE added are kept.
fn merge_plugins(
    base: Option<&Value>,
    mine: Option<&Value>,
    theirs: Option<&Value>,
) -> MergeOutcome {
    if base.is_none() && mine.is_none() && theirs.is_none() {
        return MergeOutcome::Drop;
    }
    let as_map = |value: Option<&Value>| -> Map<String, Value> {
        value
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    };
    let base_map = as_map(base);
    let mine_map = as_map(mine);
    let theirs_map = as_map(theirs);

    let mut merged = Map::new();
    for (name, settings) in &theirs_map {
        let deleted_by_mine = base_map.contains_key(name) && !mine_map.contains_key(name);
        if !deleted_by_mine {
            merged.insert(name.clone(), settings.clone());
        }
    }
    for (name, settings) in &mine_map {
        if !base_map.contains_key(name) && !merged.contains_key(name) {
            merged.insert(name.clone(), settings.clone());
        }
    }
    MergeOutcome::Merged(Value::Object(merged))
}

pub fn package_config_registry() -> Arc<MigrationRegistry> {
    let mut builder = RegistryBuilder::new();
    builder
        .register_doc_type("PkgConf", package_config_shapes())
        .unwrap();
    builder
        .register_step(Arc::new(
            FnStep::new(
                "PkgConf",
                version("1.0"),
                version("2.0"),
                upgrade_package_config,
                downgrade_package_config,
            )
            .with_semantic_merge(vec!["plugins".to_string()], |_, base, mine, theirs| {
                merge_plugins(base, mine, theirs)
            }),
        ))
        .unwrap();
    Arc::new(builder.build())
}

pub fn bundle(id: &str, data: Value, v: &str) -> DocumentBundle {
    DocumentBundle::without_history(VersionedDocument::new(id, data, meta(v)))
}

pub fn bundle_with_snapshots(
    id: &str,
    data: Value,
    v: &str,
    snapshots: Vec<(Value, &str)>,
) -> DocumentBundle {
    let snapshots = snapshots
        .into_iter()
        .map(|(data, sv)| Snapshot::new(data, meta(sv)))
        .collect();
    DocumentBundle::new(VersionedDocument::new(id, data, meta(v)), snapshots).unwrap()
}
