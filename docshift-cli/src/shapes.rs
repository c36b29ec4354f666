// ABOUTME: Host-boundary registration of this application's document family
// ABOUTME: Package configuration documents, versions 1.0 and 2.0

use docshift_core::{KernelResult, MigrationError, SchemaVersion};
use docshift_kernel::{
    FieldSchema, FnStep, MergeOutcome, MigrationRegistry, RegistryBuilder, ShapeDefinition,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;

pub const PACKAGE_CONFIG: &str = "PackageConfig";

fn v(s: &str) -> KernelResult<SchemaVersion> {
    Ok(s.parse::<SchemaVersion>()?)
}

/// Build the registry this application ships with.
///
/// `PackageConfig` evolved from a flat v1.0 form into v2.0:
/// - `timeout` was renamed to `execution_timeout`
/// - `plugins` grew from a name list into a map of per-plugin settings
/// - a `reporting` section appeared with a default format
pub fn build_registry() -> KernelResult<Arc<MigrationRegistry>> {
    let mut builder = RegistryBuilder::new();

    builder.register_doc_type(
        PACKAGE_CONFIG,
        vec![
            ShapeDefinition::new(PACKAGE_CONFIG, v("1.0")?)
                .with_field("timeout", FieldSchema::required("number"))
                .with_field("plugins", FieldSchema::optional("array", Some(json!([])))),
            ShapeDefinition::new(PACKAGE_CONFIG, v("2.0")?)
                .with_field("execution_timeout", FieldSchema::required("number"))
                .with_field("plugins", FieldSchema::optional("object", Some(json!({}))))
                .with_field(
                    "reporting",
                    FieldSchema::optional("object", Some(json!({"format": "json"}))),
                ),
        ],
    )?;

    builder.register_step(Arc::new(
        FnStep::new(
            PACKAGE_CONFIG,
            v("1.0")?,
            v("2.0")?,
            upgrade_v1_to_v2,
            reverse_v2_to_v1,
        )
        .with_semantic_merge(vec!["plugins".to_string()], |_, base, mine, theirs| {
            merge_plugin_map(base, mine, theirs)
        }),
    ))?;

    Ok(Arc::new(builder.build()))
}

fn into_object(data: Value) -> KernelResult<Map<String, Value>> {
    match data {
        Value::Object(map) => Ok(map),
        _ => Err(MigrationError::Execution(
            "package configuration is not an object".to_string(),
        )),
    }
}

fn upgrade_v1_to_v2(data: Value) -> KernelResult<Value> {
    let mut obj = into_object(data)?;

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
    Ok(Value::Object(obj))
}

fn reverse_v2_to_v1(data: Value) -> KernelResult<Value> {
    let mut obj = into_object(data)?;

    if let Some(timeout) = obj.remove("execution_timeout") {
        obj.insert("timeout".to_string(), timeout);
    }
    if let Some(Value::Object(plugins)) = obj.remove("plugins") {
        let names: Vec<Value> = plugins.keys().cloned().map(Value::String).collect();
        obj.insert("plugins".to_string(), Value::Array(names));
    }
    obj.remove("reporting");
    Ok(Value::Object(obj))
}

/// The plugins map changed type across versions, so it merges
/// semantically: the pre-rollback settings are the baseline, plugins
/// removed after the rollback stay removed, plugins installed after the
/// rollback are kept.
fn merge_plugin_map(
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
        let removed_after_rollback =
            base_map.contains_key(name) && !mine_map.contains_key(name);
        if !removed_after_rollback {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_wires_the_family() {
        let registry = build_registry().unwrap();
        assert_eq!(registry.registered_doc_types(), vec![PACKAGE_CONFIG]);
        assert_eq!(
            registry.latest_version(PACKAGE_CONFIG),
            Some(v("2.0").unwrap())
        );
        assert_eq!(registry.step_count(), 1);
    }

    #[test]
    fn test_upgrade_reshapes_the_document() {
        let upgraded =
            upgrade_v1_to_v2(json!({"timeout": 30, "plugins": ["auth"]})).unwrap();
        assert_eq!(
            upgraded,
            json!({
                "execution_timeout": 30,
                "plugins": {"auth": {"enabled": true}},
                "reporting": {"format": "json"}
            })
        );
    }

    #[test]
    fn test_reverse_restores_v1_shape() {
        let v2 = json!({
            "execution_timeout": 30,
            "plugins": {"auth": {"enabled": true}, "cache": {"enabled": false}},
            "reporting": {"format": "json"}
        });
        let restored = reverse_v2_to_v1(v2).unwrap();
        assert_eq!(
            restored,
            json!({"timeout": 30, "plugins": ["auth", "cache"]})
        );
    }

    #[test]
    fn test_plugin_merge_respects_both_sides() {
        let base = json!({"auth": {"enabled": true}, "logging": {"enabled": true}});
        let mine = json!({"logging": {"enabled": true}});
        let theirs = json!({
            "auth": {"enabled": true},
            "logging": {"enabled": false},
            "cache": {"enabled": true}
        });

        let outcome = merge_plugin_map(Some(&base), Some(&mine), Some(&theirs));
        assert_eq!(
            outcome,
            MergeOutcome::Merged(json!({
                "logging": {"enabled": false},
                "cache": {"enabled": true}
            }))
        );
    }
}
