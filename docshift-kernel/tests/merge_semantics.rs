// ABOUTME: Re-upgrade merge behavior over rollback history
// ABOUTME: Exercises the documented lossless upgrade-edit-rollback-edit-reupgrade cycle

mod common;

use common::{bundle_with_snapshots, meta, package_config_registry};
use docshift_core::{ActionKind, DocumentBundle};
use docshift_kernel::{KernelConfig, MigrationService};
use serde_json::json;
use std::collections::HashMap;

fn service() -> MigrationService {
    MigrationService::new(package_config_registry(), KernelConfig::default())
}

fn by_id(bundles: &[DocumentBundle]) -> HashMap<String, DocumentBundle> {
    bundles
        .iter()
        .map(|b| (b.current.id.clone(), b.clone()))
        .collect()
}

/// The scenario the merger exists for: a document was upgraded, edited at
/// v2.0, rolled back, edited again at v1.0, and is now re-upgraded.
#[tokio::test]
async fn test_lossless_reupgrade_via_three_way_merge() {
    let service = service();

    // BASE: the pre-upgrade snapshot taken during the original upgrade.
    let base = (json!({"timeout": 30, "plugins": ["auth", "logging"]}), "1.0");
    // THEIRS: the pre-rollback snapshot carrying the user's v2.0 edits.
    let theirs = (
        json!({
            "execution_timeout": 100,
            "plugins": {
                "auth": {"enabled": true},
                "logging": {"enabled": false},
                "cache": {"enabled": true}
            },
            "reporting": {"format": "json"}
        }),
        "2.0",
    );
    // MINE: the post-rollback working copy, edited again at v1.0.
    let bundles = vec![bundle_with_snapshots(
        "pkg.json",
        json!({"timeout": 45, "plugins": ["logging"]}),
        "1.0",
        vec![base, theirs],
    )];

    let plan = service.plan_upgrade(&bundles);
    assert_eq!(plan.actions[0].kind, ActionKind::ThreeWayMerge);

    let report = service.execute(&plan, &by_id(&bundles)).await.unwrap();
    assert_eq!(report.summary.succeeded, 1);

    let result = &report.successes[0].result;
    assert_eq!(
        result.data,
        json!({
            "execution_timeout": 100,
            "plugins": {
                "logging": {"enabled": false},
                "cache": {"enabled": true}
            },
            "reporting": {"format": "json"}
        })
    );
    assert_eq!(result.new_meta, meta("2.0"));

    // The merge snapshots the pre-merge state and retires both inputs.
    assert_eq!(result.snapshots_to_persist.len(), 1);
    assert_eq!(
        result.snapshots_to_persist[0].data,
        json!({"timeout": 45, "plugins": ["logging"]})
    );
    assert_eq!(result.snapshots_to_persist[0].meta, meta("1.0"));

    assert_eq!(result.snapshots_to_delete.len(), 2);
    assert!(result.snapshots_to_delete.contains(&meta("1.0")));
    assert!(result.snapshots_to_delete.contains(&meta("2.0")));
}

#[tokio::test]
async fn test_theirs_wins_on_structural_conflict() {
    let service = service();

    // Both sides changed the timeout; the pre-rollback edit survives.
    let bundles = vec![bundle_with_snapshots(
        "pkg.json",
        json!({"timeout": 45, "plugins": []}),
        "1.0",
        vec![
            (json!({"timeout": 30, "plugins": []}), "1.0"),
            (
                json!({
                    "execution_timeout": 100,
                    "plugins": {},
                    "reporting": {"format": "json"}
                }),
                "2.0",
            ),
        ],
    )];

    let plan = service.plan_upgrade(&bundles);
    let report = service.execute(&plan, &by_id(&bundles)).await.unwrap();
    let merged = &report.successes[0].result.data;
    assert_eq!(merged["execution_timeout"], json!(100));
}

#[tokio::test]
async fn test_mine_only_change_survives_merge() {
    let service = service();

    // Only MINE changed the timeout after rollback; THEIRS left it alone.
    let bundles = vec![bundle_with_snapshots(
        "pkg.json",
        json!({"timeout": 45, "plugins": []}),
        "1.0",
        vec![
            (json!({"timeout": 30, "plugins": []}), "1.0"),
            (
                json!({
                    "execution_timeout": 30,
                    "plugins": {},
                    "reporting": {"format": "xml"}
                }),
                "2.0",
            ),
        ],
    )];

    let plan = service.plan_upgrade(&bundles);
    let report = service.execute(&plan, &by_id(&bundles)).await.unwrap();
    let merged = &report.successes[0].result.data;

    // MINE's timeout edit survives; THEIRS' reporting edit survives.
    assert_eq!(merged["execution_timeout"], json!(45));
    assert_eq!(merged["reporting"], json!({"format": "xml"}));
}

#[tokio::test]
async fn test_plugin_added_after_rollback_is_kept() {
    let service = service();

    // MINE installed "metrics" after the rollback; THEIRS never saw it.
    let bundles = vec![bundle_with_snapshots(
        "pkg.json",
        json!({"timeout": 30, "plugins": ["auth", "metrics"]}),
        "1.0",
        vec![
            (json!({"timeout": 30, "plugins": ["auth"]}), "1.0"),
            (
                json!({
                    "execution_timeout": 30,
                    "plugins": {"auth": {"enabled": false}},
                    "reporting": {"format": "json"}
                }),
                "2.0",
            ),
        ],
    )];

    let plan = service.plan_upgrade(&bundles);
    let report = service.execute(&plan, &by_id(&bundles)).await.unwrap();
    let merged = &report.successes[0].result.data;

    assert_eq!(
        merged["plugins"],
        json!({
            "auth": {"enabled": false},
            "metrics": {"enabled": true}
        })
    );
}

#[tokio::test]
async fn test_single_newer_snapshot_acts_as_base_and_theirs() {
    let service = service();

    // Only the pre-rollback snapshot exists; it serves as both BASE and
    // THEIRS, so the merge reduces to lifting MINE onto it.
    let bundles = vec![bundle_with_snapshots(
        "pkg.json",
        json!({"timeout": 45, "plugins": []}),
        "1.0",
        vec![(
            json!({
                "execution_timeout": 100,
                "plugins": {},
                "reporting": {"format": "json"}
            }),
            "2.0",
        )],
    )];

    let plan = service.plan_upgrade(&bundles);
    assert_eq!(plan.actions[0].kind, ActionKind::ThreeWayMerge);

    let report = service.execute(&plan, &by_id(&bundles)).await.unwrap();
    assert_eq!(report.summary.succeeded, 1);
    let result = &report.successes[0].result;
    // One consumed snapshot, deleted once.
    assert_eq!(result.snapshots_to_delete.len(), 1);
    assert_eq!(result.new_meta, meta("2.0"));
}
