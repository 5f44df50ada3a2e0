//! End-to-end conversion tests against the in-memory cluster

use std::sync::Arc;

use indexkeeper_actions::mocks::MockCluster;
use indexkeeper_actions::{
    ActionError, ConversionPhase, ConvertOptions, ConvertToRemote, IndexList, SnapshotState,
};

fn three_index_cluster() -> Arc<MockCluster> {
    Arc::new(
        MockCluster::new()
            .with_index("logs-2024.01.01", 100)
            .with_index("logs-2024.01.02", 200)
            .with_index("logs-2024.01.03", 300)
            .with_repository("backups"),
    )
}

#[tokio::test(start_paused = true)]
async fn test_full_conversion_with_delete() {
    let cluster = three_index_cluster();
    let selection = IndexList::from_pattern(cluster.clone(), "logs-*").await.unwrap();
    let options = ConvertOptions::new("backups", "to-remote")
        .with_default_remote_store()
        .with_delete_after(true);
    let action = ConvertToRemote::new(&selection, options).await.unwrap();

    let state = action.do_action().await.unwrap();
    assert_eq!(state.phase, ConversionPhase::Done);
    assert_eq!(state.snapshots.len(), 1);
    assert_eq!(state.restores.len(), 3);
    assert_eq!(state.aliases.len(), 3);
    assert_eq!(state.deleted.len(), 3);

    for day in ["01", "02", "03"] {
        let source = format!("logs-2024.01.{}", day);
        let target = format!("{}_remote", source);
        assert!(!cluster.has_index(&source));
        assert!(cluster.has_index(&target));
        assert_eq!(cluster.alias_target(&source), Some(target));
    }

    // Phases ran in order: snapshot, restore, alias, delete, deferred alias
    let order: Vec<&str> = cluster
        .mutating_calls()
        .iter()
        .map(|c| c.method)
        .collect();
    assert_eq!(
        order,
        vec![
            "create_snapshot",
            "restore_snapshot",
            "restore_snapshot",
            "restore_snapshot",
            "delete_indices",
            "update_aliases",
        ]
    );
}

#[tokio::test]
async fn test_dry_run_on_three_indices_is_side_effect_free() {
    let cluster = three_index_cluster();
    let selection = IndexList::from_pattern(cluster.clone(), "logs-*").await.unwrap();
    let options = ConvertOptions::new("backups", "to-remote")
        .with_delete_after(true)
        .with_create_alias(true);
    let action = ConvertToRemote::new(&selection, options).await.unwrap();

    let plan = action.do_dry_run();
    assert_eq!(plan.conversions.len(), 3);
    assert!(plan.conversions.iter().all(|c| c.delete_source));
    assert!(cluster.mutating_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_existing_snapshot_missing_index_never_restores() {
    let cluster = Arc::new(
        MockCluster::new()
            .with_index("a", 1)
            .with_index("b", 1)
            .with_repository("backups")
            .with_snapshot("backups", "weekly", &["a"], SnapshotState::Success),
    );
    let selection = IndexList::from_names(cluster.clone(), ["a", "b"]);
    let options = ConvertOptions::new("backups", "weekly").with_existing_snapshot(true);
    let action = ConvertToRemote::new(&selection, options).await.unwrap();

    let failure = action.do_action().await.unwrap_err();
    assert_eq!(failure.error.kind(), "DependencyMissing");
    assert!(cluster.calls_to("restore_snapshot").is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_existing_snapshot_reuse() {
    let cluster = Arc::new(
        MockCluster::new()
            .with_index("a", 7)
            .with_repository("backups")
            .with_snapshot("backups", "weekly", &["a", "z"], SnapshotState::Success),
    );
    let selection = IndexList::from_names(cluster.clone(), ["a"]);
    let options = ConvertOptions::new("backups", "weekly")
        .with_existing_snapshot(true)
        .with_create_alias(false);
    let action = ConvertToRemote::new(&selection, options).await.unwrap();

    let state = action.do_action().await.unwrap();
    assert!(cluster.calls_to("create_snapshot").is_empty());
    assert_eq!(state.restores[0].snapshot, "weekly");
    assert_eq!(cluster.docs("a_remote"), Some(7));
}

#[tokio::test]
async fn test_custom_alias_with_many_indices_is_configuration_error() {
    let cluster = three_index_cluster();
    let selection = IndexList::from_pattern(cluster.clone(), "logs-*").await.unwrap();
    let options = ConvertOptions::new("backups", "to-remote").with_alias_name("logs");
    let result = ConvertToRemote::new(&selection, options).await;

    assert!(matches!(result, Err(ActionError::Configuration(_))));
    assert!(cluster.calls_to("repository_exists").is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_count_mismatch_prevents_deletion() {
    let cluster = three_index_cluster();
    cluster.set_target_doc_count("logs-2024.01.02_remote", 199);
    let selection = IndexList::from_pattern(cluster.clone(), "logs-*").await.unwrap();
    let options = ConvertOptions::new("backups", "to-remote").with_delete_after(true);
    let action = ConvertToRemote::new(&selection, options).await.unwrap();

    let failure = action.do_action().await.unwrap_err();
    assert!(matches!(failure.error, ActionError::Verification(_)));
    assert!(cluster.calls_to("delete_indices").is_empty());
    assert!(cluster.has_index("logs-2024.01.02"));
}
