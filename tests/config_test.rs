//! Tests for layered configuration and the toolkit container

use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

use compkit::config::Settings;
use compkit::domain::{Contract, ContractError, OperationSpec, Payload};
use compkit::{Toolkit, ToolkitError};
use rstest::rstest;
use tempfile::TempDir;

fn write_config(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

// ============================================================
// Layering
// ============================================================

#[test]
fn given_global_and_local_files_when_loading_then_local_wins_per_key() {
    let dir = TempDir::new().unwrap();
    let global = write_config(
        &dir,
        "global.toml",
        r#"
[composite]
max_depth = 8

[logging]
filter = "info"
"#,
    );
    let local = write_config(
        &dir,
        "local.toml",
        r#"
[logging]
filter = "compkit=debug"
span_events = true
"#,
    );

    let settings = Settings::load_layers(Some(&global), Some(&local)).unwrap();

    assert_eq!(settings.composite.max_depth, Some(8));
    assert_eq!(settings.logging.filter, "compkit=debug");
    assert!(settings.logging.span_events);
    assert_eq!(settings.registry.shard_amount, None);
}

#[test]
fn given_env_overrides_when_applied_then_replace_file_values() {
    let dir = TempDir::new().unwrap();
    let local = write_config(&dir, "local.toml", "[registry]\nshard_amount = 8\n");
    let vars = HashMap::from([
        ("COMPKIT_REGISTRY__SHARD_AMOUNT".to_string(), "16".to_string()),
        ("COMPKIT_LOGGING__FILTER".to_string(), "trace".to_string()),
    ]);

    let settings = Settings::load_layers(None, Some(&local))
        .unwrap()
        .with_env_vars(vars)
        .unwrap();

    assert_eq!(settings.registry.shard_amount, Some(16));
    assert_eq!(settings.logging.filter, "trace");
}

#[test]
fn given_missing_local_file_when_loading_then_reports_io_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.toml");

    let result = Settings::load_layers(None, Some(&missing));

    assert!(matches!(result, Err(ToolkitError::Io { .. })));
}

#[rstest]
#[case::not_toml("max_depth = [")]
#[case::wrong_type("[composite]\nmax_depth = \"deep\"\n")]
fn given_malformed_file_when_loading_then_reports_config_error(#[case] content: &str) {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "bad.toml", content);

    let result = Settings::load_layers(None, Some(&path));

    assert!(matches!(result, Err(ToolkitError::Config { .. })));
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(12)]
fn given_invalid_shard_amount_when_building_toolkit_then_rejects(#[case] shards: usize) {
    let mut settings = Settings::default();
    settings.registry.shard_amount = Some(shards);

    assert!(matches!(
        Toolkit::new(settings),
        Err(ToolkitError::Config { .. })
    ));
}

#[test]
fn given_effective_settings_when_serialized_then_round_trips_through_loader() {
    let dir = TempDir::new().unwrap();
    let mut settings = Settings::default();
    settings.composite.max_depth = Some(5);
    settings.logging.span_events = true;

    let path = write_config(&dir, "effective.toml", &settings.to_toml().unwrap());
    let loaded = Settings::load_layers(None, Some(&path)).unwrap();

    assert_eq!(loaded, settings);
}

// ============================================================
// Container
// ============================================================

#[test]
fn given_depth_limit_in_settings_when_toolkit_creates_tree_then_limit_applies() {
    let mut settings = Settings::default();
    settings.composite.max_depth = Some(2);
    settings.registry.shard_amount = Some(8);
    let toolkit = Toolkit::new(settings).unwrap();
    let contract: Arc<Contract> = Contract::new("c", [OperationSpec::sum("n")]).unwrap();

    let mut tree = toolkit.tree("root", contract);
    let root = tree.root();
    let child = tree.push_group(root, "child", Payload::empty()).unwrap();

    assert!(matches!(
        tree.push_group(child, "grandchild", Payload::empty()),
        Err(ContractError::DepthExceeded { limit: 2 })
    ));
}

#[test]
fn given_toolkit_clone_when_resetting_then_registries_are_shared_and_cleared() {
    let toolkit = Toolkit::default();
    let clone = toolkit.clone();

    let a = toolkit
        .singletons
        .get_or_create("svc".into(), || String::from("service"))
        .unwrap();
    let b = clone
        .singletons
        .get_or_create("svc".into(), || String::from("other"))
        .unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    clone.monostates.bind("state".into(), Default::default());

    toolkit.reset();

    assert!(clone.singletons.is_empty());
    assert_eq!(clone.monostates.snapshot(&"state".into()), Some(Default::default()));
}
