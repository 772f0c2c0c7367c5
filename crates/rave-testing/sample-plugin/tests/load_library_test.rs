//! Loader tests against the sample plugin built as a shared library.
//!
//! Each test copies the built library into its own temporary directory, so
//! every test loads a distinct file.

use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rave_core::prelude::*;
use rave_sample_plugin::PLUGIN_NAME;

const LIBRARY_STEM: &str = "rave_sample_plugin";

struct TestEnv;

impl Environment for TestEnv {
    fn id(&self) -> u32 {
        7
    }
}

fn env() -> EnvironmentPtr {
    Arc::new(TestEnv)
}

fn library_file_name() -> String {
    format!("{}{}{}", DLL_PREFIX, LIBRARY_STEM, DLL_SUFFIX)
}

/// The shared library cargo built next to this test binary.
fn built_library() -> PathBuf {
    let exe = std::env::current_exe().unwrap();
    let deps = exe.parent().unwrap();
    let file_name = library_file_name();
    [deps.join(&file_name), deps.parent().unwrap().join(&file_name)]
        .into_iter()
        .find(|candidate| candidate.is_file())
        .unwrap_or_else(|| panic!("{} not found near {}", file_name, deps.display()))
}

fn install_into(dir: &Path) -> PathBuf {
    let target = dir.join(library_file_name());
    std::fs::copy(built_library(), &target).unwrap();
    target
}

fn config_for(dir: &Path) -> PluginDbConfig {
    PluginDbConfig {
        search_paths: vec![dir.to_path_buf()],
        ..PluginDbConfig::default()
    }
    .with_install_dir(dir)
}

#[test]
fn test_load_library_registers_plugin() {
    let dir = tempfile::tempdir().unwrap();
    let library = install_into(dir.path());

    let db = PluginDatabase::new();
    let descriptor = db.load_plugin_file(&library).unwrap();
    assert_eq!(descriptor.name(), PLUGIN_NAME);
    assert_eq!(descriptor.path(), Some(library.as_path()));
    assert!(descriptor.is_dynamic());
    assert_eq!(db.plugin_count(), 1);
    assert_eq!(
        db.loaded_interfaces()[&InterfaceType::Planner],
        vec!["Steady", "Flaky"]
    );

    let created = db
        .create(&env(), InterfaceType::Planner, "Steady horizon=5")
        .unwrap();
    assert_eq!(created.plugin_name(), PLUGIN_NAME);
    assert_eq!(created.plugin_path(), Some(library.as_path()));
    assert_eq!(created.xml_id(), "Steady horizon=5");
    assert_eq!(created.interface_type(), InterfaceType::Planner);
}

#[test]
fn test_discovery_loads_library_and_skips_garbage() {
    let dir = tempfile::tempdir().unwrap();
    install_into(dir.path());
    std::fs::write(
        dir.path().join(format!("{}broken{}", DLL_PREFIX, DLL_SUFFIX)),
        b"not a shared object",
    )
    .unwrap();

    let db = PluginDatabase::new();
    assert_eq!(db.init_with_config(&config_for(dir.path())), 1);
    assert_eq!(db.plugin_count(), 1);
    assert!(db.has_interface(InterfaceType::Planner, "steady"));
}

#[test]
fn test_failed_interface_stays_blacklisted_until_reload() {
    let dir = tempfile::tempdir().unwrap();
    let library = install_into(dir.path());

    let db = PluginDatabase::new();
    let first = db.load_plugin_file(&library).unwrap();
    let env = env();

    assert!(db.has_interface(InterfaceType::Planner, "Flaky"));
    assert!(db.create(&env, InterfaceType::Planner, "Flaky").is_none());
    assert!(!db.has_interface(InterfaceType::Planner, "Flaky"));
    assert!(db.create(&env, InterfaceType::Planner, "Flaky retry=1").is_none());
    assert_eq!(
        first.bad_interfaces(),
        vec![(InterfaceType::Planner, "flaky".to_string())]
    );
    // Other interfaces of the same plugin are unaffected.
    assert!(db.create(&env, InterfaceType::Planner, "Steady").is_some());

    assert!(db.load_plugin(PLUGIN_NAME));
    assert_eq!(db.plugin_count(), 1);
    assert!(db.has_interface(InterfaceType::Planner, "Flaky"));

    let reloaded = db.plugins().remove(0);
    assert!(!Arc::ptr_eq(&first, &reloaded));
    assert!(reloaded.bad_interfaces().is_empty());
    assert_eq!(reloaded.path(), Some(library.as_path()));
    // The old descriptor keeps its own blacklist.
    assert!(first.is_bad_interface(InterfaceType::Planner, "Flaky"));
}

#[test]
fn test_load_plugin_by_path_reloads_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let library = install_into(dir.path());

    let db = PluginDatabase::new();
    db.load_plugin_file(&library).unwrap();
    assert!(db.load_plugin(library.to_str().unwrap()));
    assert_eq!(db.plugin_count(), 1);
}

#[test]
fn test_reload_plugins_appends_fresh_descriptors() {
    let dir = tempfile::tempdir().unwrap();
    let library = install_into(dir.path());

    let db = PluginDatabase::new();
    db.add_plugin(Box::new(rave_sample_plugin::SamplePlugin::new()));
    db.load_plugin_file(&library).unwrap();
    assert_eq!(db.plugin_count(), 2);

    // Only the on-disk plugin is loaded again.
    assert_eq!(db.reload_plugins(), 1);
    assert_eq!(db.plugin_count(), 3);

    let paths: Vec<Option<PathBuf>> = db
        .plugins()
        .iter()
        .map(|p| p.path().map(Path::to_path_buf))
        .collect();
    assert_eq!(paths, vec![None, Some(library.clone()), Some(library)]);

    // The in-process plugin is still first in line.
    let created = db.create(&env(), InterfaceType::Planner, "Steady").unwrap();
    assert_eq!(created.plugin_path(), None);
}

#[test]
fn test_load_plugin_resolves_name_on_search_paths() {
    let dir = tempfile::tempdir().unwrap();

    let db = PluginDatabase::new();
    assert_eq!(db.init_with_config(&config_for(dir.path())), 0);

    let library = install_into(dir.path());
    let descriptor = db.try_load_plugin(LIBRARY_STEM).unwrap();
    assert_eq!(descriptor.path(), Some(library.as_path()));
    assert_eq!(db.plugin_count(), 1);

    assert!(matches!(
        db.try_load_plugin("not_installed_anywhere"),
        Err(PluginError::NotFound(_))
    ));
    assert_eq!(db.plugin_count(), 1);
}

#[test]
fn test_destroy_releases_loaded_plugins() {
    let dir = tempfile::tempdir().unwrap();
    let library = install_into(dir.path());

    let db = PluginDatabase::new();
    db.load_plugin_file(&library).unwrap();
    db.on_initialized();
    db.on_pre_destroy();
    db.destroy();
    assert_eq!(db.plugin_count(), 0);
    assert!(db.create(&env(), InterfaceType::Planner, "Steady").is_none());
}
