//! Unit tests for configuration and graceful degradation
//!
//! Tests that manipulate LRS_ROOT_FOLDER are marked with #[serial] so they
//! run sequentially, not in parallel.

use lrs_common::config::{
    CompiledDefaults, RootFolderInitializer, RootFolderResolver, TomlConfig, DEFAULT_PORT,
    ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;

#[test]
fn test_compiled_defaults_for_current_platform() {
    let defaults = CompiledDefaults::for_current_platform();

    assert!(!defaults.root_folder.as_os_str().is_empty());
    assert_eq!(defaults.log_level, "info");
    assert!(defaults.root_folder.to_string_lossy().contains("lrs"));
}

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let resolved = RootFolderResolver::new().resolve();
    assert_eq!(resolved, CompiledDefaults::for_current_platform().root_folder);
}

#[test]
#[serial]
fn test_cli_argument_beats_environment() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/lrs-from-env");

    let resolved = RootFolderResolver::new()
        .with_cli_arg(Some(PathBuf::from("/tmp/lrs-from-cli")))
        .resolve();
    assert_eq!(resolved, PathBuf::from("/tmp/lrs-from-cli"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_environment_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/lrs-from-env");

    let config = TomlConfig::from_toml_str(r#"root_folder = "/tmp/lrs-from-toml""#).unwrap();
    let resolved = RootFolderResolver::new().with_toml(&config).resolve();
    assert_eq!(resolved, PathBuf::from("/tmp/lrs-from-env"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_toml_used_when_nothing_else_set() {
    env::remove_var(ROOT_FOLDER_ENV);

    let config = TomlConfig::from_toml_str(r#"root_folder = "/tmp/lrs-from-toml""#).unwrap();
    let resolved = RootFolderResolver::new().with_toml(&config).resolve();
    assert_eq!(resolved, PathBuf::from("/tmp/lrs-from-toml"));
}

#[test]
fn test_toml_defaults_fill_missing_fields() {
    let config = TomlConfig::from_toml_str("").unwrap();

    assert_eq!(config.port, DEFAULT_PORT);
    assert_eq!(config.bind_address, "127.0.0.1");
    assert_eq!(config.database_file, "lrs.db");
    assert_eq!(config.logging.level, "info");
    assert!(config.root_folder.is_none());
}

#[test]
fn test_toml_full_config() {
    let config = TomlConfig::from_toml_str(
        r#"
        root_folder = "/srv/lrs"
        bind_address = "0.0.0.0"
        port = 8088
        database_file = "records.db"
        event_bus_capacity = 64

        [logging]
        level = "debug"
        "#,
    )
    .unwrap();

    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/lrs")));
    assert_eq!(config.bind_address, "0.0.0.0");
    assert_eq!(config.port, 8088);
    assert_eq!(config.database_file, "records.db");
    assert_eq!(config.event_bus_capacity, 64);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_invalid_toml_degrades_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "port = \"not a number\"").unwrap();

    assert!(TomlConfig::load(&path).is_err());

    let config = TomlConfig::load_or_default(Some(&path));
    assert_eq!(config.port, DEFAULT_PORT);
}

#[test]
fn test_missing_toml_degrades_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = TomlConfig::load_or_default(Some(&dir.path().join("absent.toml")));
    assert_eq!(config.port, DEFAULT_PORT);
}

#[test]
fn test_initializer_creates_directory() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("nested").join("lrs");

    let initializer = RootFolderInitializer::new(root.clone());
    initializer.ensure_directory_exists().unwrap();

    assert!(root.is_dir());
    assert_eq!(initializer.database_path("lrs.db"), root.join("lrs.db"));
}
