//! Tests for the configuration file and legacy directory migration

use std::fs;

use rstest::rstest;
use tempfile::TempDir;

use drona_composer::config::{ConfigStore, Probe, CONFIG_DIR, DRONA_DIR_NAME, LEGACY_DIR_NAME};

#[rstest]
fn save_creates_drona_dir_and_config() {
    let home = TempDir::new().unwrap();
    let base = TempDir::new().unwrap();
    let store = ConfigStore::new(home.path().join(CONFIG_DIR));

    let saved = store.save(base.path()).unwrap();
    assert!(saved.drona_dir.ends_with(DRONA_DIR_NAME));
    assert!(saved.drona_dir.is_dir());
    assert_eq!(store.read().unwrap(), saved);
    assert!(!home.path().join(CONFIG_DIR).join("config.tmp").exists());
}

#[rstest]
fn save_rejects_missing_base() {
    let home = TempDir::new().unwrap();
    let store = ConfigStore::new(home.path().join(CONFIG_DIR));
    assert!(store.save(&home.path().join("nowhere")).is_err());
    assert!(!store.path().exists());
}

#[rstest]
fn probe_accepts_valid_config() {
    let home = TempDir::new().unwrap();
    let base = TempDir::new().unwrap();
    let store = ConfigStore::new(home.path().join(CONFIG_DIR));
    let saved = store.save(base.path()).unwrap();

    assert_eq!(store.probe_and_autofix(base.path()).unwrap(), Probe::Ok(saved));
}

#[cfg(unix)]
#[rstest]
fn probe_migrates_legacy_directory() {
    let home = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    fs::create_dir(scratch.path().join(LEGACY_DIR_NAME)).unwrap();
    fs::write(scratch.path().join(LEGACY_DIR_NAME).join("marker"), "x").unwrap();
    let store = ConfigStore::new(home.path().join(CONFIG_DIR));

    let Probe::Migrated { config, notice } = store.probe_and_autofix(scratch.path()).unwrap() else {
        panic!("expected a migration");
    };
    assert_eq!(config.drona_dir, scratch.path().join(DRONA_DIR_NAME));
    assert!(config.drona_dir.join("marker").exists());
    assert!(notice.contains(DRONA_DIR_NAME));

    // the written config is now valid on its own
    assert!(matches!(store.probe_and_autofix(scratch.path()).unwrap(), Probe::Ok(_)));
}

#[rstest]
fn probe_asks_for_a_location() {
    let home = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let store = ConfigStore::new(home.path().join(CONFIG_DIR));

    assert!(matches!(
        store.probe_and_autofix(scratch.path()).unwrap(),
        Probe::SelectNeeded { .. }
    ));
}
