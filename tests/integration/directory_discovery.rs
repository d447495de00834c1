use crate::integration::support::{manager_in, write_manifest};
use std::fs;
use steward::agent::{DirectoryDiscovery, ModuleDiscovery};
use steward::ApiError;
use tempfile::TempDir;

#[test]
fn test_invalid_manifest_is_not_loadable() {
    let dir = TempDir::new().unwrap();
    let manager = manager_in(dir.path());
    fs::write(dir.path().join("broken.toml"), "tools = [\"a\", \"a\"]\n").unwrap();
    fs::write(dir.path().join("garbled.toml"), "tools = [").unwrap();

    let names: Vec<String> = manager.list_loadable().iter().unwrap().collect();
    assert_eq!(names, vec!["research", "writer"]);
    assert!(matches!(manager.load("broken"), Err(ApiError::NotFound(_))));
}

#[test]
fn test_clear_memory_reloads_edited_manifest() {
    let dir = TempDir::new().unwrap();
    let manager = manager_in(dir.path());
    manager.load("writer").unwrap();
    manager.switch("writer").unwrap();
    manager.remember("style", "terse").unwrap();

    fs::write(
        dir.path().join("writer.toml"),
        "description = \"edited\"\nsystem_prompt = \"Write plainly.\"\ntools = [\"draft\"]\n",
    )
    .unwrap();
    manager.clear_memory().unwrap();

    let (description, empty) = manager
        .with_active(|a| (a.manifest().description.clone(), a.memory().is_empty()))
        .unwrap();
    assert_eq!(description.as_deref(), Some("edited"));
    assert!(empty);
}

#[test]
fn test_reload_survives_deleted_manifest() {
    let dir = TempDir::new().unwrap();
    let manager = manager_in(dir.path());
    manager.load("writer").unwrap();
    manager.switch("writer").unwrap();
    fs::remove_file(dir.path().join("writer.toml")).unwrap();

    assert!(!manager.forget("anything").unwrap().forgotten);
    let description = manager
        .with_active(|a| a.manifest().description.clone())
        .unwrap();
    assert_eq!(description.as_deref(), Some("writer agent"));
}

#[test]
fn test_builtins_overlay() {
    let dir = TempDir::new().unwrap();
    write_manifest(dir.path(), "chat", &["calculator"]);
    let discovery = DirectoryDiscovery::with_dir(dir.path());

    let names = discovery.list_modules().unwrap();
    assert_eq!(names, vec!["chat", "research"]);
    let chat = discovery.manifest("chat").unwrap().unwrap();
    assert_eq!(chat.tools, vec!["calculator"]);
}
