#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::fixture;
use openapi_glue::generator::{GeneratedFile, ProjectScaffolder, ScaffoldOptions};
use serde_json::Value;
use std::fs;
use std::path::Path;

fn options(base_dir: &Path, project_name: &str) -> ScaffoldOptions {
    ScaffoldOptions {
        project_name: project_name.to_string(),
        base_dir: base_dir.to_path_buf(),
        local_plugin: false,
    }
}

fn contents<'a>(files: &'a [GeneratedFile], path: &str) -> &'a str {
    files
        .iter()
        .find(|f| f.path == Path::new(path))
        .map(|f| f.contents.as_str())
        .unwrap_or_else(|| panic!("{path} not rendered"))
}

#[test]
fn test_v2_project_has_stub_per_operation_and_scheme() {
    let dir = tempfile::tempdir().unwrap();
    let scaffolder =
        ProjectScaffolder::new(fixture("petstore-v2.json"), options(dir.path(), "petstore")).unwrap();
    let files = scaffolder.render().unwrap();

    let service = contents(&files, "src/service.rs");
    for (id, func) in [
        ("addPet", "add_pet"),
        ("findPetsByStatus", "find_pets_by_status"),
        ("getPetById", "get_pet_by_id"),
        ("deletePet", "delete_pet"),
        ("uploadFile", "upload_file"),
        ("getStoreInventory", "get_store_inventory"),
    ] {
        assert!(service.contains(&format!("pub async fn {func}(req: HandlerRequest)")), "{func}");
        assert!(service.contains(&format!(".operation(\"{id}\", {func})")), "{id}");
    }

    let security = contents(&files, "src/security.rs");
    assert!(security.contains("pub fn petstore_auth(req: &HandlerRequest)"));
    assert!(security.contains("pub fn api_key(req: &HandlerRequest)"));

    let test = contents(&files, "tests/service.rs");
    assert!(test.contains("assert_eq!(table.len(), 6);"));
}

#[test]
fn test_v3_project_documents_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let files = ProjectScaffolder::new(fixture("petstore-v3.yaml"), options(dir.path(), "pets"))
        .unwrap()
        .render()
        .unwrap();
    let service = contents(&files, "src/service.rs");
    assert!(service.contains("// List all pets"));
    assert!(service.contains("// req.query:"));
    assert!(service.contains("// req.body:"));
    assert!(service.contains("pub async fn show_pet_by_id("));
    assert!(service.contains("pub async fn get_health("));
    // x-no-glue-config operations get no stub
    assert!(!service.contains("delete_pets_pet_id"));
}

#[test]
fn test_yaml_specification_is_stored_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let files = ProjectScaffolder::new(fixture("petstore-v3.yaml"), options(dir.path(), "pets"))
        .unwrap()
        .render()
        .unwrap();
    let stored: Value = serde_json::from_str(contents(&files, "openapi.json")).unwrap();
    let source: Value =
        serde_yaml::from_str(&fs::read_to_string(fixture("petstore-v3.yaml")).unwrap()).unwrap();
    assert_eq!(stored, source);
}

#[test]
fn test_write_matches_checksums() {
    let dir = tempfile::tempdir().unwrap();
    let scaffolder =
        ProjectScaffolder::new(fixture("petstore-v2.json"), options(dir.path(), "petstore")).unwrap();
    let manifest = scaffolder.checksums().unwrap();
    let project = scaffolder.write().unwrap();

    assert_eq!(project, dir.path().join("petstore"));
    assert_eq!(manifest.files.len(), 7);
    for (path, checksum) in &manifest.files {
        let written = GeneratedFile {
            path: path.into(),
            contents: fs::read_to_string(project.join(path)).unwrap(),
        };
        assert_eq!(&written.checksum(), checksum, "{path}");
    }
}

#[test]
fn test_invalid_specification_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let spec = dir.path().join("broken.yaml");
    fs::write(&spec, "openapi: 4.0.0\ninfo: {title: t, version: '1'}\npaths: {}\n").unwrap();
    let err = ProjectScaffolder::new(spec, options(dir.path(), "broken")).unwrap_err();
    assert_eq!(err.to_string(), openapi_glue::INVALID_SPECIFICATION);
    assert!(!dir.path().join("broken").exists());
}
