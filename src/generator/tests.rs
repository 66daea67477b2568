#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::path::PathBuf;

fn petstore() -> Value {
    json!({
        "swagger": "2.0",
        "info": {"title": "Petstore", "version": "1.0"},
        "basePath": "/v2",
        "securityDefinitions": {
            "api_key": {"type": "apiKey", "name": "api_key", "in": "header"}
        },
        "paths": {
            "/pet/{petId}": {
                "get": {
                    "operationId": "getPetById",
                    "summary": "Find pet by ID",
                    "security": [{"api_key": []}],
                    "parameters": [
                        {"name": "petId", "in": "path", "required": true, "type": "integer"}
                    ],
                    "responses": {"200": {"description": "ok", "schema": {"type": "object"}}}
                }
            },
            "/store/inventory": {
                "get": {"responses": {"200": {"description": "ok"}}}
            }
        }
    })
}

fn scaffolder(options: ScaffoldOptions) -> ProjectScaffolder {
    ProjectScaffolder::new(petstore(), options).unwrap()
}

fn file<'a>(files: &'a [GeneratedFile], path: &str) -> &'a GeneratedFile {
    files
        .iter()
        .find(|f| f.path == PathBuf::from(path))
        .unwrap_or_else(|| panic!("{path} not rendered"))
}

#[test]
fn test_rust_ident() {
    assert_eq!(rust_ident("getPetById", "op"), "get_pet_by_id");
    assert_eq!(rust_ident("generated-project", "svc"), "generated_project");
    assert_eq!(rust_ident("type", "op"), "type_");
    assert_eq!(rust_ident("2fa", "scheme"), "scheme_2fa");
    assert_eq!(rust_ident("$$", "op"), "op");
}

#[test]
fn test_unique_ident() {
    let mut seen = HashSet::new();
    assert_eq!(unique_ident(&mut seen, "foo"), "foo");
    assert_eq!(unique_ident(&mut seen, "foo"), "foo_1");
    assert_eq!(unique_ident(&mut seen, "foo"), "foo_2");
}

#[test]
fn test_render_lists_every_file() {
    let files = scaffolder(ScaffoldOptions::default()).render().unwrap();
    let mut paths: Vec<String> = files
        .iter()
        .map(|f| f.path.to_string_lossy().replace('\\', "/"))
        .collect();
    paths.sort();
    assert_eq!(
        paths,
        vec![
            "Cargo.toml",
            "openapi.json",
            "src/lib.rs",
            "src/main.rs",
            "src/security.rs",
            "src/service.rs",
            "tests/service.rs",
        ]
    );
}

#[test]
fn test_service_stub_per_operation() {
    let files = scaffolder(ScaffoldOptions::default()).render().unwrap();
    let service = &file(&files, "src/service.rs").contents;
    assert!(service.contains("pub async fn get_pet_by_id(req: HandlerRequest)"));
    assert!(service.contains(".operation(\"getPetById\", get_pet_by_id)"));
    assert!(service.contains(".operation(\"getStoreInventory\", get_store_inventory)"));
    assert!(service.contains("// Find pet by ID"));
    assert!(service.contains("// req.params:"));
    assert!(service.contains("// valid responses:"));
}

#[test]
fn test_security_stub_per_scheme() {
    let files = scaffolder(ScaffoldOptions::default()).render().unwrap();
    let security = &file(&files, "src/security.rs").contents;
    assert!(security.contains("pub fn api_key(req: &HandlerRequest)"));
    assert!(security.contains(".on_initialize(initialize)"));
    assert!(security.contains(".scheme(\"api_key\", api_key)"));
    let lib = &file(&files, "src/lib.rs").contents;
    assert!(lib.contains("pub mod security;"));
    assert!(lib.contains(".security_handlers(security::security_handlers())"));
}

#[test]
fn test_no_security_module_without_schemes() {
    let mut doc = petstore();
    doc.as_object_mut().unwrap().remove("securityDefinitions");
    let files = ProjectScaffolder::new(doc, ScaffoldOptions::default())
        .unwrap()
        .render()
        .unwrap();
    assert!(files.iter().all(|f| !f.path.ends_with("security.rs")));
    assert!(!file(&files, "src/lib.rs").contents.contains("security"));
}

#[test]
fn test_cargo_toml_dependency_modes() {
    let registry = scaffolder(ScaffoldOptions::default()).render().unwrap();
    let manifest = &file(&registry, "Cargo.toml").contents;
    assert!(manifest.contains("name = \"generated-project\""));
    assert!(manifest.contains(&format!("openapi-glue = \"{}\"", env!("CARGO_PKG_VERSION"))));

    let local = scaffolder(ScaffoldOptions {
        local_plugin: true,
        ..Default::default()
    })
    .render()
    .unwrap();
    assert!(file(&local, "Cargo.toml")
        .contents
        .contains("openapi-glue = { path = "));
}

#[test]
fn test_openapi_json_is_pristine() {
    let files = scaffolder(ScaffoldOptions::default()).render().unwrap();
    let copy: Value = serde_json::from_str(&file(&files, "openapi.json").contents).unwrap();
    assert_eq!(copy, petstore());
}

#[test]
fn test_checksums_are_stable_and_write_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let options = ScaffoldOptions {
        project_name: "petstore".into(),
        base_dir: dir.path().to_path_buf(),
        local_plugin: false,
    };
    let first = scaffolder(options.clone()).checksums().unwrap();
    let second = scaffolder(options).checksums().unwrap();
    assert_eq!(first, second);
    assert_eq!(first.project_name, "petstore");
    assert_eq!(first.files["src/service.rs"].len(), 64);
    assert!(!dir.path().join("petstore").exists());
}

#[test]
fn test_write_creates_project() {
    let dir = tempfile::tempdir().unwrap();
    let scaffolder = scaffolder(ScaffoldOptions {
        project_name: "petstore".into(),
        base_dir: dir.path().to_path_buf(),
        local_plugin: false,
    });
    let project = scaffolder.write().unwrap();
    assert_eq!(project, dir.path().join("petstore"));
    for path in ["Cargo.toml", "openapi.json", "src/lib.rs", "tests/service.rs"] {
        assert!(project.join(path).is_file(), "{path} missing");
    }
    let test = std::fs::read_to_string(project.join("tests/service.rs")).unwrap();
    assert!(test.contains("petstore::glue("));
    assert!(test.contains("assert_eq!(table.len(), 2);"));
}
