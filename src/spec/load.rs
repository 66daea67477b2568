use super::build::{build_spec, BuildOptions};
use super::refs::RefResolver;
use super::types::{ParsedSpec, SpecVersion};
use super::v2::V2Builder;
use super::v3::V3Builder;
use super::version::check_specification;
use crate::error::GlueError;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use url::Url;

/// Where a specification comes from.
#[derive(Debug, Clone)]
pub enum SpecSource {
    /// A JSON or YAML file; relative `$ref` documents are read next to it
    Path(PathBuf),
    /// An already parsed document; only internal references resolve
    Document(Value),
}

impl From<PathBuf> for SpecSource {
    fn from(path: PathBuf) -> Self {
        SpecSource::Path(path)
    }
}

impl From<&Path> for SpecSource {
    fn from(path: &Path) -> Self {
        SpecSource::Path(path.to_path_buf())
    }
}

impl From<&str> for SpecSource {
    fn from(path: &str) -> Self {
        SpecSource::Path(PathBuf::from(path))
    }
}

impl From<Value> for SpecSource {
    fn from(doc: Value) -> Self {
        SpecSource::Document(doc)
    }
}

/// Read a JSON or YAML document, choosing the format by file extension.
pub fn read_document(path: &Path) -> anyhow::Result<Value> {
    let content = std::fs::read_to_string(path)?;
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
    let value = if is_yaml {
        serde_yaml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };
    Ok(value)
}

/// Parse a specification into its route model.
///
/// Every failure before route building (unreadable file, malformed document,
/// unsupported version, unresolvable reference) is reported as
/// [`GlueError::SpecificationInvalid`]; the detail goes to the debug log.
pub fn parse(source: impl Into<SpecSource>, options: &BuildOptions) -> Result<ParsedSpec, GlueError> {
    let (doc, base) = match source.into() {
        SpecSource::Path(path) => {
            let doc = read_document(&path).map_err(|e| {
                debug!(path = %path.display(), error = %e, "Failed to read specification");
                GlueError::SpecificationInvalid
            })?;
            let base = std::fs::canonicalize(&path)
                .ok()
                .and_then(|p| Url::from_file_path(p).ok());
            (doc, base)
        }
        SpecSource::Document(doc) => (doc, None),
    };

    let version = check_specification(&doc)?;
    let resolver = RefResolver::new(doc, base)?;
    let parsed = match version {
        SpecVersion::V2 => build_spec(&mut V2Builder::new(&resolver, options))?,
        SpecVersion::V3_0 | SpecVersion::V3_1 => {
            build_spec(&mut V3Builder::new(version, &resolver, options))?
        }
    };
    info!(
        version = %parsed.version,
        routes = parsed.routes.len(),
        security_schemes = parsed.security_schemes.len(),
        "Parsed specification"
    );
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_in_memory_document() {
        let doc = json!({
            "openapi": "3.1.0",
            "info": {"title": "t", "version": "1"},
            "paths": {"/ping": {"get": {"responses": {"200": {"description": "pong"}}}}}
        });
        let parsed = parse(doc.clone(), &BuildOptions::default()).unwrap();
        assert_eq!(parsed.version, SpecVersion::V3_1);
        assert_eq!(parsed.routes[0].operation_id, "getPing");
        assert_eq!(*parsed.original, doc);
    }

    #[test]
    fn test_parse_yaml_file_with_external_ref() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("pet.yaml"),
            "type: object\nproperties:\n  name:\n    type: string\n",
        )
        .unwrap();
        let spec_path = dir.path().join("openapi.yml");
        std::fs::write(
            &spec_path,
            r#"
openapi: 3.0.0
info: {title: t, version: "1"}
paths:
  /pets:
    post:
      requestBody:
        content:
          application/json:
            schema:
              $ref: 'pet.yaml'
      responses: {}
"#,
        )
        .unwrap();
        let parsed = parse(spec_path.as_path(), &BuildOptions::default()).unwrap();
        let body = parsed.routes[0].schema.to_value()["body"].clone();
        assert_eq!(body["properties"]["name"]["type"], "string");
        // the original keeps the reference
        assert_eq!(
            parsed.original["paths"]["/pets"]["post"]["requestBody"]["content"]["application/json"]["schema"]["$ref"],
            "pet.yaml"
        );
    }

    #[test]
    fn test_missing_file_is_invalid_specification() {
        let err = parse("/definitely/not/here.json", &BuildOptions::default()).unwrap_err();
        assert!(matches!(err, GlueError::SpecificationInvalid));
    }

    #[test]
    fn test_unresolvable_ref_is_invalid_specification() {
        let doc = json!({
            "swagger": "2.0",
            "info": {"title": "t", "version": "1"},
            "paths": {"/x": {"get": {"responses": {"200": {"description": "ok", "schema": {"$ref": "#/definitions/Nope"}}}}}}
        });
        let err = parse(doc, &BuildOptions::default()).unwrap_err();
        assert!(matches!(err, GlueError::SpecificationInvalid));
    }
}
