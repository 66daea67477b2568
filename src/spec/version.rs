//! Version detection and the structural envelope check.
//!
//! The envelope schemas only cover what the route builders rely on (the version
//! field, `info`, the `paths` map and the security declarations). Everything
//! deeper is left to the schema engine at route compile time.

use super::types::SpecVersion;
use crate::error::GlueError;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use tracing::debug;

static V2_ENVELOPE: Lazy<Value> = Lazy::new(|| {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "required": ["swagger", "info", "paths"],
        "properties": {
            "swagger": { "const": "2.0" },
            "info": { "$ref": "#/$defs/info" },
            "basePath": { "type": "string", "pattern": "^/" },
            "paths": { "$ref": "#/$defs/paths" },
            "consumes": { "type": "array", "items": { "type": "string" } },
            "produces": { "type": "array", "items": { "type": "string" } },
            "securityDefinitions": { "type": "object", "additionalProperties": { "type": "object" } },
            "security": { "$ref": "#/$defs/security" }
        },
        "$defs": envelope_defs()
    })
});

static V3_ENVELOPE: Lazy<Value> = Lazy::new(|| {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "required": ["openapi", "info"],
        "properties": {
            "openapi": { "type": "string", "pattern": "^3\\.[01]\\.\\d+(-.+)?$" },
            "info": { "$ref": "#/$defs/info" },
            "servers": {
                "type": "array",
                "items": { "type": "object", "required": ["url"], "properties": { "url": { "type": "string" } } }
            },
            "paths": { "$ref": "#/$defs/paths" },
            "components": {
                "type": "object",
                "properties": {
                    "securitySchemes": { "type": "object", "additionalProperties": { "type": "object" } }
                }
            },
            "security": { "$ref": "#/$defs/security" }
        },
        "$defs": envelope_defs()
    })
});

fn envelope_defs() -> Value {
    json!({
        "info": {
            "type": "object",
            "required": ["title", "version"],
            "properties": {
                "title": { "type": "string" },
                "version": { "type": "string" }
            }
        },
        "paths": {
            "type": "object",
            "patternProperties": {
                "^/": { "type": "object" },
                "^x-": {}
            },
            "additionalProperties": false
        },
        "security": {
            "type": "array",
            "items": {
                "type": "object",
                "additionalProperties": { "type": "array", "items": { "type": "string" } }
            }
        }
    })
}

/// Classify a document by its version field.
///
/// `swagger` (any value, checked by the envelope) gives 2.0; an `openapi`
/// string starting with `3.0` or `3.1` gives the matching 3.x tag.
pub fn detect_version(doc: &Value) -> Result<SpecVersion, GlueError> {
    if doc.get("swagger").is_some() {
        return Ok(SpecVersion::V2);
    }
    match doc.get("openapi").and_then(Value::as_str) {
        Some(v) if v.starts_with("3.0") => Ok(SpecVersion::V3_0),
        Some(v) if v.starts_with("3.1") => Ok(SpecVersion::V3_1),
        other => {
            debug!(openapi = ?other, "Unsupported or missing specification version");
            Err(GlueError::SpecificationInvalid)
        }
    }
}

/// Check the structural envelope for the detected version.
pub fn validate_envelope(doc: &Value, version: SpecVersion) -> Result<(), GlueError> {
    let schema = match version {
        SpecVersion::V2 => &*V2_ENVELOPE,
        SpecVersion::V3_0 | SpecVersion::V3_1 => &*V3_ENVELOPE,
    };
    let validator = jsonschema::validator_for(schema).map_err(|e| {
        debug!(error = %e, "Envelope schema failed to compile");
        GlueError::SpecificationInvalid
    })?;
    let errors: Vec<String> = validator.iter_errors(doc).map(|e| e.to_string()).collect();
    if !errors.is_empty() {
        debug!(version = %version, issues = ?errors, "Specification failed envelope validation");
        return Err(GlueError::SpecificationInvalid);
    }
    // 3.0 makes `paths` mandatory; 3.1 allows webhook/component-only documents
    if version == SpecVersion::V3_0 && doc.get("paths").is_none() {
        debug!("OpenAPI 3.0 document without paths");
        return Err(GlueError::SpecificationInvalid);
    }
    Ok(())
}

/// Detect and validate in one step.
pub fn check_specification(doc: &Value) -> Result<SpecVersion, GlueError> {
    let version = detect_version(doc)?;
    validate_envelope(doc, version)?;
    Ok(version)
}
