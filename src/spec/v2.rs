//! Swagger 2.0 extraction rules.

use super::build::{collect_security_schemes, normalize_prefix, BuildOptions, RouteModelBuilder};
use super::cycles::reference_to;
use super::refs::{Located, RefResolver};
use super::types::{BodySchema, RouteSchema, SecuritySchemes, SpecVersion};
use crate::error::GlueError;
use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;

/// Parameter fields carried into the synthesized property schemas.
const COPIED_PARAMETER_FIELDS: [&str; 2] = ["type", "description"];

pub struct V2Builder<'r> {
    resolver: &'r RefResolver,
    options: BuildOptions,
    content_types: BTreeSet<String>,
}

impl<'r> V2Builder<'r> {
    pub fn new(resolver: &'r RefResolver, options: &BuildOptions) -> Self {
        Self {
            resolver,
            options: options.clone(),
            content_types: BTreeSet::new(),
        }
    }

    /// `consumes`/`produces` of the operation, else of the document.
    fn record_media_types(&mut self, operation: &Located<'r>, field: &str) {
        let declared = operation
            .value
            .get(field)
            .or_else(|| self.resolver.root().value.get(field));
        if let Some(Value::Array(types)) = declared {
            self.content_types
                .extend(types.iter().filter_map(Value::as_str).map(str::to_string));
        }
    }
}

impl<'r> RouteModelBuilder<'r> for V2Builder<'r> {
    fn version(&self) -> SpecVersion {
        SpecVersion::V2
    }

    fn resolver(&self) -> &'r RefResolver {
        self.resolver
    }

    fn parse_parameters(
        &mut self,
        params: &[Located<'r>],
        schema: &mut RouteSchema,
    ) -> Result<(), GlueError> {
        let mut path = Vec::new();
        let mut query = Vec::new();
        let mut headers = Vec::new();
        let mut form_data = Vec::new();

        for param in params {
            match param.str_field("in") {
                Some("body") => {
                    if let Some(body) = param.get("schema") {
                        schema.body = Some(BodySchema::Single(reference_to(&body.location)));
                    }
                }
                Some("formData") => form_data.push(param.clone()),
                Some("path") => path.push(param.clone()),
                Some("query") => query.push(param.clone()),
                Some("header") => headers.push(param.clone()),
                _ => {}
            }
        }

        if !path.is_empty() {
            schema.params = Some(self.make_schema(&path)?);
        }
        if !query.is_empty() {
            schema.querystring = Some(self.make_schema(&query)?);
        }
        if !headers.is_empty() {
            schema.headers = Some(self.make_schema(&headers)?);
        }
        if !form_data.is_empty() {
            schema.body = Some(BodySchema::Single(self.make_schema(&form_data)?));
        }
        Ok(())
    }

    fn parse_body(
        &mut self,
        operation: &Located<'r>,
        _schema: &mut RouteSchema,
    ) -> Result<(), GlueError> {
        // the body itself is a parameter in 2.0
        self.record_media_types(operation, "consumes");
        Ok(())
    }

    fn parse_responses(
        &mut self,
        operation: &Located<'r>,
    ) -> Result<IndexMap<String, Value>, GlueError> {
        self.record_media_types(operation, "produces");
        let mut out = IndexMap::new();
        let Some(responses) = operation.get("responses") else {
            return Ok(out);
        };
        for (status, response) in self.resolver.deref(responses)?.entries() {
            if status.starts_with("x-") {
                continue;
            }
            let response = self.resolver.deref(response)?;
            if let Some(body) = response.get("schema") {
                out.insert(status.to_string(), reference_to(&body.location));
            } else if self.options.add_empty_schema {
                out.insert(status.to_string(), json!({}));
            }
        }
        Ok(out)
    }

    fn make_schema(&self, params: &[Located<'r>]) -> Result<Value, GlueError> {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in params {
            let Some(name) = param.str_field("name") else {
                continue;
            };
            let mut property = Map::new();
            for field in COPIED_PARAMETER_FIELDS {
                if let Some(value) = param.value.get(field) {
                    property.insert(field.to_string(), value.clone());
                }
            }
            // validators know nothing about multipart streams
            if param.str_field("type") == Some("file") {
                property.insert("type".to_string(), json!("string"));
                property.insert("isFile".to_string(), json!(true));
            }
            properties.insert(name.to_string(), Value::Object(property));
            if param.bool_field("required") == Some(true) {
                required.push(json!(name));
            }
        }
        let mut schema = Map::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".to_string(), Value::Array(required));
        }
        Ok(Value::Object(schema))
    }

    fn security_schemes(&self) -> Result<SecuritySchemes, GlueError> {
        collect_security_schemes(self.resolver, self.resolver.root().get("securityDefinitions"))
    }

    fn prefix(&self) -> Option<String> {
        self.resolver
            .root()
            .str_field("basePath")
            .and_then(normalize_prefix)
    }

    fn take_content_types(&mut self) -> BTreeSet<String> {
        std::mem::take(&mut self.content_types)
    }
}
