//! OpenAPI 3.0/3.1 extraction rules.

use super::build::{collect_security_schemes, normalize_prefix, BuildOptions, RouteModelBuilder};
use super::cycles::reference_to;
use super::refs::{Located, RefResolver};
use super::types::{
    BodySchema, MediaSchema, ParameterStyle, RouteSchema, SecuritySchemes, SpecVersion,
};
use crate::error::GlueError;
use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use tracing::warn;

pub struct V3Builder<'r> {
    version: SpecVersion,
    resolver: &'r RefResolver,
    options: BuildOptions,
    content_types: BTreeSet<String>,
}

impl<'r> V3Builder<'r> {
    pub fn new(version: SpecVersion, resolver: &'r RefResolver, options: &BuildOptions) -> Self {
        Self {
            version,
            resolver,
            options: options.clone(),
            content_types: BTreeSet::new(),
        }
    }

    /// Walk a `content` map, recording every media type.
    ///
    /// Returns each media type with its schema placeholder; a media type
    /// without a schema maps to `None`.
    fn parse_content(
        &mut self,
        holder: &Located<'r>,
    ) -> Result<Vec<(String, Option<Value>)>, GlueError> {
        let Some(content) = holder.get("content") else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for (mime, media) in self.resolver.deref(content)?.entries() {
            self.content_types.insert(mime.to_string());
            let schema = media.get("schema").map(|s| reference_to(&s.location));
            out.push((mime.to_string(), schema));
        }
        Ok(out)
    }

    /// The operative schema of a parameter: `schema`, else the last media
    /// type of `content`.
    fn parameter_schema(&self, param: &Located<'r>) -> Option<Located<'r>> {
        if let Some(schema) = param.get("schema") {
            return Some(schema);
        }
        param
            .get("content")
            .and_then(|content| content.entries().pop())
            .and_then(|(_, media)| media.get("schema"))
    }

    /// One exploded object-typed query parameter describes the whole
    /// querystring.
    fn whole_querystring_schema(&self, query: &[Located<'r>]) -> Result<Option<Value>, GlueError> {
        let [param] = query else {
            return Ok(None);
        };
        let style = param
            .str_field("style")
            .and_then(ParameterStyle::parse)
            .unwrap_or(ParameterStyle::Form);
        let explode = param
            .bool_field("explode")
            .unwrap_or(style == ParameterStyle::Form);
        if !explode {
            return Ok(None);
        }
        let Some(schema) = self.parameter_schema(param) else {
            return Ok(None);
        };
        let resolved = self.resolver.deref(schema.clone())?;
        if resolved.str_field("type") != Some("object") {
            return Ok(None);
        }
        Ok(Some(reference_to(&schema.location)))
    }
}

impl<'r> RouteModelBuilder<'r> for V3Builder<'r> {
    fn version(&self) -> SpecVersion {
        self.version
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
        let mut cookies = Vec::new();

        for param in params {
            match param.str_field("in") {
                Some("path") => path.push(param.clone()),
                Some("query") => query.push(param.clone()),
                Some("header") => headers.push(param.clone()),
                Some("cookie") => {
                    if self.options.add_cookie_schema {
                        cookies.push(param.clone());
                    } else {
                        warn!(
                            parameter = param.str_field("name").unwrap_or_default(),
                            "cookie parameters are not supported by the host router, dropping"
                        );
                    }
                }
                _ => {}
            }
        }

        if !path.is_empty() {
            schema.params = Some(self.make_schema(&path)?);
        }
        if !query.is_empty() {
            schema.querystring = match self.whole_querystring_schema(&query)? {
                Some(whole) => Some(whole),
                None => Some(self.make_schema(&query)?),
            };
        }
        if !headers.is_empty() {
            schema.headers = Some(self.make_schema(&headers)?);
        }
        if !cookies.is_empty() {
            schema.cookies = Some(self.make_schema(&cookies)?);
        }
        Ok(())
    }

    fn parse_body(
        &mut self,
        operation: &Located<'r>,
        schema: &mut RouteSchema,
    ) -> Result<(), GlueError> {
        let Some(request_body) = operation.get("requestBody") else {
            return Ok(());
        };
        let request_body = self.resolver.deref(request_body)?;
        let mut media = self.parse_content(&request_body)?;

        if self.options.content_type_body && media.len() > 1 {
            let content: IndexMap<String, MediaSchema> = media
                .into_iter()
                .map(|(mime, schema)| {
                    let schema = schema.unwrap_or_else(|| json!({}));
                    (mime, MediaSchema { schema })
                })
                .collect();
            schema.body = Some(BodySchema::ByContentType { content });
            return Ok(());
        }

        // the host validates one body schema; the last media type wins
        if let Some((_, Some(last))) = media.pop() {
            schema.body = Some(BodySchema::Single(last));
        }
        Ok(())
    }

    fn parse_responses(
        &mut self,
        operation: &Located<'r>,
    ) -> Result<IndexMap<String, Value>, GlueError> {
        let mut out = IndexMap::new();
        let Some(responses) = operation.get("responses") else {
            return Ok(out);
        };
        for (status, response) in self.resolver.deref(responses)?.entries() {
            if status.starts_with("x-") {
                continue;
            }
            let response = self.resolver.deref(response)?;
            match self.parse_content(&response)?.pop() {
                Some((_, Some(body))) => {
                    out.insert(status.to_string(), body);
                }
                _ if self.options.add_empty_schema => {
                    out.insert(status.to_string(), json!({}));
                }
                _ => {}
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
            let mut property = match self.parameter_schema(param) {
                Some(schema) => reference_to(&schema.location),
                None => json!({}),
            };
            if let (Some(description), Value::Object(map)) =
                (param.value.get("description"), &mut property)
            {
                map.insert("description".to_string(), description.clone());
            }
            properties.insert(name.to_string(), property);
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
        let declared = self
            .resolver
            .root()
            .get("components")
            .and_then(|c| c.get("securitySchemes"));
        collect_security_schemes(self.resolver, declared)
    }

    fn prefix(&self) -> Option<String> {
        let server = self.resolver.root().get("servers")?.items().into_iter().next()?;
        let url = expand_server_variables(&server)?;
        let path = url::Url::parse(&url)
            .or_else(|_| url::Url::parse(&format!("http://localhost{url}")))
            .ok()?
            .path()
            .to_string();
        normalize_prefix(&path)
    }

    fn take_content_types(&mut self) -> BTreeSet<String> {
        std::mem::take(&mut self.content_types)
    }
}

/// Server URL with `{variable}` placeholders replaced by their defaults.
fn expand_server_variables(server: &Located<'_>) -> Option<String> {
    let mut url = server.str_field("url")?.to_string();
    for (name, variable) in server.get("variables").map(|v| v.entries()).unwrap_or_default() {
        if let Some(default) = variable.str_field("default") {
            url = url.replace(&format!("{{{name}}}"), default);
        }
    }
    Some(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::build::build_spec;
    use crate::spec::types::ParsedSpec;
    use pretty_assertions::assert_eq;

    fn parse_with(doc: Value, options: BuildOptions) -> ParsedSpec {
        let resolver = RefResolver::new(doc, None).unwrap();
        let mut builder = V3Builder::new(SpecVersion::V3_0, &resolver, &options);
        build_spec(&mut builder).unwrap()
    }

    fn parse(doc: Value) -> ParsedSpec {
        parse_with(doc, BuildOptions::default())
    }

    fn document(paths: Value) -> Value {
        json!({
            "openapi": "3.0.3",
            "info": {"title": "t", "version": "1"},
            "servers": [{"url": "https://api.example.com/{stage}/", "variables": {"stage": {"default": "v1"}}}],
            "paths": paths,
            "components": {
                "schemas": {
                    "Pet": {"type": "object", "properties": {"name": {"type": "string"}}},
                    "Xml": {"type": "string"},
                    "Filter": {"type": "object", "properties": {"tag": {"type": "string"}, "limit": {"type": "integer"}}},
                    "Id": {"type": "integer", "description": "numeric identifier"}
                },
                "securitySchemes": {
                    "bearer": {"type": "http", "scheme": "bearer"}
                }
            }
        })
    }

    #[test]
    fn test_last_media_type_wins_and_all_are_recorded() {
        let spec = parse(document(json!({
            "/pets": {
                "post": {
                    "requestBody": {
                        "content": {
                            "application/json": {"schema": {"$ref": "#/components/schemas/Pet"}},
                            "application/xml": {"schema": {"$ref": "#/components/schemas/Xml"}}
                        }
                    },
                    "responses": {"201": {"description": "created"}}
                }
            }
        })));
        let route = &spec.routes[0];
        assert_eq!(route.schema.body, Some(BodySchema::Single(json!({"type": "string"}))));
        assert!(spec.content_types.contains("application/json"));
        assert!(spec.content_types.contains("application/xml"));
    }

    #[test]
    fn test_content_type_body_keeps_every_media_type() {
        let options = BuildOptions {
            content_type_body: true,
            ..Default::default()
        };
        let spec = parse_with(
            document(json!({
                "/pets": {
                    "post": {
                        "requestBody": {
                            "content": {
                                "application/json": {"schema": {"$ref": "#/components/schemas/Pet"}},
                                "text/plain": {}
                            }
                        },
                        "responses": {}
                    }
                }
            })),
            options,
        );
        assert_eq!(
            spec.routes[0].schema.to_value()["body"],
            json!({"content": {
                "application/json": {"schema": {"type": "object", "properties": {"name": {"type": "string"}}}},
                "text/plain": {"schema": {}}
            }})
        );
    }

    #[test]
    fn test_empty_content_yields_no_body() {
        let spec = parse(document(json!({
            "/pets": {"post": {"requestBody": {"content": {}}, "responses": {}}}
        })));
        assert!(spec.routes[0].schema.body.is_none());
        assert!(spec.routes[0].schema.is_empty());
    }

    #[test]
    fn test_parameters_use_declared_schema_with_description() {
        let spec = parse(document(json!({
            "/pets/{id}": {
                "parameters": [{"name": "id", "in": "path", "required": true, "schema": {"type": "integer"}}],
                "get": {
                    "parameters": [
                        {"name": "X-Trace", "in": "header", "description": "trace id", "schema": {"type": "string"}},
                        {"name": "limit", "in": "query", "schema": {"type": "integer"}},
                        {"name": "sort", "in": "query", "schema": {"type": "string"}}
                    ],
                    "responses": {"200": {"description": "ok", "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Pet"}}}}}
                }
            }
        })));
        let route = &spec.routes[0];
        assert_eq!(route.operation_id, "getPetsById");
        assert_eq!(
            route.schema.params,
            Some(json!({"type": "object", "properties": {"id": {"type": "integer"}}, "required": ["id"]}))
        );
        assert_eq!(
            route.schema.headers,
            Some(json!({"type": "object", "properties": {"X-Trace": {"type": "string", "description": "trace id"}}}))
        );
        let query = route.schema.querystring.clone().unwrap();
        assert_eq!(query["properties"]["limit"], json!({"type": "integer"}));
        assert_eq!(route.schema.response["200"]["type"], "object");
        assert_eq!(route.parameters.len(), 4);
    }

    #[test]
    fn test_parameter_description_wins_over_referenced_schema() {
        let spec = parse(document(json!({
            "/users/{userId}/posts/{postId}": {
                "get": {
                    "parameters": [
                        {"name": "userId", "in": "path", "required": true, "description": "owner", "schema": {"$ref": "#/components/schemas/Id"}},
                        {"name": "postId", "in": "path", "required": true, "schema": {"$ref": "#/components/schemas/Id"}}
                    ],
                    "responses": {}
                }
            }
        })));
        let params = spec.routes[0].schema.params.clone().unwrap();
        assert_eq!(
            params["properties"]["userId"],
            json!({"type": "integer", "description": "owner"})
        );
        // the repeat points back at the first copy
        assert_eq!(params["properties"]["postId"], json!({"$ref": "#/properties/userId"}));
    }

    #[test]
    fn test_single_exploded_object_query_is_used_verbatim() {
        let spec = parse(document(json!({
            "/search": {
                "get": {
                    "parameters": [{"name": "filter", "in": "query", "schema": {"$ref": "#/components/schemas/Filter"}}],
                    "responses": {}
                }
            }
        })));
        assert_eq!(
            spec.routes[0].schema.querystring,
            Some(json!({"type": "object", "properties": {"tag": {"type": "string"}, "limit": {"type": "integer"}}}))
        );
    }

    #[test]
    fn test_non_exploded_object_query_is_wrapped() {
        let spec = parse(document(json!({
            "/search": {
                "get": {
                    "parameters": [{"name": "filter", "in": "query", "explode": false, "schema": {"$ref": "#/components/schemas/Filter"}}],
                    "responses": {}
                }
            }
        })));
        let query = spec.routes[0].schema.querystring.clone().unwrap();
        assert_eq!(query["properties"]["filter"]["type"], "object");
    }

    #[test]
    fn test_cookie_parameters_dropped_unless_enabled() {
        let paths = json!({
            "/session": {
                "get": {
                    "parameters": [{"name": "sid", "in": "cookie", "required": true, "schema": {"type": "string"}}],
                    "responses": {}
                }
            }
        });
        let spec = parse(document(paths.clone()));
        assert!(spec.routes[0].schema.cookies.is_none());

        let options = BuildOptions {
            add_cookie_schema: true,
            ..Default::default()
        };
        let spec = parse_with(document(paths), options);
        assert_eq!(spec.routes[0].schema.cookies.as_ref().unwrap()["required"], json!(["sid"]));
    }

    #[test]
    fn test_prefix_from_first_server_and_schemes() {
        let spec = parse(document(json!({})));
        assert_eq!(spec.prefix.as_deref(), Some("/v1"));
        assert_eq!(spec.security_schemes["bearer"]["scheme"], "bearer");
    }

    #[test]
    fn test_relative_server_url_prefix() {
        let mut doc = document(json!({}));
        doc["servers"] = json!([{"url": "/api/"}, {"url": "/ignored"}]);
        assert_eq!(parse(doc).prefix.as_deref(), Some("/api"));
    }

    #[test]
    fn test_skip_extension_and_missing_responses() {
        let spec = parse(document(json!({
            "/internal": {"get": {"x-no-glue-config": true, "responses": {}}},
            "/public": {"get": {}}
        })));
        assert_eq!(spec.routes.len(), 1);
        assert_eq!(spec.routes[0].operation_id, "getPublic");
    }

    #[test]
    fn test_duplicate_operation_ids_are_listed() {
        let spec = parse(document(json!({
            "/a": {"get": {"operationId": "same", "responses": {}}},
            "/b": {"get": {"operationId": "same", "responses": {}}, "post": {"operationId": "same", "responses": {}}}
        })));
        assert_eq!(spec.routes.len(), 3);
        assert_eq!(spec.duplicate_operation_ids, vec!["same".to_string()]);
    }
}
