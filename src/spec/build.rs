use super::cycles::CycleBreaker;
use super::naming::{make_operation_id, make_url};
use super::refs::{Located, RefResolver};
use super::types::{
    ParameterLocation, ParameterMeta, ParameterStyle, ParsedSpec, Route, RouteSchema,
    SecurityRequirement, SecuritySchemes, SpecVersion,
};
use crate::error::GlueError;
use http::Method;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, warn};

/// Operation extension passed through as [`Route::config`].
pub const CONFIG_EXTENSION: &str = "x-glue-config";

/// Operation extension that keeps an operation out of the route set.
pub const SKIP_EXTENSION: &str = "x-no-glue-config";

/// Path item keys that are operations, in the host's verb set.
const HTTP_OPERATIONS: [&str; 7] = ["delete", "get", "head", "patch", "post", "put", "options"];

/// Knobs that change the shape of the derived route schemas.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Emit `{}` for responses that declare no body schema
    pub add_empty_schema: bool,
    /// Collect v3 cookie parameters into `schema.cookies` instead of dropping them
    pub add_cookie_schema: bool,
    /// Keep every v3 request media type as `body.content.<mime>.schema`
    pub content_type_body: bool,
}

/// Version-specific extraction rules.
///
/// The shared walk in [`build_spec`] resolves path items, operations and
/// parameter objects; implementations only decide how those become schemas.
/// Schemas are emitted as `$ref` placeholders to document nodes and are
/// materialized afterwards by the cycle breaker.
pub trait RouteModelBuilder<'r> {
    fn version(&self) -> SpecVersion;

    fn resolver(&self) -> &'r RefResolver;

    /// Distribute resolved parameter objects over `params`, `querystring`,
    /// `headers`, `cookies` and (v2) `body`.
    fn parse_parameters(
        &mut self,
        params: &[Located<'r>],
        schema: &mut RouteSchema,
    ) -> Result<(), GlueError>;

    /// Derive the request body schema of an operation.
    fn parse_body(&mut self, operation: &Located<'r>, schema: &mut RouteSchema)
        -> Result<(), GlueError>;

    /// Response schema per status code (or `default`).
    fn parse_responses(
        &mut self,
        operation: &Located<'r>,
    ) -> Result<IndexMap<String, Value>, GlueError>;

    /// Object schema with one property per parameter and a `required` list
    /// that is omitted when empty.
    fn make_schema(&self, params: &[Located<'r>]) -> Result<Value, GlueError>;

    fn security_schemes(&self) -> Result<SecuritySchemes, GlueError>;

    /// Route prefix declared by the document, if any.
    fn prefix(&self) -> Option<String>;

    /// Media types recorded while building.
    fn take_content_types(&mut self) -> BTreeSet<String>;
}

/// Walk `paths` and produce the parsed specification.
pub fn build_spec<'r, B: RouteModelBuilder<'r>>(builder: &mut B) -> Result<ParsedSpec, GlueError> {
    let resolver = builder.resolver();
    let version = builder.version();
    let root = resolver.root();
    let breaker = CycleBreaker::new(resolver);

    let mut routes = Vec::new();
    let mut seen_ids = HashSet::new();
    let mut duplicate_operation_ids = Vec::new();

    if let Some(paths) = root.get("paths") {
        let paths = resolver.deref(paths)?;
        for (path, item) in paths.entries() {
            if !path.starts_with('/') {
                continue;
            }
            let item = resolver.deref(item)?;
            let shared = collect_parameters(resolver, item.get("parameters"))?;

            for (key, operation) in item.entries() {
                let Some(method) = operation_method(key) else {
                    continue;
                };
                let operation = resolver.deref(operation)?;
                if operation.bool_field(SKIP_EXTENSION) == Some(true) {
                    debug!(path = path, method = key, "Operation excluded by {}", SKIP_EXTENSION);
                    continue;
                }

                let own = collect_parameters(resolver, operation.get("parameters"))?;
                let parameters = merge_parameters(shared.clone(), own);

                let mut schema = RouteSchema::default();
                builder.parse_parameters(&parameters, &mut schema)?;
                builder.parse_body(&operation, &mut schema)?;
                schema.response = builder.parse_responses(&operation)?;
                breaker.remove_recursion(&mut schema)?;

                let operation_id = operation
                    .str_field("operationId")
                    .map(str::to_string)
                    .unwrap_or_else(|| make_operation_id(key, path));
                if !seen_ids.insert(operation_id.clone()) {
                    warn!(operation_id = %operation_id, path = path, method = key, "Duplicate operationId");
                    if !duplicate_operation_ids.contains(&operation_id) {
                        duplicate_operation_ids.push(operation_id.clone());
                    }
                }

                let security_source = operation
                    .get("security")
                    .or_else(|| root.get("security"));
                let security = match security_source {
                    Some(node) => parse_security(resolver, node)?,
                    None => Vec::new(),
                };

                routes.push(Route {
                    method,
                    url: make_url(path),
                    openapi_path: path.to_string(),
                    operation_id,
                    schema,
                    parameters: parameters
                        .iter()
                        .filter_map(|p| parameter_meta(p, version))
                        .collect(),
                    security,
                    config: operation.value.get(CONFIG_EXTENSION).cloned(),
                    openapi_source: operation.value.clone(),
                });
            }
        }
    }

    Ok(ParsedSpec {
        version,
        original: resolver.root_document(),
        routes,
        security_schemes: builder.security_schemes()?,
        content_types: builder.take_content_types(),
        prefix: builder.prefix(),
        duplicate_operation_ids,
    })
}

fn operation_method(key: &str) -> Option<Method> {
    if !HTTP_OPERATIONS.contains(&key) {
        return None;
    }
    Method::from_bytes(key.to_ascii_uppercase().as_bytes()).ok()
}

/// Resolve a `parameters` array, skipping entries without `name`/`in`.
fn collect_parameters<'r>(
    resolver: &'r RefResolver,
    node: Option<Located<'r>>,
) -> Result<Vec<Located<'r>>, GlueError> {
    let Some(node) = node else {
        return Ok(Vec::new());
    };
    let mut out = Vec::new();
    for item in resolver.deref(node)?.items() {
        let param = resolver.deref(item)?;
        if param.str_field("name").is_none() || param.str_field("in").is_none() {
            debug!(location = %param.location.to_ref(), "Ignoring parameter without name or location");
            continue;
        }
        out.push(param);
    }
    Ok(out)
}

fn same_parameter(a: &Located<'_>, b: &Located<'_>) -> bool {
    a.str_field("name") == b.str_field("name") && a.str_field("in") == b.str_field("in")
}

/// Path-level parameters followed by operation parameters; the operation wins
/// on the same `(name, in)`.
fn merge_parameters<'r>(shared: Vec<Located<'r>>, own: Vec<Located<'r>>) -> Vec<Located<'r>> {
    let mut merged: Vec<Located<'r>> = shared
        .into_iter()
        .filter(|s| !own.iter().any(|o| same_parameter(s, o)))
        .collect();
    merged.extend(own);
    merged
}

fn parameter_meta(param: &Located<'_>, version: SpecVersion) -> Option<ParameterMeta> {
    let name = param.str_field("name")?;
    let location = ParameterLocation::parse(param.str_field("in")?)?;
    let required = param.bool_field("required").unwrap_or(false);
    let (style, explode) = if version.is_v3() {
        let style = param
            .str_field("style")
            .and_then(ParameterStyle::parse)
            .or_else(|| ParameterStyle::default_for(location));
        let explode = param
            .bool_field("explode")
            .unwrap_or(style == Some(ParameterStyle::Form));
        (style, Some(explode))
    } else {
        (None, None)
    };
    Some(ParameterMeta {
        name: name.to_string(),
        location,
        required,
        style,
        explode,
    })
}

/// Read requirement objects as scheme names with their declared scopes.
fn parse_security(
    resolver: &RefResolver,
    node: Located<'_>,
) -> Result<Vec<SecurityRequirement>, GlueError> {
    let node = resolver.deref(node)?;
    Ok(node
        .items()
        .iter()
        .map(|req| {
            req.entries()
                .into_iter()
                .map(|(name, scopes)| {
                    let scopes: Vec<String> = scopes
                        .value
                        .as_array()
                        .map(|list| list.iter().filter_map(Value::as_str).map(str::to_string).collect())
                        .unwrap_or_default();
                    (name, scopes)
                })
                .collect()
        })
        .collect())
}

/// Collect a declared scheme table, resolving `$ref`ed entries.
pub(crate) fn collect_security_schemes(
    resolver: &RefResolver,
    node: Option<Located<'_>>,
) -> Result<SecuritySchemes, GlueError> {
    let mut schemes = SecuritySchemes::new();
    if let Some(node) = node {
        for (name, scheme) in resolver.deref(node)?.entries() {
            schemes.insert(name.to_string(), resolver.deref(scheme)?.value.clone());
        }
    }
    Ok(schemes)
}

/// Normalize a path prefix: trailing slashes trimmed, `""` and `/` mean none.
pub(crate) fn normalize_prefix(path: &str) -> Option<String> {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        None
    } else if trimmed.starts_with('/') {
        Some(trimmed.to_string())
    } else {
        Some(format!("/{trimmed}"))
    }
}
