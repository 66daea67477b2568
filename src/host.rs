//! The host router contract and an in-memory reference host.
//!
//! Registration hands every route to a [`RouteRegistrar`] as one
//! [`RouteOptions`] value. [`RouteTable`] is a complete registrar: it matches
//! `:param` URLs, runs the security chain, validates the request against the
//! compiled route schemas, runs the resolver's pre-handler and the operation
//! handler, and hands the response to the resolver's `on_send` hook.

use crate::dispatcher::{
    HandlerRequest, HandlerResponse, HeaderVec, OperationHandler, ParamVec, ResponseHook, RouteHook,
};
use crate::error::GlueError;
use crate::security::{SecurityChain, SecurityError};
use crate::spec::{BodySchema, ParameterMeta, ParameterStyle, RouteSchema, SecurityRequirement};
use crate::validator::ValidatorCache;
use http::Method;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Everything the host needs to register one route.
#[derive(Clone)]
pub struct RouteOptions {
    pub method: Method,
    /// URL template relative to `prefix`, placeholders as `:name`
    pub url: String,
    pub prefix: Option<String>,
    pub schema: RouteSchema,
    pub operation_id: String,
    pub openapi_path: String,
    pub openapi_source: Value,
    pub parameters: Vec<ParameterMeta>,
    pub security: Vec<SecurityRequirement>,
    pub config: Option<Value>,
    pub handler: Arc<dyn OperationHandler>,
    pub pre_handler: Option<Arc<dyn RouteHook>>,
    pub on_send: Option<Arc<dyn ResponseHook>>,
    /// Composite security check; `None` when the route is unauthenticated
    /// or no security handlers were supplied
    pub security_chain: Option<Arc<SecurityChain>>,
}

impl RouteOptions {
    /// `prefix` + `url`.
    pub fn full_url(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}{}", prefix.trim_end_matches('/'), self.url),
            None => self.url.clone(),
        }
    }
}

impl fmt::Debug for RouteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteOptions")
            .field("method", &self.method)
            .field("url", &self.full_url())
            .field("operation_id", &self.operation_id)
            .field("security", &self.security)
            .field("config", &self.config)
            .field("pre_handler", &self.pre_handler.is_some())
            .field("on_send", &self.on_send.is_some())
            .field("security_chain", &self.security_chain.is_some())
            .finish()
    }
}

/// The host side of registration.
pub trait RouteRegistrar {
    /// Register one route. An error aborts the whole registration.
    fn route(&mut self, options: RouteOptions) -> Result<(), GlueError>;

    /// Whether a body parser exists for a media type; only used for warnings.
    fn has_content_type_parser(&self, _content_type: &str) -> bool {
        true
    }
}

#[allow(clippy::expect_used)]
static URL_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":([^/:.]+)").expect("valid url parameter regex"));

/// Media type without parameters, lower-cased.
fn media_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn compile_pattern(url: &str) -> Result<(Regex, Vec<String>), GlueError> {
    let mut pattern = String::from("^");
    let mut names = Vec::new();
    let mut last = 0;
    for caps in URL_PARAM.captures_iter(url) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        pattern.push_str(&regex::escape(&url[last..whole.start()]));
        pattern.push_str("([^/]+)");
        names.push(name.as_str().to_string());
        last = whole.end();
    }
    pattern.push_str(&regex::escape(&url[last..]));
    pattern.push('$');
    let regex = Regex::new(&pattern)
        .map_err(|e| GlueError::Registration(format!("invalid url {url}: {e}")))?;
    Ok((regex, names))
}

struct TableEntry {
    key: String,
    pattern: Regex,
    param_names: Vec<String>,
    options: RouteOptions,
}

/// In-memory host router.
pub struct RouteTable {
    routes: Vec<TableEntry>,
    validators: ValidatorCache,
    parsers: BTreeSet<String>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self {
            routes: Vec::new(),
            validators: ValidatorCache::new(),
            parsers: BTreeSet::from(["application/json".to_string(), "text/plain".to_string()]),
        }
    }
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a body parser for a media type.
    pub fn with_content_type_parser(mut self, content_type: &str) -> Self {
        self.parsers.insert(media_essence(content_type));
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn routes(&self) -> impl Iterator<Item = &RouteOptions> {
        self.routes.iter().map(|e| &e.options)
    }

    pub fn validators(&self) -> &ValidatorCache {
        &self.validators
    }

    /// Match a request path (without query string).
    pub fn find(&self, method: &Method, path: &str) -> Option<(&RouteOptions, ParamVec)> {
        self.find_entry(method, path)
            .map(|(entry, params)| (&entry.options, params))
    }

    fn find_entry(&self, method: &Method, path: &str) -> Option<(&TableEntry, ParamVec)> {
        self.routes
            .iter()
            .filter(|e| &e.options.method == method)
            .find_map(|entry| {
                let caps = entry.pattern.captures(path)?;
                let mut params = ParamVec::new();
                for (i, name) in entry.param_names.iter().enumerate() {
                    let raw = caps.get(i + 1).map(|m| m.as_str()).unwrap_or_default();
                    let value = urlencoding::decode(raw)
                        .map(|v| v.into_owned())
                        .unwrap_or_else(|_| raw.to_string());
                    params.push((Arc::from(name.as_str()), value));
                }
                Some((entry, params))
            })
    }

    /// Serve one request.
    ///
    /// `req.path` may carry a query string; `req.headers` and `req.body` are
    /// taken as given. Query parameters, cookies and path parameters are
    /// filled in here.
    pub async fn dispatch(&self, mut req: HandlerRequest) -> HandlerResponse {
        if let Some((path, query)) = req.path.clone().split_once('?') {
            req.path = path.to_string();
            req.query_params.extend(
                url::form_urlencoded::parse(query.as_bytes())
                    .map(|(k, v)| (Arc::from(k.as_ref()), v.into_owned())),
            );
        }
        if let Some(cookie_header) = req.get_header("cookie").map(str::to_string) {
            req.cookies.extend(parse_cookies(&cookie_header));
        }

        let Some((entry, path_params)) = self.find_entry(&req.method, &req.path) else {
            let status = if self.routes.iter().any(|e| e.pattern.is_match(&req.path)) {
                405
            } else {
                404
            };
            debug!(method = %req.method, path = %req.path, status = status, "No route matched");
            let message = if status == 405 { "Method Not Allowed" } else { "Not Found" };
            return HandlerResponse::error(status, message);
        };
        let options = &entry.options;
        req.path_params = path_params;
        req.operation_id = options.operation_id.clone();
        req.config = options.config.clone();

        let Some(hook) = &options.on_send else {
            return self.respond(entry, req).await;
        };
        let sent = req.clone();
        let mut response = self.respond(entry, req).await;
        match hook.call(&sent, &mut response).await {
            Ok(()) => response,
            Err(err) => err.into_response(),
        }
    }

    /// Security, validation, pre-handler and handler for a matched route.
    async fn respond(&self, entry: &TableEntry, req: HandlerRequest) -> HandlerResponse {
        let options = &entry.options;
        if let Some(chain) = &options.security_chain {
            if let Err(err) = chain.authenticate(&req, &options.security).await {
                return security_response(&err);
            }
        }

        if let Err(response) = self.validate_request(entry, &req) {
            return response;
        }

        if let Some(hook) = &options.pre_handler {
            if let Err(err) = hook.call(&req).await {
                return err.into_response();
            }
        }

        match options.handler.handle(req).await {
            Ok(response) => response,
            Err(err) => {
                debug!(operation_id = %options.operation_id, error = %err, "Handler failed");
                err.into_response()
            }
        }
    }

    fn validate_request(&self, entry: &TableEntry, req: &HandlerRequest) -> Result<(), HandlerResponse> {
        let schema = &entry.options.schema;
        let locations: [(&str, Option<&Value>, &[(Arc<str>, String)], bool); 4] = [
            ("params", schema.params.as_ref(), req.path_params.as_slice(), false),
            ("querystring", schema.querystring.as_ref(), req.query_params.as_slice(), false),
            ("headers", schema.headers.as_ref(), req.headers.as_slice(), true),
            ("cookies", schema.cookies.as_ref(), req.cookies.as_slice(), false),
        ];
        for (location, location_schema, pairs, case_insensitive) in locations {
            let Some(location_schema) = location_schema else {
                continue;
            };
            let instance = collect_instance(pairs, location_schema, &entry.options.parameters, case_insensitive);
            self.check(&entry.key, location, &instance)?;
        }

        let Some(body) = &req.body else {
            return Ok(());
        };
        match &schema.body {
            Some(BodySchema::Single(_)) => self.check(&entry.key, "body", body),
            Some(BodySchema::ByContentType { .. }) => {
                let mime = req.get_header("content-type").map(media_essence).unwrap_or_default();
                self.check(&entry.key, &format!("body:{mime}"), body)
            }
            None => Ok(()),
        }
    }

    fn check(&self, key: &str, location: &str, instance: &Value) -> Result<(), HandlerResponse> {
        self.validators.validate(key, location, instance).map_err(|failure| {
            debug!(route = key, location = location, errors = ?failure.errors, "Request failed validation");
            HandlerResponse::error(400, &failure.to_string())
        })
    }
}

impl RouteRegistrar for RouteTable {
    fn route(&mut self, options: RouteOptions) -> Result<(), GlueError> {
        let url = options.full_url();
        let key = format!("{} {}", options.method, url);
        if self.routes.iter().any(|e| e.key == key) {
            return Err(GlueError::Registration(format!("duplicate route {key}")));
        }
        let (pattern, param_names) = compile_pattern(&url)?;
        self.validators
            .precompile(&key, &options.operation_id, &options.schema)?;
        info!(
            method = %options.method,
            url = %url,
            operation_id = %options.operation_id,
            secured = options.security_chain.is_some(),
            "Route registered"
        );
        self.routes.push(TableEntry {
            key,
            pattern,
            param_names,
            options,
        });
        Ok(())
    }

    fn has_content_type_parser(&self, content_type: &str) -> bool {
        self.parsers.contains(&media_essence(content_type))
    }
}

fn security_response(err: &SecurityError) -> HandlerResponse {
    let causes: Vec<&str> = err.causes.iter().map(|c| c.message.as_str()).collect();
    HandlerResponse::json(
        err.status_code,
        json!({
            "error": err.message,
            "failedSchemes": err.failed_schemes,
            "causes": causes,
        }),
    )
}

/// Parse a `Cookie` header (`a=b; c=d`).
pub fn parse_cookies(header: &str) -> HeaderVec {
    header
        .split(';')
        .filter_map(|pair| {
            let mut parts = pair.trim().splitn(2, '=');
            let name = parts.next()?.trim();
            if name.is_empty() {
                return None;
            }
            let value = parts.next().unwrap_or("").trim().to_string();
            Some((Arc::from(name), value))
        })
        .collect()
}

/// Build the object instance for one input location, coercing string
/// values to the declared property types.
fn collect_instance(
    pairs: &[(Arc<str>, String)],
    schema: &Value,
    parameters: &[ParameterMeta],
    case_insensitive: bool,
) -> Value {
    let properties = schema.get("properties").and_then(Value::as_object);
    let mut out = Map::new();
    for (name, raw) in pairs {
        let key = match properties {
            Some(props) if case_insensitive => props
                .keys()
                .find(|k| k.eq_ignore_ascii_case(name))
                .cloned()
                .unwrap_or_else(|| name.to_ascii_lowercase()),
            _ => name.to_string(),
        };
        let property = properties
            .and_then(|p| p.get(&key))
            .map(|property| follow_local_ref(schema, property));
        let style = parameters
            .iter()
            .find(|p| p.name == key)
            .and_then(|p| p.style);
        let value = coerce_value(raw, property, style);
        match (out.get_mut(&key), value) {
            (Some(Value::Array(existing)), Value::Array(more)) => existing.extend(more),
            (_, value) => {
                out.insert(key, value);
            }
        }
    }
    Value::Object(out)
}

/// Follow `#/...` references that point back into the same location
/// schema, as left behind for repeated subschemas.
fn follow_local_ref<'a>(root: &'a Value, mut schema: &'a Value) -> &'a Value {
    // a chain longer than this is a loop
    for _ in 0..16 {
        let Some(pointer) = schema
            .get("$ref")
            .and_then(Value::as_str)
            .and_then(|r| r.strip_prefix('#'))
        else {
            break;
        };
        match root.pointer(pointer) {
            Some(target) => schema = target,
            None => break,
        }
    }
    schema
}

/// Convert a raw parameter string according to its schema type.
pub fn coerce_value(value: &str, schema: Option<&Value>, style: Option<ParameterStyle>) -> Value {
    fn convert_primitive(val: &str, schema: Option<&Value>) -> Value {
        match schema.and_then(|s| s.get("type")).and_then(Value::as_str) {
            Some("integer") => val
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(val.to_string())),
            Some("number") => val
                .parse::<f64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(val.to_string())),
            Some("boolean") => val
                .parse::<bool>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(val.to_string())),
            _ => Value::String(val.to_string()),
        }
    }

    match schema.and_then(|s| s.get("type")).and_then(Value::as_str) {
        Some("array") => {
            let items = schema.and_then(|s| s.get("items"));
            let delim = match style.unwrap_or(ParameterStyle::Form) {
                ParameterStyle::SpaceDelimited => ' ',
                ParameterStyle::PipeDelimited => '|',
                _ => ',',
            };
            Value::Array(
                value
                    .split(delim)
                    .filter(|s| !s.is_empty())
                    .map(|p| convert_primitive(p.trim(), items))
                    .collect(),
            )
        }
        Some("object") => {
            serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()))
        }
        _ => convert_primitive(value, schema),
    }
}
