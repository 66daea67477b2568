use http::Method;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Document version tag produced by the version detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecVersion {
    /// Swagger 2.0
    V2,
    /// OpenAPI 3.0.x
    V3_0,
    /// OpenAPI 3.1.x
    V3_1,
}

impl SpecVersion {
    /// Normalized tag: `"2.0"`, `"3.0"` or `"3.1"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecVersion::V2 => "2.0",
            SpecVersion::V3_0 => "3.0",
            SpecVersion::V3_1 => "3.1",
        }
    }

    pub fn is_v3(&self) -> bool {
        !matches!(self, SpecVersion::V2)
    }
}

impl std::fmt::Display for SpecVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
    Body,
    FormData,
}

impl ParameterLocation {
    /// Parse the `in` discriminator of a parameter object.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "path" => Some(ParameterLocation::Path),
            "query" => Some(ParameterLocation::Query),
            "header" => Some(ParameterLocation::Header),
            "cookie" => Some(ParameterLocation::Cookie),
            "body" => Some(ParameterLocation::Body),
            "formData" => Some(ParameterLocation::FormData),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterLocation::Path => write!(f, "path"),
            ParameterLocation::Query => write!(f, "query"),
            ParameterLocation::Header => write!(f, "header"),
            ParameterLocation::Cookie => write!(f, "cookie"),
            ParameterLocation::Body => write!(f, "body"),
            ParameterLocation::FormData => write!(f, "formData"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterStyle {
    Matrix,
    Label,
    Form,
    Simple,
    SpaceDelimited,
    PipeDelimited,
    DeepObject,
}

impl ParameterStyle {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "matrix" => Some(ParameterStyle::Matrix),
            "label" => Some(ParameterStyle::Label),
            "form" => Some(ParameterStyle::Form),
            "simple" => Some(ParameterStyle::Simple),
            "spaceDelimited" => Some(ParameterStyle::SpaceDelimited),
            "pipeDelimited" => Some(ParameterStyle::PipeDelimited),
            "deepObject" => Some(ParameterStyle::DeepObject),
            _ => None,
        }
    }

    /// Style used when a v3 parameter does not declare one.
    pub fn default_for(location: ParameterLocation) -> Option<Self> {
        match location {
            ParameterLocation::Query | ParameterLocation::Cookie => Some(ParameterStyle::Form),
            ParameterLocation::Path | ParameterLocation::Header => Some(ParameterStyle::Simple),
            ParameterLocation::Body | ParameterLocation::FormData => None,
        }
    }
}

impl std::fmt::Display for ParameterStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ParameterStyle::Matrix => "matrix",
            ParameterStyle::Label => "label",
            ParameterStyle::Form => "form",
            ParameterStyle::Simple => "simple",
            ParameterStyle::SpaceDelimited => "spaceDelimited",
            ParameterStyle::PipeDelimited => "pipeDelimited",
            ParameterStyle::DeepObject => "deepObject",
        };
        f.write_str(s)
    }
}

/// Serialization metadata for one declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterMeta {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub style: Option<ParameterStyle>,
    pub explode: Option<bool>,
}

/// One alternative of a security requirement sequence.
///
/// Holds the scheme names of a requirement object in declaration order, each
/// with the scopes it declared. Only the names serialize, so two requirements
/// naming the same schemes share one canonical form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SecurityRequirement {
    names: Vec<String>,
    #[serde(skip)]
    scopes: Vec<Vec<String>>,
}

impl SecurityRequirement {
    /// A requirement on `names`, none of them with scopes.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names.into_iter().map(|name| (name, Vec::new())).collect()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Scopes declared for `name`; empty when the scheme is absent.
    pub fn scopes(&self, name: &str) -> &[String] {
        self.names
            .iter()
            .position(|n| n == name)
            .and_then(|i| self.scopes.get(i))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// `(name, scopes)` pairs in declaration order.
    pub fn schemes(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.scopes.iter().map(Vec::as_slice))
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Vec<String>)> for SecurityRequirement {
    fn from_iter<T: IntoIterator<Item = (S, Vec<String>)>>(iter: T) -> Self {
        let (names, scopes) = iter.into_iter().map(|(name, scopes)| (name.into(), scopes)).unzip();
        Self { names, scopes }
    }
}

/// Request body schema as handed to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BodySchema {
    /// A single operative schema.
    Single(Value),
    /// One schema per media type, serialized as `{"content": {mime: {"schema": ..}}}`.
    ByContentType {
        content: IndexMap<String, MediaSchema>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaSchema {
    pub schema: Value,
}

/// Validation schemas of a route, keyed by input location.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RouteSchema {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub querystring: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookies: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<BodySchema>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub response: IndexMap<String, Value>,
}

impl RouteSchema {
    pub fn is_empty(&self) -> bool {
        self.params.is_none()
            && self.querystring.is_none()
            && self.headers.is_none()
            && self.cookies.is_none()
            && self.body.is_none()
            && self.response.is_empty()
    }

    /// The schema as a JSON object, the shape a host validation compiler accepts.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// One normalized `(method, path)` operation.
#[derive(Debug, Clone)]
pub struct Route {
    pub method: Method,
    /// Host URL template, `{name}` rewritten to `:name`
    pub url: String,
    /// Path key exactly as written in the document
    pub openapi_path: String,
    pub operation_id: String,
    pub schema: RouteSchema,
    pub parameters: Vec<ParameterMeta>,
    /// OR of alternatives; empty means unauthenticated
    pub security: Vec<SecurityRequirement>,
    /// Pass-through value of the `x-glue-config` extension
    pub config: Option<Value>,
    /// The raw operation object
    pub openapi_source: Value,
}

/// Name to declared metadata, from `securityDefinitions` or `components.securitySchemes`.
pub type SecuritySchemes = IndexMap<String, Value>;

/// Output of one parse pass.
#[derive(Debug, Clone)]
pub struct ParsedSpec {
    pub version: SpecVersion,
    /// Unresolved copy of the input document
    pub original: Arc<Value>,
    pub routes: Vec<Route>,
    pub security_schemes: SecuritySchemes,
    /// Every request/response media type referenced by an operation
    pub content_types: BTreeSet<String>,
    /// `basePath` (v2) or the path of the first server URL (v3)
    pub prefix: Option<String>,
    pub duplicate_operation_ids: Vec<String>,
}
