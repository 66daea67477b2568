use async_trait::async_trait;
use http::Method;
use serde::Serialize;
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Maximum inline path/query parameters before heap allocation
pub const MAX_INLINE_PARAMS: usize = 8;

/// Maximum inline headers/cookies before heap allocation
pub const MAX_INLINE_HEADERS: usize = 16;

/// Parameter storage; names are `Arc<str>` because they repeat across requests
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Header/cookie storage
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Request data handed to security handlers, hooks and operation handlers.
#[derive(Debug, Clone)]
pub struct HandlerRequest {
    /// HTTP method (GET, POST, etc.)
    pub method: Method,
    /// Request path as received, prefix included
    pub path: String,
    /// Operation the request was routed to
    pub operation_id: String,
    /// Path parameters extracted from the URL
    pub path_params: ParamVec,
    /// Query string parameters
    pub query_params: ParamVec,
    /// HTTP headers
    pub headers: HeaderVec,
    /// Cookies parsed from the Cookie header
    pub cookies: HeaderVec,
    /// Request body parsed as JSON (if present)
    pub body: Option<Value>,
    /// Route config: the `x-glue-config` value merged with resolver config
    pub config: Option<Value>,
}

impl HandlerRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            operation_id: String::new(),
            path_params: ParamVec::new(),
            query_params: ParamVec::new(),
            headers: HeaderVec::new(),
            cookies: HeaderVec::new(),
            body: None,
            config: None,
        }
    }

    /// Add a header, builder style.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((Arc::from(name), value.into()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Get a path parameter by name
    ///
    /// Uses "last write wins" semantics when a name repeats.
    #[inline]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a query parameter by name (last occurrence wins)
    #[inline]
    pub fn get_query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a header by name (case-insensitive per RFC 7230)
    #[inline]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    pub fn get_cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Note: This allocates - use get_path_param() in hot paths
    pub fn path_params_map(&self) -> HashMap<String, String> {
        self.path_params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    /// Note: This allocates - use get_query_param() in hot paths
    pub fn query_params_map(&self) -> HashMap<String, String> {
        self.query_params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

/// Response produced by an operation handler or by the host on failure.
#[derive(Debug, Clone, Serialize)]
pub struct HandlerResponse {
    /// HTTP status code (200, 404, 500, etc.)
    pub status: u16,
    #[serde(skip_serializing)]
    pub headers: HeaderVec,
    /// Response body as JSON
    pub body: Value,
}

impl HandlerResponse {
    pub fn new(status: u16, headers: HeaderVec, body: Value) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Create a JSON response with default headers
    pub fn json(status: u16, body: Value) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), "application/json".to_string()));
        Self {
            status,
            headers,
            body,
        }
    }

    /// Create an error response
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(status, serde_json::json!({ "error": message }))
    }

    #[inline]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or update a header
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }
}

/// A request-scoped failure with the status it should be answered with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    pub status: u16,
    pub message: String,
}

impl HandlerError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(500, message)
    }

    pub fn into_response(self) -> HandlerResponse {
        HandlerResponse::error(self.status, &self.message)
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.status)
    }
}

impl std::error::Error for HandlerError {}

/// The handler bound to one operation id.
///
/// Any `Fn(HandlerRequest) -> impl Future<Output = Result<..>>` closure is a
/// handler.
#[async_trait]
pub trait OperationHandler: Send + Sync {
    async fn handle(&self, req: HandlerRequest) -> Result<HandlerResponse, HandlerError>;
}

#[async_trait]
impl<F, Fut> OperationHandler for F
where
    F: Fn(HandlerRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<HandlerResponse, HandlerError>> + Send + 'static,
{
    async fn handle(&self, req: HandlerRequest) -> Result<HandlerResponse, HandlerError> {
        (self)(req).await
    }
}

/// A per-route hook run before the operation handler.
///
/// Plain `Fn(&HandlerRequest) -> Result<(), HandlerError>` closures qualify.
#[async_trait]
pub trait RouteHook: Send + Sync {
    async fn call(&self, req: &HandlerRequest) -> Result<(), HandlerError>;
}

#[async_trait]
impl<F> RouteHook for F
where
    F: Fn(&HandlerRequest) -> Result<(), HandlerError> + Send + Sync,
{
    async fn call(&self, req: &HandlerRequest) -> Result<(), HandlerError> {
        (self)(req)
    }
}

/// A per-route hook run on the response once the route matched, whatever
/// produced it (`onSend`).
///
/// It may rewrite the response in place; an error replaces it.
#[async_trait]
pub trait ResponseHook: Send + Sync {
    async fn call(&self, req: &HandlerRequest, res: &mut HandlerResponse) -> Result<(), HandlerError>;
}

#[async_trait]
impl<F> ResponseHook for F
where
    F: Fn(&HandlerRequest, &mut HandlerResponse) -> Result<(), HandlerError> + Send + Sync,
{
    async fn call(&self, req: &HandlerRequest, res: &mut HandlerResponse) -> Result<(), HandlerError> {
        (self)(req, res)
    }
}

/// Handler answering every request with 500 for an operation that has no
/// implementation.
#[derive(Debug, Clone)]
pub struct NotImplemented {
    operation_id: String,
}

impl NotImplemented {
    pub fn new(operation_id: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
        }
    }
}

#[async_trait]
impl OperationHandler for NotImplemented {
    async fn handle(&self, _req: HandlerRequest) -> Result<HandlerResponse, HandlerError> {
        Err(HandlerError::internal(format!(
            "Operation {} not implemented",
            self.operation_id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let req = HandlerRequest::new(Method::GET, "/").with_header("X-Api-Key", "secret");
        assert_eq!(req.get_header("x-api-key"), Some("secret"));
        assert_eq!(req.get_header("missing"), None);
    }

    #[test]
    fn test_last_query_param_wins() {
        let mut req = HandlerRequest::new(Method::GET, "/");
        req.query_params.push((Arc::from("limit"), "10".into()));
        req.query_params.push((Arc::from("limit"), "20".into()));
        assert_eq!(req.get_query_param("limit"), Some("20"));
    }

    #[test]
    fn test_set_header_replaces() {
        let mut res = HandlerResponse::json(200, json!({}));
        res.set_header("Content-Type", "text/plain".into());
        assert_eq!(res.get_header("content-type"), Some("text/plain"));
        assert_eq!(res.headers.len(), 1);
    }

    #[tokio::test]
    async fn test_closure_is_operation_handler() {
        let handler = |req: HandlerRequest| async move {
            Ok::<_, HandlerError>(HandlerResponse::json(200, json!({ "path": req.path })))
        };
        let res = handler
            .handle(HandlerRequest::new(Method::GET, "/ping"))
            .await
            .unwrap();
        assert_eq!(res.body, json!({"path": "/ping"}));
    }

    #[tokio::test]
    async fn test_not_implemented_reports_operation() {
        let err = NotImplemented::new("getPetById")
            .handle(HandlerRequest::new(Method::GET, "/pet/1"))
            .await
            .unwrap_err();
        assert_eq!(err.status, 500);
        assert_eq!(err.message, "Operation getPetById not implemented");
    }
}
