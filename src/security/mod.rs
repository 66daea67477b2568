//! # Security Module
//!
//! User-supplied authentication handlers keyed by security scheme name, and
//! the composite chain built per route from the route's requirement list.
//!
//! ## Handlers
//!
//! A handler inspects the request and either accepts it or returns a
//! [`SecurityFailure`]. Synchronous closures are handlers; wrap one in
//! [`Scoped`] to see the scopes the route requires, or implement
//! [`SecurityHandler`] directly when the check needs to await.
//!
//! ```rust
//! use openapi_glue::security::{SecurityFailure, SecurityHandlers};
//! use openapi_glue::dispatcher::HandlerRequest;
//!
//! let handlers = SecurityHandlers::new()
//!     .scheme("api_key", |req: &HandlerRequest| match req.get_header("api_key") {
//!         Some("letmein") => Ok(()),
//!         _ => Err(SecurityFailure::new("invalid api key")),
//!     })
//!     .on_initialize(|schemes| {
//!         println!("{} security schemes declared", schemes.len());
//!     });
//! assert!(handlers.contains("api_key"));
//! ```
//!
//! ## Evaluation
//!
//! See [`SecurityChain::authenticate`]: alternatives are tried in declared
//! order and the first accepting scheme admits the request. When every
//! scheme rejects, the request fails with a [`SecurityError`] whose status is
//! the last explicit one reported (401 otherwise).

mod chain;

pub use chain::{SecurityChain, SecurityChainBuilder};

use crate::dispatcher::HandlerRequest;
use crate::spec::SecuritySchemes;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Status used when no failing scheme chose one.
pub const DEFAULT_FAILURE_STATUS: u16 = 401;

/// Why one scheme rejected a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityFailure {
    pub message: String,
    #[serde(rename = "statusCode", skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl SecurityFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: None,
        }
    }

    /// Ask for a specific response status if the whole chain fails.
    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }
}

impl fmt::Display for SecurityFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for SecurityFailure {}

/// Authentication failure for a whole route: every scheme rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityError {
    pub message: String,
    /// Scheme names in the order they were attempted
    pub failed_schemes: Vec<String>,
    /// One entry per failed scheme
    pub causes: Vec<SecurityFailure>,
    pub status_code: u16,
}

impl SecurityError {
    pub fn new(failed_schemes: Vec<String>, causes: Vec<SecurityFailure>, status_code: u16) -> Self {
        let message = format!(
            "None of the security schemes ({}) successfully authenticated this request.",
            failed_schemes.join(", ")
        );
        Self {
            message,
            failed_schemes,
            causes,
            status_code,
        }
    }
}

impl fmt::Display for SecurityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for SecurityError {}

/// One security scheme's check.
#[async_trait]
pub trait SecurityHandler: Send + Sync {
    /// `scopes` are the ones the route's requirement declares for this scheme.
    async fn authenticate(&self, req: &HandlerRequest, scopes: &[String]) -> Result<(), SecurityFailure>;
}

#[async_trait]
impl<F> SecurityHandler for F
where
    F: Fn(&HandlerRequest) -> Result<(), SecurityFailure> + Send + Sync,
{
    async fn authenticate(&self, req: &HandlerRequest, _scopes: &[String]) -> Result<(), SecurityFailure> {
        (self)(req)
    }
}

/// Adapter for closures that also inspect the required scopes.
///
/// ```rust
/// use openapi_glue::security::{Scoped, SecurityFailure, SecurityHandlers};
/// use openapi_glue::dispatcher::HandlerRequest;
///
/// let handlers = SecurityHandlers::new().scheme(
///     "petstore_auth",
///     Scoped(|_: &HandlerRequest, scopes: &[String]| {
///         if scopes.iter().any(|s| s == "write:pets") {
///             return Err(SecurityFailure::new("read only token").with_status(403));
///         }
///         Ok(())
///     }),
/// );
/// assert!(handlers.contains("petstore_auth"));
/// ```
#[derive(Clone, Copy)]
pub struct Scoped<F>(pub F);

#[async_trait]
impl<F> SecurityHandler for Scoped<F>
where
    F: Fn(&HandlerRequest, &[String]) -> Result<(), SecurityFailure> + Send + Sync,
{
    async fn authenticate(&self, req: &HandlerRequest, scopes: &[String]) -> Result<(), SecurityFailure> {
        (self.0)(req, scopes)
    }
}

type InitializeHook = Arc<dyn Fn(&SecuritySchemes) + Send + Sync>;

/// Security handlers by scheme name, plus the optional `initialize` hook
/// that receives the declared scheme table once at setup.
#[derive(Clone, Default)]
pub struct SecurityHandlers {
    handlers: IndexMap<String, Arc<dyn SecurityHandler>>,
    initialize: Option<InitializeHook>,
}

impl SecurityHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for a scheme name; a later call replaces it.
    pub fn scheme(mut self, name: impl Into<String>, handler: impl SecurityHandler + 'static) -> Self {
        self.handlers.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn on_initialize(mut self, hook: impl Fn(&SecuritySchemes) + Send + Sync + 'static) -> Self {
        self.initialize = Some(Arc::new(hook));
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SecurityHandler>> {
        self.handlers.get(name).map(Arc::clone)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the `initialize` hook, if any.
    pub fn initialize(&self, schemes: &SecuritySchemes) {
        if let Some(hook) = &self.initialize {
            hook(schemes);
        }
    }
}

impl fmt::Debug for SecurityHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityHandlers")
            .field("schemes", &self.handlers.keys().collect::<Vec<_>>())
            .field("initialize", &self.initialize.is_some())
            .finish()
    }
}
