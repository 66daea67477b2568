//! Binding routes to operation handlers.
//!
//! Handlers come from exactly one of two sources: a [`ServiceHandlers`]
//! dispatch table keyed by operation id, or an [`OperationResolver`] called
//! once per route. Operations without a handler are bound to
//! [`NotImplemented`], which fails each request with a 500 naming the
//! operation.

use crate::dispatcher::{NotImplemented, OperationHandler, ResponseHook, RouteHook};
use crate::error::GlueError;
use crate::spec::Route;
use http::Method;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Operation id to handler dispatch table.
#[derive(Clone, Default)]
pub struct ServiceHandlers {
    handlers: HashMap<String, Arc<dyn OperationHandler>>,
}

impl ServiceHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler of an operation; a later call for the same id
    /// replaces the earlier one.
    pub fn operation(
        mut self,
        operation_id: impl Into<String>,
        handler: impl OperationHandler + 'static,
    ) -> Self {
        self.handlers.insert(operation_id.into(), Arc::new(handler));
        self
    }

    pub fn get(&self, operation_id: &str) -> Option<Arc<dyn OperationHandler>> {
        self.handlers.get(operation_id).map(Arc::clone)
    }

    pub fn contains(&self, operation_id: &str) -> bool {
        self.handlers.contains_key(operation_id)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for ServiceHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.handlers.keys().collect();
        ids.sort();
        f.debug_struct("ServiceHandlers").field("operations", &ids).finish()
    }
}

/// What an [`OperationResolver`] returns for one route.
#[derive(Clone)]
pub struct ResolvedOperation {
    pub handler: Arc<dyn OperationHandler>,
    pub pre_handler: Option<Arc<dyn RouteHook>>,
    pub on_send: Option<Arc<dyn ResponseHook>>,
    /// Merged over the route's `x-glue-config`
    pub config: Option<Value>,
}

impl ResolvedOperation {
    pub fn new(handler: impl OperationHandler + 'static) -> Self {
        Self {
            handler: Arc::new(handler),
            pre_handler: None,
            on_send: None,
            config: None,
        }
    }

    pub fn with_pre_handler(mut self, hook: impl RouteHook + 'static) -> Self {
        self.pre_handler = Some(Arc::new(hook));
        self
    }

    pub fn with_on_send(mut self, hook: impl ResponseHook + 'static) -> Self {
        self.on_send = Some(Arc::new(hook));
        self
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = Some(config);
        self
    }
}

type ResolverFn = dyn Fn(&str, &Method, &str) -> Option<ResolvedOperation> + Send + Sync;

/// Per-route handler factory, called with `(operation_id, method, openapi_path)`.
#[derive(Clone)]
pub struct OperationResolver(Arc<ResolverFn>);

impl OperationResolver {
    pub fn new(
        resolve: impl Fn(&str, &Method, &str) -> Option<ResolvedOperation> + Send + Sync + 'static,
    ) -> Self {
        Self(Arc::new(resolve))
    }

    pub fn resolve(&self, operation_id: &str, method: &Method, path: &str) -> Option<ResolvedOperation> {
        (self.0)(operation_id, method, path)
    }
}

impl fmt::Debug for OperationResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OperationResolver")
    }
}

/// Exactly one handler source.
#[derive(Debug, Clone)]
pub enum HandlerSource {
    Service(ServiceHandlers),
    Resolver(OperationResolver),
}

/// Handler, hooks and config wired for one route.
#[derive(Clone)]
pub struct BoundOperation {
    pub handler: Arc<dyn OperationHandler>,
    pub pre_handler: Option<Arc<dyn RouteHook>>,
    pub on_send: Option<Arc<dyn ResponseHook>>,
    pub config: Option<Value>,
    /// `false` when the not-implemented fallback was bound
    pub implemented: bool,
}

impl HandlerSource {
    /// Check that exactly one source was supplied.
    pub fn from_parts(
        service: Option<ServiceHandlers>,
        resolver: Option<OperationResolver>,
    ) -> Result<Self, GlueError> {
        match (service, resolver) {
            (Some(_), Some(_)) => Err(GlueError::HandlerConfiguration(
                "'serviceHandlers' and 'operationResolver' are mutually exclusive".to_string(),
            )),
            (None, None) => Err(GlueError::HandlerConfiguration(
                "either 'serviceHandlers' or 'operationResolver' are required".to_string(),
            )),
            (Some(service), None) => Ok(HandlerSource::Service(service)),
            (None, Some(resolver)) => Ok(HandlerSource::Resolver(resolver)),
        }
    }

    /// Wire the handler for a route, falling back to [`NotImplemented`].
    pub fn bind(&self, route: &Route) -> BoundOperation {
        let resolved = match self {
            HandlerSource::Service(service) => match service.get(&route.operation_id) {
                Some(handler) => Some(ResolvedOperation {
                    handler,
                    pre_handler: None,
                    on_send: None,
                    config: None,
                }),
                None => {
                    debug!("serviceHandlers has no operation {}", route.operation_id);
                    None
                }
            },
            HandlerSource::Resolver(resolver) => {
                let resolved =
                    resolver.resolve(&route.operation_id, &route.method, &route.openapi_path);
                if resolved.is_none() {
                    debug!("operationResolver has no handler for {}", route.operation_id);
                }
                resolved
            }
        };

        match resolved {
            Some(op) => BoundOperation {
                handler: op.handler,
                pre_handler: op.pre_handler,
                on_send: op.on_send,
                config: merge_config(route.config.clone(), op.config),
                implemented: true,
            },
            None => BoundOperation {
                handler: Arc::new(NotImplemented::new(route.operation_id.clone())),
                pre_handler: None,
                on_send: None,
                config: route.config.clone(),
                implemented: false,
            },
        }
    }
}

/// Resolver config over route config; objects merge key by key.
fn merge_config(route: Option<Value>, resolved: Option<Value>) -> Option<Value> {
    match (route, resolved) {
        (Some(Value::Object(mut base)), Some(Value::Object(over))) => {
            base.extend(over);
            Some(Value::Object(base))
        }
        (base, None) => base,
        (_, over) => over,
    }
}
