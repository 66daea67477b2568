//! Registration entrypoint.
//!
//! [`OpenApiGlue`] collects the specification, options and handler tables,
//! then [`OpenApiGlue::register`] parses the document, binds every route to
//! its handler and security chain, and hands the routes to the host.
//!
//! ```no_run
//! use openapi_glue::{GlueOptions, OpenApiGlue, RouteTable, ServiceHandlers};
//!
//! let mut host = RouteTable::new();
//! let registration = OpenApiGlue::new("openapi.yaml")
//!     .options(GlueOptions::default().with_env())
//!     .service_handlers(ServiceHandlers::new())
//!     .register(&mut host)?;
//! println!("{} routes", registration.routes.len());
//! # Ok::<(), openapi_glue::GlueError>(())
//! ```

use crate::binder::{HandlerSource, OperationResolver, ServiceHandlers};
use crate::config::GlueOptions;
use crate::error::GlueError;
use crate::host::{RouteOptions, RouteRegistrar};
use crate::security::{SecurityChainBuilder, SecurityHandlers};
use crate::spec::{self, normalize_prefix, ParsedSpec, SpecSource, SpecVersion};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// Builder for one registration.
#[derive(Debug, Clone)]
pub struct OpenApiGlue {
    specification: SpecSource,
    options: GlueOptions,
    service_handlers: Option<ServiceHandlers>,
    operation_resolver: Option<OperationResolver>,
    security_handlers: Option<SecurityHandlers>,
}

/// Summary of one registered route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredRoute {
    pub operation_id: String,
    pub method: String,
    /// Prefix included
    pub url: String,
    /// `false` when the route answers 500 "not implemented"
    pub implemented: bool,
    pub secured: bool,
}

/// What [`OpenApiGlue::register`] did.
#[derive(Debug, Clone)]
pub struct Registration {
    pub version: SpecVersion,
    pub prefix: Option<String>,
    pub routes: Vec<RegisteredRoute>,
    pub missing_security_handlers: Vec<String>,
    pub missing_content_type_parsers: Vec<String>,
    pub duplicate_operation_ids: Vec<String>,
    /// The specification as supplied, before any reference handling
    pub original: Arc<Value>,
}

impl Registration {
    pub fn route(&self, operation_id: &str) -> Option<&RegisteredRoute> {
        self.routes.iter().find(|r| r.operation_id == operation_id)
    }
}

impl OpenApiGlue {
    pub fn new(specification: impl Into<SpecSource>) -> Self {
        Self {
            specification: specification.into(),
            options: GlueOptions::default(),
            service_handlers: None,
            operation_resolver: None,
            security_handlers: None,
        }
    }

    pub fn options(mut self, options: GlueOptions) -> Self {
        self.options = options;
        self
    }

    /// Shorthand for setting [`GlueOptions::prefix`].
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.options.prefix = Some(prefix.into());
        self
    }

    pub fn service_handlers(mut self, handlers: ServiceHandlers) -> Self {
        self.service_handlers = Some(handlers);
        self
    }

    pub fn operation_resolver(mut self, resolver: OperationResolver) -> Self {
        self.operation_resolver = Some(resolver);
        self
    }

    pub fn security_handlers(mut self, handlers: SecurityHandlers) -> Self {
        self.security_handlers = Some(handlers);
        self
    }

    /// Parse the specification with the configured options.
    pub fn parse(&self) -> Result<ParsedSpec, GlueError> {
        spec::parse(self.specification.clone(), &self.options.build_options())
    }

    /// Register every route with the host.
    ///
    /// Configuration and specification errors abort before the first route
    /// reaches the host. A host error aborts the remaining registrations.
    pub fn register<R: RouteRegistrar + ?Sized>(self, host: &mut R) -> Result<Registration, GlueError> {
        let source = HandlerSource::from_parts(self.service_handlers.clone(), self.operation_resolver.clone())?;
        let parsed = self.parse()?;

        let missing_content_type_parsers: Vec<String> = parsed
            .content_types
            .iter()
            .filter(|ct| !host.has_content_type_parser(ct))
            .cloned()
            .collect();
        for content_type in &missing_content_type_parsers {
            warn!("ContentTypeParser for '{}' not found", content_type);
        }

        let mut chains = self.security_handlers.map(|handlers| {
            handlers.initialize(&parsed.security_schemes);
            SecurityChainBuilder::new(handlers)
        });

        let prefix = match &self.options.prefix {
            Some(prefix) => normalize_prefix(prefix),
            None => parsed.prefix.clone(),
        };

        let mut routes = Vec::with_capacity(parsed.routes.len());
        for route in parsed.routes {
            let bound = source.bind(&route);
            let security_chain = chains.as_mut().and_then(|b| b.add(&route.security));
            let options = RouteOptions {
                method: route.method,
                url: route.url,
                prefix: prefix.clone(),
                schema: route.schema,
                operation_id: route.operation_id,
                openapi_path: route.openapi_path,
                openapi_source: route.openapi_source,
                parameters: route.parameters,
                security: route.security,
                config: bound.config,
                handler: bound.handler,
                pre_handler: bound.pre_handler,
                on_send: bound.on_send,
                security_chain,
            };
            let summary = RegisteredRoute {
                operation_id: options.operation_id.clone(),
                method: options.method.to_string(),
                url: options.full_url(),
                implemented: bound.implemented,
                secured: options.security_chain.is_some(),
            };
            host.route(options)?;
            routes.push(summary);
        }

        let missing_security_handlers = chains
            .as_ref()
            .map(|b| b.missing_handlers().to_vec())
            .unwrap_or_default();
        for name in &missing_security_handlers {
            warn!("Security handler for '{}' not found", name);
        }

        info!(
            version = %parsed.version,
            routes = routes.len(),
            prefix = prefix.as_deref().unwrap_or(""),
            not_implemented = routes.iter().filter(|r| !r.implemented).count(),
            "Specification registered"
        );

        Ok(Registration {
            version: parsed.version,
            prefix,
            routes,
            missing_security_handlers,
            missing_content_type_parsers,
            duplicate_operation_ids: parsed.duplicate_operation_ids,
            original: parsed.original,
        })
    }
}
