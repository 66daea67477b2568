//! # openapi-glue
//!
//! **openapi-glue** binds an OpenAPI 2.0 (Swagger), 3.0.x or 3.1.x
//! specification to a host router: every operation becomes a route with a
//! validation schema, a handler and, when the operation is secured, a
//! composite security check.
//!
//! ## Architecture
//!
//! - **[`spec`]** - version detection, `$ref` resolution, cycle breaking and
//!   the v2/v3 route model builders
//! - **[`binder`]** - binds operation ids to handlers from a dispatch table
//!   or a per-route resolver
//! - **[`security`]** - security handlers and the per-requirement chains
//! - **[`host`]** - the [`RouteRegistrar`] contract and the in-memory
//!   [`RouteTable`] host
//! - **[`validator`]** - compiled JSON Schema validators per route location
//! - **[`plugin`]** - the [`OpenApiGlue`] registration entrypoint
//! - **[`generator`]** and **[`cli`]** - the `openapi-glue-gen` scaffolder
//! - **[`config`]**, **[`logging`]**, **[`error`]** - options, tracing setup
//!   and setup-time errors
//!
//! ## Registration Flow
//!
//! ```text
//! specification ─► spec::parse ─► ParsedSpec { routes, security_schemes, .. }
//!                                     │
//!        HandlerSource::bind ◄────────┤
//!   SecurityChainBuilder::add ◄───────┤
//!                                     ▼
//!                        RouteRegistrar::route(RouteOptions)
//! ```
//!
//! Specification and configuration errors abort registration before the
//! first route reaches the host. Missing operation handlers and missing
//! security handlers only fail the requests that reach them.
//!
//! ## Quick Start
//!
//! ```rust
//! use openapi_glue::{HandlerError, HandlerRequest, HandlerResponse, OpenApiGlue, RouteTable, ServiceHandlers};
//! use serde_json::json;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let spec = json!({
//!     "openapi": "3.0.3",
//!     "info": {"title": "Ping", "version": "1"},
//!     "paths": {"/ping": {"get": {"operationId": "ping", "responses": {"200": {"description": "pong"}}}}}
//! });
//! let handlers = ServiceHandlers::new().operation("ping", |_req: HandlerRequest| async {
//!     Ok::<_, HandlerError>(HandlerResponse::json(200, json!({"pong": true})))
//! });
//!
//! let mut host = RouteTable::new();
//! OpenApiGlue::new(spec).service_handlers(handlers).register(&mut host).unwrap();
//!
//! let res = host.dispatch(HandlerRequest::new(http::Method::GET, "/ping")).await;
//! assert_eq!(res.status, 200);
//! # });
//! ```

pub mod binder;
pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod generator;
pub mod host;
pub mod logging;
pub mod plugin;
pub mod security;
pub mod spec;
pub mod validator;

pub use binder::{BoundOperation, HandlerSource, OperationResolver, ResolvedOperation, ServiceHandlers};
pub use config::GlueOptions;
pub use dispatcher::{
    HandlerError, HandlerRequest, HandlerResponse, OperationHandler, ResponseHook, RouteHook,
};
pub use error::{GlueError, INVALID_SPECIFICATION};
pub use host::{RouteOptions, RouteRegistrar, RouteTable};
pub use logging::{init_logging, LogConfig, LogFormat};
pub use plugin::{OpenApiGlue, RegisteredRoute, Registration};
pub use security::{
    Scoped, SecurityChain, SecurityChainBuilder, SecurityError, SecurityFailure, SecurityHandler,
    SecurityHandlers,
};
pub use spec::{
    make_operation_id, make_url, parse, ParsedSpec, Route, RouteSchema, SecurityRequirement,
    SecuritySchemes, SpecSource, SpecVersion,
};
pub use validator::{ValidationFailure, ValidatorCache};
