//! # Dispatcher Module
//!
//! Request and response types shared by the host, the security chain and the
//! operation handlers, plus the handler traits the binder dispatches through.
//!
//! Handlers are plain async closures:
//!
//! ```rust
//! use openapi_glue::dispatcher::{HandlerError, HandlerRequest, HandlerResponse, OperationHandler};
//! use serde_json::json;
//!
//! let get_pet = |req: HandlerRequest| async move {
//!     let id = req.get_path_param("petId").unwrap_or_default().to_string();
//!     Ok::<_, HandlerError>(HandlerResponse::json(200, json!({ "id": id })))
//! };
//! # fn assert_handler(_: &impl OperationHandler) {}
//! # assert_handler(&get_pet);
//! ```

mod core;

pub use core::{
    HandlerError, HandlerRequest, HandlerResponse, HeaderVec, NotImplemented, OperationHandler,
    ParamVec, ResponseHook, RouteHook, MAX_INLINE_HEADERS, MAX_INLINE_PARAMS,
};
