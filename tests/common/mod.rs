#![allow(dead_code)]

use openapi_glue::{HandlerError, HandlerRequest, HandlerResponse};
use serde_json::json;
use std::path::PathBuf;

/// Absolute path of a file under `tests/fixtures`.
pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Handler echoing the routed operation id and the path parameters.
pub async fn echo(req: HandlerRequest) -> Result<HandlerResponse, HandlerError> {
    Ok(HandlerResponse::json(
        200,
        json!({
            "operationId": req.operation_id,
            "params": req.path_params_map(),
            "config": req.config,
        }),
    ))
}
