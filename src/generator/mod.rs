//! # Generator Module
//!
//! Scaffolds a service skeleton from an OpenAPI specification.
//!
//! ## Generated Structure
//!
//! ```text
//! generated-project/
//! ├── Cargo.toml              # Depends on openapi-glue (registry or local path)
//! ├── openapi.json            # The specification as supplied
//! ├── src/
//! │   ├── lib.rs              # Registration entrypoint
//! │   ├── main.rs             # Registers with a RouteTable and lists the routes
//! │   ├── service.rs          # One stub per operation id
//! │   └── security.rs         # One stub per security scheme, plus `initialize`
//! └── tests/
//!     └── service.rs          # Checks every operation is registered
//! ```
//!
//! `security.rs` is only generated when the document declares security schemes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use openapi_glue::generator::{ProjectScaffolder, ScaffoldOptions};
//!
//! let scaffolder = ProjectScaffolder::new("openapi.yaml", ScaffoldOptions::default())?;
//! let dir = scaffolder.write()?;
//! ```
//!
//! Templates live in `templates/` and are compiled in by Askama.

mod project;
mod templates;
#[cfg(test)]
mod tests;

pub use project::*;
pub use templates::{
    describe_route, operation_stubs, rust_ident, scheme_stubs, unique_ident, OperationStub,
    SchemeStub,
};
