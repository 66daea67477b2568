//! Specification loading and route model construction.
//!
//! Pipeline: [`parse`] reads the document, [`check_specification`] classifies
//! and validates the envelope, [`RefResolver`] loads referenced documents and
//! checks every `$ref`, the version's [`RouteModelBuilder`] walks `paths`, and
//! [`CycleBreaker`] materializes each schema root.

mod build;
mod cycles;
mod load;
mod naming;
mod refs;
mod types;
mod v2;
mod v3;
mod version;

pub use build::{build_spec, BuildOptions, RouteModelBuilder, CONFIG_EXTENSION, SKIP_EXTENSION};
pub(crate) use build::normalize_prefix;
pub use cycles::{reference_to, CycleBreaker, RECURSIVE_SCHEMA_ID};
pub use load::{parse, read_document, SpecSource};
pub use naming::{make_operation_id, make_url};
pub use refs::{escape_pointer_token, Located, NodeLocation, RefResolver, INLINE_DOCUMENT_URI};
pub use types::*;
pub use v2::V2Builder;
pub use v3::V3Builder;
pub use version::{check_specification, detect_version, validate_envelope};
