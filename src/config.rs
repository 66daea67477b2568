//! Registration options.
//!
//! Options can be built in code, read from a YAML file, and overridden from
//! the environment:
//!
//! | Variable                          | Field               |
//! |-----------------------------------|---------------------|
//! | `OPENAPI_GLUE_PREFIX`             | `prefix`            |
//! | `OPENAPI_GLUE_ADD_EMPTY_SCHEMA`   | `add_empty_schema`  |
//! | `OPENAPI_GLUE_ADD_COOKIE_SCHEMA`  | `add_cookie_schema` |
//! | `OPENAPI_GLUE_CONTENT_TYPE_BODY`  | `content_type_body` |
//!
//! Boolean variables accept `1`, `true`, `yes` and `on` (any case); any other
//! value means `false`.

use crate::spec::BuildOptions;
use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::path::Path;

pub const ENV_PREFIX: &str = "OPENAPI_GLUE_PREFIX";
pub const ENV_ADD_EMPTY_SCHEMA: &str = "OPENAPI_GLUE_ADD_EMPTY_SCHEMA";
pub const ENV_ADD_COOKIE_SCHEMA: &str = "OPENAPI_GLUE_ADD_COOKIE_SCHEMA";
pub const ENV_CONTENT_TYPE_BODY: &str = "OPENAPI_GLUE_CONTENT_TYPE_BODY";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GlueOptions {
    /// Route prefix; overrides `basePath` / the first server URL
    pub prefix: Option<String>,
    /// Emit `{}` for responses without a body schema
    pub add_empty_schema: bool,
    /// Keep v3 cookie parameters as a `cookies` schema
    pub add_cookie_schema: bool,
    /// Keep every v3 request media type in the body schema
    pub content_type_body: bool,
}

impl GlueOptions {
    /// Load options from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read options file {}", path.display()))?;
        let options = serde_yaml::from_str(&content)
            .with_context(|| format!("invalid options file {}", path.display()))?;
        Ok(options)
    }

    /// Apply environment overrides.
    pub fn with_env(self) -> Self {
        self.with_overrides(|name| env::var(name).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(prefix) = lookup(ENV_PREFIX) {
            self.prefix = if prefix.is_empty() { None } else { Some(prefix) };
        }
        if let Some(v) = lookup(ENV_ADD_EMPTY_SCHEMA) {
            self.add_empty_schema = parse_flag(&v);
        }
        if let Some(v) = lookup(ENV_ADD_COOKIE_SCHEMA) {
            self.add_cookie_schema = parse_flag(&v);
        }
        if let Some(v) = lookup(ENV_CONTENT_TYPE_BODY) {
            self.content_type_body = parse_flag(&v);
        }
        self
    }

    /// The subset that shapes route schemas.
    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            add_empty_schema: self.add_empty_schema,
            add_cookie_schema: self.add_cookie_schema,
            content_type_body: self.content_type_body,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
