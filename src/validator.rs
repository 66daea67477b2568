//! # Schema Validator Cache
//!
//! Compiles route schemas once at registration and shares the compiled
//! validators across requests.
//!
//! Keys are `{route}:{location}` where `route` is the host's identifier for a
//! registered route (method plus URL) and `location` is one of `params`,
//! `querystring`, `headers`, `cookies`, `body`, `body:<mime>` or
//! `response:<status>`. Keying by route rather than operation id keeps
//! duplicated operation ids from sharing validators.

use crate::error::GlueError;
use crate::spec::{BodySchema, RouteSchema};
use jsonschema::Validator;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// Validation outcome for one instance: every error message found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub location: String,
    pub errors: Vec<String>,
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.location, self.errors.join(", "))
    }
}

impl std::error::Error for ValidationFailure {}

/// Thread-safe cache of compiled validators.
#[derive(Clone, Default)]
pub struct ValidatorCache {
    cache: Arc<RwLock<HashMap<String, Arc<Validator>>>>,
}

impl ValidatorCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn cache_key(route: &str, location: &str) -> String {
        format!("{route}:{location}")
    }

    /// Get a cached validator or compile and cache a new one.
    pub fn get_or_compile(
        &self,
        route: &str,
        operation_id: &str,
        location: &str,
        schema: &Value,
    ) -> Result<Arc<Validator>, GlueError> {
        let key = Self::cache_key(route, location);
        if let Some(validator) = self.get(route, location) {
            return Ok(validator);
        }

        let compiled = jsonschema::validator_for(schema).map_err(|e| GlueError::SchemaCompile {
            operation_id: operation_id.to_string(),
            location: location.to_string(),
            message: e.to_string(),
        })?;
        let validator = Arc::new(compiled);
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        // another thread may have compiled while we waited
        let cached = Arc::clone(cache.entry(key).or_insert(validator));
        debug!(
            route = route,
            operation_id = operation_id,
            location = location,
            cache_size = cache.len(),
            "Schema validator compiled and cached"
        );
        Ok(cached)
    }

    pub fn get(&self, route: &str, location: &str) -> Option<Arc<Validator>> {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        cache.get(&Self::cache_key(route, location)).map(Arc::clone)
    }

    /// Compile every location of a route schema, returning how many
    /// validators were compiled.
    pub fn precompile(
        &self,
        route: &str,
        operation_id: &str,
        schema: &RouteSchema,
    ) -> Result<usize, GlueError> {
        let mut count = 0;
        let single = [
            ("params", &schema.params),
            ("querystring", &schema.querystring),
            ("headers", &schema.headers),
            ("cookies", &schema.cookies),
        ];
        for (location, value) in single {
            if let Some(value) = value {
                self.get_or_compile(route, operation_id, location, value)?;
                count += 1;
            }
        }
        match &schema.body {
            Some(BodySchema::Single(value)) => {
                self.get_or_compile(route, operation_id, "body", value)?;
                count += 1;
            }
            Some(BodySchema::ByContentType { content }) => {
                for (mime, media) in content {
                    self.get_or_compile(route, operation_id, &format!("body:{mime}"), &media.schema)?;
                    count += 1;
                }
            }
            None => {}
        }
        for (status, value) in &schema.response {
            self.get_or_compile(route, operation_id, &format!("response:{status}"), value)?;
            count += 1;
        }
        info!(
            route = route,
            operation_id = operation_id,
            validators = count,
            "Route schemas compiled"
        );
        Ok(count)
    }

    /// Validate an instance against a cached validator; a location without a
    /// validator accepts anything.
    pub fn validate(&self, route: &str, location: &str, instance: &Value) -> Result<(), ValidationFailure> {
        let Some(validator) = self.get(route, location) else {
            return Ok(());
        };
        let errors: Vec<String> = validator
            .iter_errors(instance)
            .map(|e| e.to_string())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationFailure {
                location: location.to_string(),
                errors,
            })
        }
    }

    /// Number of cached validators.
    pub fn size(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn clear(&self) {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.clear();
        info!("Schema validator cache cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compiles_once_per_route_location() {
        let cache = ValidatorCache::new();
        let schema = json!({"type": "object", "properties": {"id": {"type": "integer"}}});
        let a = cache.get_or_compile("GET /pets/:id", "getPet", "params", &schema).unwrap();
        let b = cache.get_or_compile("GET /pets/:id", "getPet", "params", &schema).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.size(), 1);
        cache.get_or_compile("PUT /pets/:id", "getPet", "params", &schema).unwrap();
        assert_eq!(cache.size(), 2);
    }

    #[test]
    fn test_compile_error_names_operation_and_location() {
        let cache = ValidatorCache::new();
        let err = cache
            .get_or_compile("GET /x", "getX", "body", &json!({"type": 12}))
            .unwrap_err();
        match err {
            GlueError::SchemaCompile {
                operation_id,
                location,
                ..
            } => {
                assert_eq!(operation_id, "getX");
                assert_eq!(location, "body");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_precompile_counts_every_location() {
        let cache = ValidatorCache::new();
        let mut schema = RouteSchema {
            params: Some(json!({"type": "object"})),
            body: Some(BodySchema::Single(json!({"type": "object"}))),
            ..Default::default()
        };
        schema.response.insert("200".into(), json!({"type": "array"}));
        assert_eq!(cache.precompile("POST /pets", "addPet", &schema).unwrap(), 3);
        assert!(cache.get("POST /pets", "response:200").is_some());
    }

    #[test]
    fn test_validate_reports_errors() {
        let cache = ValidatorCache::new();
        let schema = json!({"type": "object", "required": ["name"], "properties": {"name": {"type": "string"}}});
        cache.get_or_compile("POST /pets", "addPet", "body", &schema).unwrap();
        assert!(cache.validate("POST /pets", "body", &json!({"name": "rex"})).is_ok());
        let failure = cache.validate("POST /pets", "body", &json!({"name": 1})).unwrap_err();
        assert_eq!(failure.location, "body");
        assert_eq!(failure.errors.len(), 1);
        assert!(failure.errors[0].contains("string"));
        // unknown location accepts everything
        assert!(cache.validate("POST /pets", "headers", &json!(null)).is_ok());
    }

    #[test]
    fn test_clear_empties_cache() {
        let cache = ValidatorCache::new();
        cache.get_or_compile("GET /", "root", "params", &json!({})).unwrap();
        cache.clear();
        assert_eq!(cache.size(), 0);
    }
}
