//! Materialization of route schemas with recursion removed.
//!
//! Route schemas produced by the builders still point into the source
//! documents through `$ref`. Each schema root is expanded here into an owned
//! tree. Identity is the node's [`NodeLocation`]: the first time a document
//! node is reached it is copied in place and its output path recorded; any
//! later arrival at the same node within the same root becomes
//! `{"$ref": "#/<first path>"}`. Roots that received such a reference get
//! [`RECURSIVE_SCHEMA_ID`] as `$id` unless they already carry one, and lose
//! every nested `$id`: the repair pointers are relative to the root, so a
//! nested base URI would send the ones beneath it elsewhere.

use super::refs::{escape_pointer_token, Located, NodeLocation, RefResolver};
use super::types::{BodySchema, RouteSchema};
use crate::error::GlueError;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Document identifier attached to roots that contain repaired references.
pub const RECURSIVE_SCHEMA_ID: &str = "http://example.com/openapi-glue";

/// `$ref` siblings that replace the target's value instead of yielding to it.
const OVERRIDING_SIBLINGS: [&str; 2] = ["summary", "description"];

/// Keywords holding instance data rather than subschemas.
const DATA_KEYWORDS: [&str; 5] = ["const", "default", "enum", "example", "examples"];

/// Walks schema roots, expanding references and breaking repeats.
pub struct CycleBreaker<'r> {
    resolver: &'r RefResolver,
}

struct RootWalk {
    seen: HashMap<NodeLocation, String>,
    ref_added: bool,
}

impl<'r> CycleBreaker<'r> {
    pub fn new(resolver: &'r RefResolver) -> Self {
        Self { resolver }
    }

    /// Process every root of a route schema record.
    ///
    /// `response` is walked per status code, a content-typed body per media
    /// type, every other location as a single root.
    pub fn remove_recursion(&self, schema: &mut RouteSchema) -> Result<(), GlueError> {
        for slot in [
            &mut schema.params,
            &mut schema.querystring,
            &mut schema.headers,
            &mut schema.cookies,
        ]
        .into_iter()
        .flatten()
        {
            *slot = self.process_root(slot)?;
        }
        match &mut schema.body {
            Some(BodySchema::Single(root)) => *root = self.process_root(root)?,
            Some(BodySchema::ByContentType { content }) => {
                for media in content.values_mut() {
                    media.schema = self.process_root(&media.schema)?;
                }
            }
            None => {}
        }
        for root in schema.response.values_mut() {
            *root = self.process_root(root)?;
        }
        Ok(())
    }

    /// Expand one root. The input may mix synthesized nodes with `$ref`s into
    /// the resolver's documents; references are absolute (`doc#pointer`).
    pub fn process_root(&self, root: &Value) -> Result<Value, GlueError> {
        let mut walk = RootWalk {
            seen: HashMap::new(),
            ref_added: false,
        };
        let mut out = self.inspect(root, None, "#", &mut walk)?;
        if walk.ref_added {
            if let Value::Object(map) = &mut out {
                for (key, child) in map.iter_mut() {
                    if !DATA_KEYWORDS.contains(&key.as_str()) {
                        strip_ids(child);
                    }
                }
                map.entry("$id")
                    .or_insert_with(|| Value::String(RECURSIVE_SCHEMA_ID.to_string()));
            }
        }
        Ok(out)
    }

    /// Expand a document node.
    pub fn process_located(&self, node: Located<'_>) -> Result<Value, GlueError> {
        let placeholder = reference_to(&node.location);
        self.process_root(&placeholder)
    }

    fn inspect(
        &self,
        value: &Value,
        location: Option<&NodeLocation>,
        path: &str,
        walk: &mut RootWalk,
    ) -> Result<Value, GlueError> {
        match value {
            Value::Object(map) => {
                if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                    return self.inspect_ref(map, reference, location, path, walk);
                }
                if let Some(loc) = location {
                    if let Some(first) = walk.seen.get(loc) {
                        walk.ref_added = true;
                        return Ok(pointer_ref(first));
                    }
                    walk.seen.insert(loc.clone(), path.to_string());
                }
                let mut out = Map::with_capacity(map.len());
                for (key, child) in map {
                    let child_loc = location.map(|l| l.child(key));
                    let child_path = format!("{path}/{}", escape_pointer_token(key));
                    let expanded = self.inspect(child, child_loc.as_ref(), &child_path, walk)?;
                    out.insert(key.clone(), expanded);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => {
                if let Some(loc) = location {
                    if let Some(first) = walk.seen.get(loc) {
                        walk.ref_added = true;
                        return Ok(pointer_ref(first));
                    }
                    walk.seen.insert(loc.clone(), path.to_string());
                }
                let mut out = Vec::with_capacity(items.len());
                for (i, child) in items.iter().enumerate() {
                    let child_loc = location.map(|l| l.index(i));
                    let child_path = format!("{path}/{i}");
                    out.push(self.inspect(child, child_loc.as_ref(), &child_path, walk)?);
                }
                Ok(Value::Array(out))
            }
            other => Ok(other.clone()),
        }
    }

    fn inspect_ref(
        &self,
        map: &Map<String, Value>,
        reference: &str,
        location: Option<&NodeLocation>,
        path: &str,
        walk: &mut RootWalk,
    ) -> Result<Value, GlueError> {
        let from = match location {
            Some(loc) => loc.clone(),
            None => self.resolver.root().location,
        };
        let start = self.resolver.resolve(&from, reference)?;
        let target = self.resolver.deref(start)?;
        let mut expanded = self.inspect(target.value, Some(&target.location), path, walk)?;

        // siblings of `$ref` survive when the target does not define them;
        // annotations always replace the target's
        if map.len() > 1 {
            if let Value::Object(out) = &mut expanded {
                for (key, sibling) in map {
                    let overrides = OVERRIDING_SIBLINGS.contains(&key.as_str());
                    if key == "$ref" || (out.contains_key(key) && !overrides) {
                        continue;
                    }
                    let child_loc = location.map(|l| l.child(key));
                    let child_path = format!("{path}/{}", escape_pointer_token(key));
                    let value = self.inspect(sibling, child_loc.as_ref(), &child_path, walk)?;
                    out.insert(key.clone(), value);
                }
            }
        }
        Ok(expanded)
    }
}

/// `{"$ref": "<doc>#<pointer>"}` for a document node.
pub fn reference_to(location: &NodeLocation) -> Value {
    let mut map = Map::new();
    map.insert("$ref".to_string(), Value::String(location.to_ref()));
    Value::Object(map)
}

/// Drop `$id` from `value` and every schema below it.
fn strip_ids(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if map.get("$id").is_some_and(Value::is_string) {
                map.shift_remove("$id");
            }
            for (key, child) in map.iter_mut() {
                if !DATA_KEYWORDS.contains(&key.as_str()) {
                    strip_ids(child);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(strip_ids),
        _ => {}
    }
}

fn pointer_ref(path: &str) -> Value {
    let mut map = Map::new();
    map.insert("$ref".to_string(), Value::String(path.to_string()));
    Value::Object(map)
}
