//! `$ref` resolution over a set of loaded documents.
//!
//! The resolver never rewrites a document. Callers look through references
//! with [`RefResolver::deref`] and address nodes by [`NodeLocation`], which is
//! also the identity the cycle breaker uses.

use super::load::read_document;
use crate::error::GlueError;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Longest `$ref` → `$ref` chain followed before declaring a loop.
const MAX_REF_CHAIN: usize = 64;

/// Base URI given to documents that were not read from disk.
pub const INLINE_DOCUMENT_URI: &str = "memory:///specification";

/// Escape one JSON Pointer reference token (`~` → `~0`, `/` → `~1`).
pub fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Where a node lives: document URI plus JSON Pointer inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeLocation {
    pub document: Arc<str>,
    pub pointer: String,
}

impl NodeLocation {
    pub fn child(&self, key: &str) -> NodeLocation {
        NodeLocation {
            document: Arc::clone(&self.document),
            pointer: format!("{}/{}", self.pointer, escape_pointer_token(key)),
        }
    }

    pub fn index(&self, i: usize) -> NodeLocation {
        NodeLocation {
            document: Arc::clone(&self.document),
            pointer: format!("{}/{}", self.pointer, i),
        }
    }

    /// Absolute reference string, `document#pointer`.
    pub fn to_ref(&self) -> String {
        format!("{}#{}", self.document, self.pointer)
    }
}

/// A borrowed node together with its location.
#[derive(Debug, Clone)]
pub struct Located<'a> {
    pub location: NodeLocation,
    pub value: &'a Value,
}

impl<'a> Located<'a> {
    pub fn get(&self, key: &str) -> Option<Located<'a>> {
        self.value.get(key).map(|value| Located {
            location: self.location.child(key),
            value,
        })
    }

    /// Object entries in document order; empty for non-objects.
    pub fn entries(&self) -> Vec<(&'a str, Located<'a>)> {
        match self.value {
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| {
                    (
                        k.as_str(),
                        Located {
                            location: self.location.child(k),
                            value: v,
                        },
                    )
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Array items; empty for non-arrays.
    pub fn items(&self) -> Vec<Located<'a>> {
        match self.value {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| Located {
                    location: self.location.index(i),
                    value: v,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn str_field(&self, key: &str) -> Option<&'a str> {
        self.value.get(key).and_then(Value::as_str)
    }

    pub fn bool_field(&self, key: &str) -> Option<bool> {
        self.value.get(key).and_then(Value::as_bool)
    }
}

fn ref_target(value: &Value) -> Option<&str> {
    value.as_object()?.get("$ref")?.as_str()
}

/// Every loaded document, keyed by URI without fragment.
#[derive(Debug, Clone)]
pub struct RefResolver {
    root: Arc<str>,
    documents: HashMap<Arc<str>, Arc<Value>>,
}

impl RefResolver {
    /// Load the documents reachable from `root` and check every reference.
    ///
    /// Relative document references are read from disk when the base is a
    /// `file:` URL. An unreadable document, a dangling pointer or a pure
    /// `$ref` loop fails with [`GlueError::SpecificationInvalid`].
    pub fn new(root: Value, base: Option<Url>) -> Result<Self, GlueError> {
        let base = match base {
            Some(url) => url,
            None => Url::parse(INLINE_DOCUMENT_URI).map_err(|_| GlueError::SpecificationInvalid)?,
        };
        let root_key: Arc<str> = Arc::from(strip_fragment(&base).as_str());
        let mut documents: HashMap<Arc<str>, Arc<Value>> = HashMap::new();
        documents.insert(Arc::clone(&root_key), Arc::new(root));

        let mut queue = VecDeque::from([Arc::clone(&root_key)]);
        let mut scanned = HashSet::new();
        while let Some(doc_key) = queue.pop_front() {
            if !scanned.insert(Arc::clone(&doc_key)) {
                continue;
            }
            let doc = match documents.get(&doc_key) {
                Some(d) => Arc::clone(d),
                None => continue,
            };
            let mut refs = Vec::new();
            collect_refs(&doc, &mut refs);
            for reference in refs {
                let target = document_part(&doc_key, &reference)?;
                if documents.contains_key(target.as_str()) {
                    continue;
                }
                let loaded = load_external(&target)?;
                let key: Arc<str> = Arc::from(target.as_str());
                documents.insert(Arc::clone(&key), Arc::new(loaded));
                queue.push_back(key);
            }
        }

        let resolver = Self {
            root: root_key,
            documents,
        };
        resolver.check_all_refs()?;
        Ok(resolver)
    }

    pub fn root(&self) -> Located<'_> {
        let key = Arc::clone(&self.root);
        let value = self
            .documents
            .get(&key)
            .map(|d| d.as_ref())
            .unwrap_or(&Value::Null);
        Located {
            location: NodeLocation {
                document: key,
                pointer: String::new(),
            },
            value,
        }
    }

    /// The root document as loaded, never rewritten.
    pub fn root_document(&self) -> Arc<Value> {
        self.documents
            .get(&self.root)
            .map(Arc::clone)
            .unwrap_or_else(|| Arc::new(Value::Null))
    }

    /// Resolve one reference string relative to `from`.
    pub fn resolve(&self, from: &NodeLocation, reference: &str) -> Result<Located<'_>, GlueError> {
        let (doc_part, fragment) = match reference.split_once('#') {
            Some((d, f)) => (d, f),
            None => (reference, ""),
        };
        let document: Arc<str> = if doc_part.is_empty() {
            Arc::clone(&from.document)
        } else {
            let url = document_part(&from.document, doc_part)?;
            Arc::from(url.as_str())
        };
        let (key, doc) = self.documents.get_key_value(&document).ok_or_else(|| {
            debug!(reference = reference, "Reference points at a document that was not loaded");
            GlueError::SpecificationInvalid
        })?;
        let pointer = urlencoding::decode(fragment)
            .map_err(|_| GlueError::SpecificationInvalid)?
            .into_owned();
        let value = doc.pointer(&pointer).ok_or_else(|| {
            debug!(reference = reference, "Unresolvable reference");
            GlueError::SpecificationInvalid
        })?;
        Ok(Located {
            location: NodeLocation {
                document: Arc::clone(key),
                pointer,
            },
            value,
        })
    }

    /// Follow `$ref` chains until a non-reference node is reached.
    pub fn deref<'a>(&'a self, node: Located<'a>) -> Result<Located<'a>, GlueError> {
        let mut current = node;
        for _ in 0..MAX_REF_CHAIN {
            match ref_target(current.value) {
                Some(reference) => current = self.resolve(&current.location, reference)?,
                None => return Ok(current),
            }
        }
        debug!(location = %current.location.to_ref(), "Reference chain does not terminate");
        Err(GlueError::SpecificationInvalid)
    }

    fn check_all_refs(&self) -> Result<(), GlueError> {
        for (key, doc) in &self.documents {
            let start = Located {
                location: NodeLocation {
                    document: Arc::clone(key),
                    pointer: String::new(),
                },
                value: doc.as_ref(),
            };
            self.check_node(start)?;
        }
        Ok(())
    }

    fn check_node(&self, node: Located<'_>) -> Result<(), GlueError> {
        match node.value {
            Value::Object(map) => {
                if map.get("$ref").and_then(Value::as_str).is_some() {
                    self.deref(node.clone())?;
                }
                for (_, child) in node.entries() {
                    self.check_node(child)?;
                }
            }
            Value::Array(_) => {
                for child in node.items() {
                    self.check_node(child)?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn strip_fragment(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);
    url
}

fn document_part(base: &str, reference: &str) -> Result<Url, GlueError> {
    let doc_part = reference.split('#').next().unwrap_or_default();
    let base = Url::parse(base).map_err(|_| GlueError::SpecificationInvalid)?;
    if doc_part.is_empty() {
        return Ok(strip_fragment(&base));
    }
    base.join(doc_part).map(|u| strip_fragment(&u)).map_err(|e| {
        debug!(reference = reference, error = %e, "Malformed document reference");
        GlueError::SpecificationInvalid
    })
}

fn load_external(url: &Url) -> Result<Value, GlueError> {
    if url.scheme() != "file" {
        debug!(document = %url, "Only file references can be loaded");
        return Err(GlueError::SpecificationInvalid);
    }
    let path = url.to_file_path().map_err(|_| GlueError::SpecificationInvalid)?;
    read_document(&path).map_err(|e| {
        debug!(document = %url, error = %e, "Failed to load referenced document");
        GlueError::SpecificationInvalid
    })
}

fn collect_refs(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let Some(r) = map.get("$ref").and_then(Value::as_str) {
                out.push(r.to_string());
            }
            for v in map.values() {
                collect_refs(v, out);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_refs(v, out);
            }
        }
        _ => {}
    }
}
