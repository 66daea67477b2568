use askama::Template;
use heck::ToSnakeCase;
use serde_json::Value;
use std::collections::HashSet;

use crate::spec::{BodySchema, Route};

/// One operation stub in the generated `service.rs`.
#[derive(Debug, Clone)]
pub struct OperationStub {
    pub operation_id: String,
    /// `operation_id` as a Rust string literal
    pub id_literal: String,
    pub fn_name: String,
    pub method: String,
    pub url: String,
    /// Comment lines documenting the route's inputs and responses
    pub docs: Vec<String>,
}

/// One security scheme stub in the generated `security.rs`.
#[derive(Debug, Clone)]
pub struct SchemeStub {
    pub name: String,
    pub name_literal: String,
    pub fn_name: String,
    pub docs: Vec<String>,
}

/// Template data for generating Cargo.toml
#[derive(Template)]
#[template(path = "Cargo.toml.txt", escape = "none")]
pub struct CargoTomlTemplateData {
    pub name: String,
    /// Registry version of this library
    pub glue_version: String,
    /// Path dependency instead of the registry version
    pub local_path: Option<String>,
}

/// Template data for generating the registration entrypoint
#[derive(Template)]
#[template(path = "lib.rs.txt", escape = "none")]
pub struct LibRsTemplateData {
    pub name: String,
    pub has_security: bool,
}

#[derive(Template)]
#[template(path = "main.rs.txt", escape = "none")]
pub struct MainRsTemplateData {
    pub crate_name: String,
}

#[derive(Template)]
#[template(path = "service.rs.txt", escape = "none")]
pub struct ServiceTemplateData {
    pub operations: Vec<OperationStub>,
}

#[derive(Template)]
#[template(path = "security.rs.txt", escape = "none")]
pub struct SecurityTemplateData {
    pub schemes: Vec<SchemeStub>,
}

#[derive(Template)]
#[template(path = "test.rs.txt", escape = "none")]
pub struct TestTemplateData {
    pub crate_name: String,
    pub route_count: usize,
    pub operations: Vec<OperationStub>,
}

const RUST_KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "crate",
    "do", "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl",
    "in", "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "self", "static", "struct", "super", "trait", "true", "try", "type", "typeof",
    "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

/// Snake-case Rust identifier for an arbitrary name.
///
/// Characters outside `[a-z0-9_]` are dropped, a leading digit gets
/// `fallback_` in front and keywords get a trailing underscore.
pub fn rust_ident(name: &str, fallback: &str) -> String {
    let cleaned: String = name
        .to_snake_case()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    let ident = if cleaned.is_empty() {
        fallback.to_string()
    } else if cleaned.starts_with(|c: char| c.is_ascii_digit()) {
        format!("{fallback}_{cleaned}")
    } else {
        cleaned
    };
    if RUST_KEYWORDS.contains(&ident.as_str()) {
        format!("{ident}_")
    } else {
        ident
    }
}

/// Ensure a generated name is unique by appending `_n` on collision.
pub fn unique_ident(seen: &mut HashSet<String>, base: &str) -> String {
    let mut name = base.to_string();
    let mut i = 1;
    while !seen.insert(name.clone()) {
        name = format!("{base}_{i}");
        i += 1;
    }
    name
}

fn push_json(lines: &mut Vec<String>, label: &str, value: &Value) {
    lines.push(format!("{label}:"));
    let pretty = serde_json::to_string_pretty(value).unwrap_or_default();
    lines.extend(pretty.lines().map(|l| format!("  {l}")));
}

/// Human-readable documentation of a route's inputs and responses.
pub fn describe_route(route: &Route) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(summary) = route.openapi_source.get("summary").and_then(Value::as_str) {
        lines.push(summary.to_string());
        lines.push(String::new());
    }
    let schema = &route.schema;
    let inputs = [
        ("req.params", &schema.params),
        ("req.query", &schema.querystring),
        ("req.headers", &schema.headers),
        ("req.cookies", &schema.cookies),
    ];
    for (label, value) in inputs {
        if let Some(value) = value {
            push_json(&mut lines, label, value);
        }
    }
    match &schema.body {
        Some(BodySchema::Single(value)) => push_json(&mut lines, "req.body", value),
        Some(body @ BodySchema::ByContentType { .. }) => {
            push_json(&mut lines, "req.body", &serde_json::to_value(body).unwrap_or_default())
        }
        None => {}
    }
    if !schema.response.is_empty() {
        lines.push("valid responses:".to_string());
        for (status, value) in &schema.response {
            let pretty = serde_json::to_string_pretty(value).unwrap_or_default();
            lines.push(format!("  {status}:"));
            lines.extend(pretty.lines().map(|l| format!("    {l}")));
        }
    }
    lines
}

/// One stub per distinct operation id, in route order.
pub fn operation_stubs(routes: &[Route]) -> Vec<OperationStub> {
    let mut seen_ids = HashSet::new();
    let mut seen_fns: HashSet<String> = HashSet::from(["service_handlers".to_string()]);
    routes
        .iter()
        .filter(|route| seen_ids.insert(route.operation_id.clone()))
        .map(|route| OperationStub {
            operation_id: route.operation_id.clone(),
            id_literal: format!("{:?}", route.operation_id),
            fn_name: unique_ident(&mut seen_fns, &rust_ident(&route.operation_id, "operation")),
            method: route.method.to_string(),
            url: route.url.clone(),
            docs: describe_route(route),
        })
        .collect()
}

/// One stub per declared security scheme.
pub fn scheme_stubs<'a>(schemes: impl IntoIterator<Item = (&'a String, &'a Value)>) -> Vec<SchemeStub> {
    let mut seen_fns: HashSet<String> =
        HashSet::from(["initialize".to_string(), "security_handlers".to_string()]);
    schemes
        .into_iter()
        .map(|(name, definition)| {
            let mut docs = Vec::new();
            push_json(&mut docs, "definition", definition);
            SchemeStub {
                name: name.clone(),
                name_literal: format!("{name:?}"),
                fn_name: unique_ident(&mut seen_fns, &rust_ident(name, "scheme")),
                docs,
            }
        })
        .collect()
}
