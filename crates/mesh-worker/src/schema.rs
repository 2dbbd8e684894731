// SPDX-License-Identifier: MIT OR Apache-2.0
//! Schema specialist.
//!
//! Skills: `translate-schema`, `validate-types`, `write-contracts`.
//! Parsing is heuristic; the emitted artifacts are the contract.

use async_trait::async_trait;
use mesh_core::{Artifact, Message, Task};
use regex::Regex;
use std::sync::LazyLock;

use crate::base::Processor;
use crate::detect_skill;
use crate::research::section_draft;

/// Skill ids advertised by the schema agent.
pub const SKILLS: &[&str] = &["translate-schema", "validate-types", "write-contracts"];

static INLINE_ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    // Notation B: `EntityName(field: type, other: type)`
    Regex::new(r"^([A-Z][A-Za-z0-9]*)\s*\(([^)]*)\)\s*$").expect("inline entity regex")
});

static ENDPOINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(GET|POST|PUT|PATCH|DELETE)\s+(/\S*)\s*(.*)$").expect("endpoint regex")
});

#[derive(Debug, PartialEq)]
struct Entity {
    name: String,
    fields: Vec<(String, String)>,
}

/// The schema agent's processor.
#[derive(Default)]
pub struct SchemaProcessor;

impl SchemaProcessor {
    /// A stateless schema processor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn translate_schema(&self, text: &str) -> Vec<Artifact> {
        let entities = parse_entities(text);
        let mut doc = String::from("## Data Model\n\n");
        if entities.is_empty() {
            doc.push_str("No entity definitions were found in the request.\n");
        } else {
            doc.push_str("```rust\n");
            for entity in &entities {
                doc.push_str(&render_struct(entity));
                doc.push('\n');
            }
            doc.push_str("```\n");
        }
        vec![
            Artifact::text("type-definitions", doc)
                .with_description("struct definitions translated from entity notation"),
        ]
    }

    fn validate_types(&self, text: &str) -> Vec<Artifact> {
        let code = fenced_block(text).unwrap_or(text);
        let mut issues: Vec<String> = Vec::new();

        for (open, close, label) in [('{', '}', "brace"), ('(', ')', "parenthesis"), ('[', ']', "bracket")] {
            let balance = brace_balance(code, open, close);
            if balance != 0 {
                issues.push(format!(
                    "unbalanced {label}s: {} unmatched `{}`",
                    balance.abs(),
                    if balance > 0 { open } else { close }
                ));
            }
        }

        for line in code.lines() {
            let trimmed = line.trim_start();
            if (trimmed.starts_with("struct ") || trimmed.starts_with("enum "))
                && !trimmed.starts_with("pub")
            {
                let name = trimmed
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or("?")
                    .trim_end_matches('{');
                issues.push(format!("type `{name}` is not public"));
            }
        }

        let mut doc = String::from("## Type Validation\n\n");
        if issues.is_empty() {
            doc.push_str("Validation passed: braces balanced, all types public.\n");
        } else {
            for issue in &issues {
                doc.push_str(&format!("- {issue}\n"));
            }
        }
        vec![Artifact::text("type-validation", doc)]
    }

    fn write_contracts(&self, text: &str) -> Vec<Artifact> {
        let mut doc = String::from("## Interface Contracts\n\n");
        let mut emitted = 0usize;
        let mut code = String::from("```rust\n");
        for line in text.lines() {
            let Some(caps) = ENDPOINT.captures(line.trim()) else {
                continue;
            };
            let verb = &caps[1];
            let path = &caps[2];
            let (input, output) = parse_entities_clause(verb, caps[3].trim());
            code.push_str(&render_contract(verb, path, input.as_deref(), output.as_deref()));
            code.push('\n');
            emitted += 1;
        }
        code.push_str("```\n");
        if emitted == 0 {
            doc.push_str("No endpoint declarations were found in the request.\n");
        } else {
            doc.push_str(&code);
        }
        vec![
            Artifact::text("interface-contracts", doc)
                .with_description("request/response types per endpoint"),
        ]
    }
}

#[async_trait]
impl Processor for SchemaProcessor {
    async fn process(&self, _task: &Task, message: &Message) -> anyhow::Result<Vec<Artifact>> {
        let text = message.first_text().unwrap_or_default();
        Ok(match detect_skill(text, SKILLS) {
            Some("translate-schema") => self.translate_schema(text),
            Some("validate-types") => self.validate_types(text),
            Some("write-contracts") => self.write_contracts(text),
            _ => vec![section_draft("schema", text)],
        })
    }
}

/// Parse both supported entity notations out of free text.
///
/// Notation A is a heading line `EntityName:` followed by `- field: type`
/// bullets; notation B is inline `EntityName(field: type, ...)`.
fn parse_entities(text: &str) -> Vec<Entity> {
    let mut entities: Vec<Entity> = Vec::new();
    let mut current: Option<Entity> = None;

    for line in text.lines() {
        let trimmed = line.trim();

        if let Some(caps) = INLINE_ENTITY.captures(trimmed) {
            if let Some(done) = current.take() {
                entities.push(done);
            }
            let fields = caps[2]
                .split(',')
                .filter_map(parse_field)
                .collect::<Vec<_>>();
            entities.push(Entity {
                name: caps[1].to_string(),
                fields,
            });
            continue;
        }

        if let Some(name) = trimmed.strip_suffix(':') {
            if name
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_uppercase())
                && name.chars().all(char::is_alphanumeric)
            {
                if let Some(done) = current.take() {
                    entities.push(done);
                }
                current = Some(Entity {
                    name: name.to_string(),
                    fields: Vec::new(),
                });
                continue;
            }
        }

        if let Some(rest) = trimmed.strip_prefix("- ") {
            if let (Some(entity), Some(field)) = (current.as_mut(), parse_field(rest)) {
                entity.fields.push(field);
            }
        }
    }
    if let Some(done) = current.take() {
        entities.push(done);
    }
    entities.retain(|e| !e.fields.is_empty());
    entities
}

fn parse_field(raw: &str) -> Option<(String, String)> {
    let (name, ty) = raw.split_once(':')?;
    let name = name.trim();
    let ty = ty.trim();
    if name.is_empty() || ty.is_empty() {
        return None;
    }
    Some((snake_case(name), rust_type(ty)))
}

fn rust_type(ty: &str) -> String {
    match ty.to_ascii_lowercase().as_str() {
        "string" | "str" | "text" => "String".into(),
        "int" | "integer" | "int64" | "long" => "i64".into(),
        "int32" => "i32".into(),
        "float" | "double" | "number" => "f64".into(),
        "bool" | "boolean" => "bool".into(),
        "uuid" | "id" => "String".into(),
        "datetime" | "timestamp" | "date" => "String".into(),
        "json" | "object" | "map" => "serde_json::Value".into(),
        _ => ty.to_string(),
    }
}

fn render_struct(entity: &Entity) -> String {
    let mut out = String::new();
    out.push_str("#[derive(Debug, Clone, Serialize, Deserialize)]\n");
    out.push_str("#[serde(rename_all = \"camelCase\")]\n");
    out.push_str(&format!("pub struct {} {{\n", entity.name));
    for (name, ty) in &entity.fields {
        out.push_str(&format!("    pub {name}: {ty},\n"));
    }
    out.push_str("}\n");
    out
}

fn render_contract(verb: &str, path: &str, input: Option<&str>, output: Option<&str>) -> String {
    let base = contract_name(verb, path);
    let params = path_params(path);

    let mut out = format!("/// {verb} {path}\n");
    out.push_str("#[derive(Debug, Clone, Serialize, Deserialize)]\n");
    out.push_str("#[serde(rename_all = \"camelCase\")]\n");
    out.push_str(&format!("pub struct {base}Request {{\n"));
    for param in &params {
        out.push_str(&format!("    pub {}: String,\n", snake_case(param)));
    }
    if let Some(input) = input {
        out.push_str(&format!("    pub body: {input},\n"));
    }
    out.push_str("}\n\n");

    out.push_str("#[derive(Debug, Clone, Serialize, Deserialize)]\n");
    out.push_str("#[serde(rename_all = \"camelCase\")]\n");
    out.push_str(&format!("pub struct {base}Response {{\n"));
    if let Some(output) = output {
        out.push_str(&format!("    pub body: {output},\n"));
    }
    out.push_str("}\n");
    out
}

/// Split the trailing entity clause of an endpoint line.
///
/// `Input / Output` names both; `-> Output` names the response only;
/// a bare entity is the request body for mutating verbs and the
/// response body otherwise.
fn parse_entities_clause(verb: &str, clause: &str) -> (Option<String>, Option<String>) {
    let entity = |s: &str| {
        let s = s.trim();
        (!s.is_empty() && s.chars().next().is_some_and(|c| c.is_ascii_uppercase()))
            .then(|| s.to_string())
    };
    if clause.is_empty() {
        return (None, None);
    }
    if let Some((left, right)) = clause.split_once("->") {
        return (entity(left), entity(right));
    }
    if let Some((left, right)) = clause.split_once('/') {
        return (entity(left), entity(right));
    }
    match verb {
        "POST" | "PUT" | "PATCH" => (entity(clause), None),
        _ => (None, entity(clause)),
    }
}

/// `GET /users/{id}` → `GetUsersById`.
fn contract_name(verb: &str, path: &str) -> String {
    let mut name = pascal_case(&verb.to_ascii_lowercase());
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if let Some(param) = param_name(segment) {
            name.push_str("By");
            name.push_str(&pascal_case(param));
        } else {
            name.push_str(&pascal_case(segment));
        }
    }
    name
}

/// Path parameters in either `{id}` or `:id` form.
fn path_params(path: &str) -> Vec<&str> {
    path.split('/').filter_map(param_name).collect()
}

fn param_name(segment: &str) -> Option<&str> {
    segment
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .or_else(|| segment.strip_prefix(':'))
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}

fn brace_balance(code: &str, open: char, close: char) -> i64 {
    let mut balance = 0i64;
    for c in code.chars() {
        if c == open {
            balance += 1;
        } else if c == close {
            balance -= 1;
        }
    }
    balance
}

fn snake_case(name: &str) -> String {
    let mut out = String::new();
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else if c == '-' || c == ' ' {
            out.push('_');
        } else {
            out.push(c);
        }
    }
    out
}

fn pascal_case(name: &str) -> String {
    name.split(['-', '_', ' '])
        .filter(|s| !s.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_core::Part;

    async fn run(text: &str) -> String {
        let processor = SchemaProcessor::new();
        let task = Task::submitted("t", "ctx");
        let message = Message::user(vec![Part::text(text)]);
        let artifacts = processor.process(&task, &message).await.unwrap();
        artifacts[0].text_content()
    }

    #[tokio::test]
    async fn translates_bullet_notation() {
        let doc = run("translate-schema\n\nUser:\n- name: string\n- login_count: int\n- active: bool\n").await;
        assert!(doc.contains("pub struct User {"));
        assert!(doc.contains("pub name: String,"));
        assert!(doc.contains("pub login_count: i64,"));
        assert!(doc.contains("pub active: bool,"));
        assert!(doc.contains(r#"#[serde(rename_all = "camelCase")]"#));
    }

    #[tokio::test]
    async fn translates_inline_notation() {
        let doc = run("translate-schema\n\nInvoice(total: float, paidAt: datetime)").await;
        assert!(doc.contains("pub struct Invoice {"));
        assert!(doc.contains("pub total: f64,"));
        assert!(doc.contains("pub paid_at: String,"));
    }

    #[tokio::test]
    async fn mixed_notations_in_one_request() {
        let doc = run("translate-schema\n\nUser:\n- name: string\n\nTag(label: string)").await;
        assert!(doc.contains("pub struct User {"));
        assert!(doc.contains("pub struct Tag {"));
    }

    #[tokio::test]
    async fn validate_passes_balanced_public_code() {
        let doc = run("validate-types\n\n```rust\npub struct A { x: i64 }\n```").await;
        assert!(doc.contains("Validation passed"));
    }

    #[tokio::test]
    async fn validate_flags_unbalanced_braces_and_private_types() {
        let doc = run("validate-types\n\n```rust\nstruct A { x: i64\n```").await;
        assert!(doc.contains("unbalanced brace"));
        assert!(doc.contains("`A` is not public"));
    }

    #[tokio::test]
    async fn contracts_with_braced_path_param() {
        let doc = run("write-contracts\n\nGET /users/{id} -> User").await;
        assert!(doc.contains("pub struct GetUsersByIdRequest {"));
        assert!(doc.contains("    pub id: String,"));
        assert!(doc.contains("pub struct GetUsersByIdResponse {"));
    }

    #[tokio::test]
    async fn contracts_with_colon_path_param_and_body() {
        let doc = run("write-contracts\n\nPOST /projects/:projectId CreateProject / Project").await;
        assert!(doc.contains("pub struct PostProjectsByProjectIdRequest {"));
        assert!(doc.contains("    pub project_id: String,"));
        assert!(doc.contains("    pub body: CreateProject,"));
        assert!(doc.contains("    pub body: Project,"));
    }

    #[tokio::test]
    async fn no_entities_yields_explicit_notice() {
        let doc = run("translate-schema\n\nnothing structured here").await;
        assert!(doc.contains("No entity definitions"));
    }

    #[test]
    fn helper_casing() {
        assert_eq!(snake_case("paidAt"), "paid_at");
        assert_eq!(snake_case("already_snake"), "already_snake");
        assert_eq!(pascal_case("users"), "Users");
        assert_eq!(pascal_case("project-items"), "ProjectItems");
    }
}
