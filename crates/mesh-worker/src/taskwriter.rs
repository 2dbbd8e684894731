// SPDX-License-Identifier: MIT OR Apache-2.0
//! Task-writer specialist.
//!
//! Skills: `write-task-specs`, `validate-dependencies`. Task ids
//! follow `T-MM.SS` — two-digit milestone, two-digit sequence within
//! the milestone.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::LazyLock;

use async_trait::async_trait;
use mesh_core::{Artifact, Message, Task};
use regex::Regex;

use crate::base::Processor;
use crate::detect_skill;
use crate::research::section_draft;

/// Skill ids advertised by the task-writer agent.
pub const SKILLS: &[&str] = &["write-task-specs", "validate-dependencies"];

static MILESTONE_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)milestone\s+(\d+)").expect("milestone regex"));

static NUMBERED_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+[.)]\s+(.+)$").expect("entry regex"));

static TASK_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"T-\d{2}\.\d{2}").expect("task id regex"));

static DEFINED_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^##\s+(T-\d{2}\.\d{2})").expect("defined id regex"));

/// Format a task id from milestone and sequence numbers.
#[must_use]
pub fn format_task_id(milestone: u32, sequence: u32) -> String {
    format!("T-{milestone:02}.{sequence:02}")
}

#[derive(Debug)]
struct FileEntry {
    path: String,
    action: &'static str,
    depends_on: Vec<String>,
}

/// The task-writer agent's processor.
#[derive(Default)]
pub struct TaskWriterProcessor;

impl TaskWriterProcessor {
    /// A stateless task-writer processor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn write_task_specs(text: &str) -> Vec<Artifact> {
        let milestone = MILESTONE_HEADING
            .captures(text)
            .and_then(|c| c[1].parse::<u32>().ok())
            .unwrap_or(1);

        let entries = parse_entries(text);
        if entries.is_empty() {
            return vec![Artifact::text(
                "task-specs",
                "# Task Specifications\n\nNo numbered file entries were found in the request.\n",
            )];
        }

        // Input order is preserved: assuming the list is topologically
        // ordered, a file's task id precedes any file that depends on
        // it.
        let ids: HashMap<&str, String> = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.path.as_str(), format_task_id(milestone, i as u32 + 1)))
            .collect();

        let mut doc = format!("# Task Specifications — Milestone {milestone:02}\n\n");
        for (i, entry) in entries.iter().enumerate() {
            let id = format_task_id(milestone, i as u32 + 1);
            doc.push_str(&format!("## {id} — {}\n\n", entry.path));
            doc.push_str(&format!("**File**: `{}`\n", entry.path));
            doc.push_str(&format!("**Action**: {}\n", entry.action));

            let deps: Vec<&str> = entry
                .depends_on
                .iter()
                .filter_map(|dep| ids.get(dep.as_str()).map(String::as_str))
                .collect();
            if deps.is_empty() {
                doc.push_str("**Depends on**: (none)\n");
            } else {
                doc.push_str(&format!("**Depends on**: {}\n", deps.join(", ")));
            }

            doc.push_str("\n### Implementation Outline\n\n");
            doc.push_str(&outline_for(&entry.path, entry.action));
            doc.push_str("\n### Acceptance Criteria\n\n");
            doc.push_str(&criteria_for(&entry.path, &deps));
            doc.push('\n');
        }
        vec![
            Artifact::text("task-specs", doc)
                .with_description("one T-MM.SS block per file, input order preserved"),
        ]
    }

    fn validate_dependencies(text: &str) -> Vec<Artifact> {
        let defined: Vec<String> = DEFINED_ID
            .captures_iter(text)
            .map(|c| c[1].to_string())
            .collect();
        let defined_set: HashSet<&str> = defined.iter().map(String::as_str).collect();

        // Every `Depends on:` reference, attributed to the task block
        // it appears under.
        let mut references: Vec<(String, String)> = Vec::new();
        let mut current: Option<String> = None;
        for line in text.lines() {
            if let Some(caps) = DEFINED_ID.captures(line) {
                current = Some(caps[1].to_string());
                continue;
            }
            // Matches both `Depends on:` and the bold `**Depends on**:`.
            if let Some(pos) = line.find("Depends on") {
                for id in TASK_ID.find_iter(&line[pos..]) {
                    let owner = current.clone().unwrap_or_else(|| "(preamble)".into());
                    references.push((owner, id.as_str().to_string()));
                }
            }
        }

        let missing: Vec<&(String, String)> = references
            .iter()
            .filter(|(_, dep)| !defined_set.contains(dep.as_str()))
            .collect();

        let cycle_nodes = find_cycle_nodes(&defined, &references);

        let mut doc = String::from("# Dependency Validation\n\n");
        doc.push_str(&format!(
            "Checked {} task(s) and {} reference(s).\n\n",
            defined.len(),
            references.len()
        ));

        if missing.is_empty() && cycle_nodes.is_empty() {
            doc.push_str("All dependencies resolved; no cycles detected.\n");
        }
        if !missing.is_empty() {
            doc.push_str("## Missing References\n\n");
            for (owner, dep) in &missing {
                doc.push_str(&format!("- {dep} (referenced by {owner})\n"));
            }
            doc.push('\n');
        }
        if !cycle_nodes.is_empty() {
            doc.push_str("## Circular Dependencies\n\n");
            doc.push_str(&format!("- cycle involving: {}\n", cycle_nodes.join(", ")));
        }
        vec![Artifact::text("dependency-validation", doc)]
    }
}

#[async_trait]
impl Processor for TaskWriterProcessor {
    async fn process(&self, _task: &Task, message: &Message) -> anyhow::Result<Vec<Artifact>> {
        let text = message.first_text().unwrap_or_default();
        Ok(match detect_skill(text, SKILLS) {
            Some("write-task-specs") => Self::write_task_specs(text),
            Some("validate-dependencies") => Self::validate_dependencies(text),
            _ => vec![section_draft("task-writer", text)],
        })
    }
}

/// Parse the numbered file list with its optional annotations.
///
/// An entry is `N. <path>` with `(modify)` marking pre-existing files
/// and `Depends on: <path>` either inline (after `--`) or on an
/// indented continuation line.
fn parse_entries(text: &str) -> Vec<FileEntry> {
    let mut entries: Vec<FileEntry> = Vec::new();
    for line in text.lines() {
        if let Some(caps) = NUMBERED_ENTRY.captures(line) {
            let body = caps[1].trim();
            let (body, inline_deps) = match body.split_once("--") {
                Some((left, right)) => (left.trim(), Some(right)),
                None => (body, None),
            };

            let action = if body.to_ascii_lowercase().contains("(modify)") {
                "MODIFY"
            } else {
                "CREATE"
            };
            let path = body
                .replace("(modify)", "")
                .replace("(create)", "")
                .trim()
                .trim_matches('`')
                .to_string();

            let mut entry = FileEntry {
                path,
                action,
                depends_on: Vec::new(),
            };
            if let Some(deps) = inline_deps {
                push_deps(&mut entry, deps);
            }
            entries.push(entry);
            continue;
        }

        // Continuation: `   Depends on: a/b.rs, c/d.rs`
        if line.starts_with(char::is_whitespace) {
            if let Some((_, rest)) = line.split_once("Depends on:") {
                if let Some(entry) = entries.last_mut() {
                    push_deps(entry, rest);
                }
            }
        }
    }
    entries
}

fn push_deps(entry: &mut FileEntry, raw: &str) {
    let raw = raw.trim().trim_start_matches("Depends on:").trim();
    for dep in raw.split(',') {
        let dep = dep.trim().trim_matches('`');
        if !dep.is_empty() {
            entry.depends_on.push(dep.to_string());
        }
    }
}

fn outline_for(path: &str, action: &str) -> String {
    let mut out = String::new();
    if action == "MODIFY" {
        out.push_str(&format!("- Read `{path}` and locate the affected seam\n"));
        out.push_str("- Apply the change without breaking the existing public surface\n");
    } else {
        out.push_str(&format!("- Create `{path}` with the module skeleton\n"));
        out.push_str("- Implement the types and functions this file owns\n");
    }
    out.push_str("- Wire the file into its parent module\n");
    out
}

fn criteria_for(path: &str, deps: &[&str]) -> String {
    let mut out = String::new();
    out.push_str(&format!("- `{path}` compiles as part of the workspace\n"));
    out.push_str("- Unit tests cover the file's observable behavior\n");
    if !deps.is_empty() {
        out.push_str(&format!(
            "- Behavior stays consistent with {}\n",
            deps.join(", ")
        ));
    }
    out
}

/// Kahn's algorithm over the defined tasks; any node left unprocessed
/// sits on a cycle.
fn find_cycle_nodes(defined: &[String], references: &[(String, String)]) -> Vec<String> {
    let nodes: HashSet<&str> = defined.iter().map(String::as_str).collect();
    // Edge dep → owner: the dependency must come first.
    let mut successors: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut in_degree: HashMap<&str, usize> = nodes.iter().map(|n| (*n, 0)).collect();

    for (owner, dep) in references {
        if nodes.contains(owner.as_str()) && nodes.contains(dep.as_str()) {
            successors.entry(dep.as_str()).or_default().push(owner.as_str());
            *in_degree.entry(owner.as_str()).or_insert(0) += 1;
        }
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(n, _)| *n)
        .collect();
    let mut processed: HashSet<&str> = HashSet::new();

    while let Some(node) = queue.pop_front() {
        processed.insert(node);
        for next in successors.get(node).into_iter().flatten() {
            let degree = in_degree.get_mut(next).expect("known node");
            *degree -= 1;
            if *degree == 0 {
                queue.push_back(next);
            }
        }
    }

    let mut cycle: Vec<String> = defined
        .iter()
        .filter(|n| !processed.contains(n.as_str()))
        .cloned()
        .collect();
    cycle.sort();
    cycle.dedup();
    cycle
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_core::Part;

    async fn run(text: &str) -> String {
        let processor = TaskWriterProcessor::new();
        let task = Task::submitted("t", "ctx");
        let message = Message::user(vec![Part::text(text)]);
        let artifacts = processor.process(&task, &message).await.unwrap();
        artifacts[0].text_content()
    }

    #[test]
    fn id_format() {
        assert_eq!(format_task_id(1, 1), "T-01.01");
        assert_eq!(format_task_id(12, 3), "T-12.03");
    }

    #[tokio::test]
    async fn specs_preserve_input_order_for_dependencies() {
        let input = "write-task-specs for Milestone 2\n\n\
                     1. src/store.rs\n\
                     2. src/worker.rs -- Depends on: src/store.rs\n";
        let doc = run(input).await;

        let a = doc.find("## T-02.01 — src/store.rs").expect("A present");
        let b = doc.find("## T-02.02 — src/worker.rs").expect("B present");
        assert!(a < b, "dependency must precede dependent");
        assert!(doc.contains("**Depends on**: T-02.01"));
    }

    #[tokio::test]
    async fn specs_default_milestone_is_one() {
        let doc = run("write-task-specs\n\n1. src/lib.rs\n").await;
        assert!(doc.contains("## T-01.01 — src/lib.rs"));
        assert!(doc.contains("**Action**: CREATE"));
        assert!(doc.contains("**Depends on**: (none)"));
        assert!(doc.contains("### Implementation Outline"));
        assert!(doc.contains("### Acceptance Criteria"));
    }

    #[tokio::test]
    async fn modify_annotation_changes_the_action() {
        let doc = run("write-task-specs\n\n1. src/main.rs (modify)\n").await;
        assert!(doc.contains("**File**: `src/main.rs`"));
        assert!(doc.contains("**Action**: MODIFY"));
    }

    #[tokio::test]
    async fn continuation_line_dependencies_are_parsed() {
        let input = "write-task-specs\n\n\
                     1. src/a.rs\n\
                     2. src/b.rs\n   Depends on: src/a.rs\n";
        let doc = run(input).await;
        assert!(doc.contains("**Depends on**: T-01.01"));
    }

    #[tokio::test]
    async fn validation_reports_missing_reference() {
        let input = "validate-dependencies\n\n\
                     ## T-01.01 — src/a.rs\n**Depends on**: (none)\n\n\
                     ## T-01.02 — src/b.rs\n**Depends on**: T-01.09\n";
        let doc = run(input).await;
        assert!(doc.contains("## Missing References"));
        assert!(doc.contains("T-01.09 (referenced by T-01.02)"));
        assert!(!doc.contains("## Circular Dependencies"));
    }

    #[tokio::test]
    async fn validation_detects_two_node_cycle() {
        let input = "validate-dependencies\n\n\
                     ## T-01.01 — src/a.rs\n**Depends on**: T-01.02\n\n\
                     ## T-01.02 — src/b.rs\n**Depends on**: T-01.01\n";
        let doc = run(input).await;
        assert!(doc.contains("## Circular Dependencies"));
        assert!(doc.contains("T-01.01"));
        assert!(doc.contains("T-01.02"));
    }

    #[tokio::test]
    async fn validation_passes_clean_graph() {
        let input = "validate-dependencies\n\n\
                     ## T-01.01 — src/a.rs\n**Depends on**: (none)\n\n\
                     ## T-01.02 — src/b.rs\n**Depends on**: T-01.01\n";
        let doc = run(input).await;
        assert!(doc.contains("All dependencies resolved"));
    }
}
