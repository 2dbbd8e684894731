// SPDX-License-Identifier: MIT OR Apache-2.0
//! Research specialist.
//!
//! Reads the project file tree and nothing else. Skills:
//! `explore-codebase`, `research-platform`, `verify-versions`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mesh_core::{Artifact, Message, Task};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::base::Processor;
use crate::detect_skill;

/// Skill ids advertised by the research agent.
pub const SKILLS: &[&str] = &["explore-codebase", "research-platform", "verify-versions"];

/// Directory names skipped during the walk (VCS, build output,
/// vendored dependencies, editor state).
const SKIP_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".idea",
    ".vscode",
    "node_modules",
    "vendor",
    "target",
    "dist",
    "build",
    "__pycache__",
    ".venv",
];

/// Root-level manifests the platform scan recognizes.
const CONFIG_MANIFESTS: &[&str] = &[
    "Cargo.toml",
    "package.json",
    "go.mod",
    "pyproject.toml",
    "requirements.txt",
    "Gemfile",
    "pom.xml",
    "build.gradle",
    "Makefile",
    "Dockerfile",
    "docker-compose.yml",
];

/// Maximum bytes of any one manifest rendered by `research-platform`.
const MANIFEST_RENDER_LIMIT: usize = 4096;

/// Maximum depth of the rendered directory tree.
const TREE_DEPTH: usize = 3;

/// The research agent's processor.
pub struct ResearchProcessor {
    root: PathBuf,
}

impl ResearchProcessor {
    /// A processor rooted at the given project directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn explore_codebase(&self) -> anyhow::Result<Vec<Artifact>> {
        let mut languages: BTreeMap<&'static str, usize> = BTreeMap::new();
        let mut configs: Vec<String> = Vec::new();
        let mut total_files = 0usize;

        for entry in WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|e| !is_skipped(e))
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            total_files += 1;
            let name = entry.file_name().to_string_lossy();
            if CONFIG_MANIFESTS.contains(&name.as_ref()) {
                let rel = entry
                    .path()
                    .strip_prefix(&self.root)
                    .unwrap_or(entry.path());
                configs.push(rel.display().to_string());
            }
            if let Some(lang) = language_of(entry.path()) {
                *languages.entry(lang).or_insert(0) += 1;
            }
        }
        configs.sort();

        let mut doc = String::from("## Codebase Exploration\n\n### Language Breakdown\n\n");
        doc.push_str("| Language | Files |\n|---|---|\n");
        for (lang, count) in &languages {
            doc.push_str(&format!("| {lang} | {count} |\n"));
        }
        doc.push_str(&format!("\nTotal files scanned: {total_files}\n"));

        doc.push_str("\n### Project Configuration\n\n");
        if configs.is_empty() {
            doc.push_str("No recognized configuration manifests found.\n");
        } else {
            for config in &configs {
                doc.push_str(&format!("- `{config}`\n"));
            }
        }

        doc.push_str("\n### Directory Tree\n\n```\n");
        doc.push_str(&self.render_tree());
        doc.push_str("```\n");

        debug!(target: "mesh.worker.research", files = total_files, "explored codebase");
        Ok(vec![
            Artifact::text("codebase-exploration", doc)
                .with_description("language counts, config manifests, directory tree"),
        ])
    }

    fn render_tree(&self) -> String {
        let mut out = String::new();
        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(TREE_DEPTH)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_skipped(e))
            .filter_map(Result::ok)
        {
            let depth = entry.depth();
            let name = entry.file_name().to_string_lossy();
            let marker = if entry.file_type().is_dir() { "/" } else { "" };
            out.push_str(&"  ".repeat(depth.saturating_sub(1)));
            out.push_str(&format!("{name}{marker}\n"));
        }
        out
    }

    fn research_platform(&self) -> anyhow::Result<Vec<Artifact>> {
        let mut doc = String::from("## Platform Baseline\n\n");
        let mut found = 0usize;
        for name in CONFIG_MANIFESTS {
            let path = self.root.join(name);
            if !path.is_file() {
                continue;
            }
            found += 1;
            let mut content = std::fs::read_to_string(&path).unwrap_or_default();
            if content.len() > MANIFEST_RENDER_LIMIT {
                content.truncate(MANIFEST_RENDER_LIMIT);
                content.push_str("\n… (truncated)\n");
            }
            doc.push_str(&format!("### {name}\n\n```\n{content}\n```\n\n"));
        }
        if found == 0 {
            doc.push_str("No root-level configuration manifests found.\n");
        }
        Ok(vec![
            Artifact::text("platform-research", doc)
                .with_description("root-level configuration manifests"),
        ])
    }

    fn verify_versions(&self) -> Vec<Artifact> {
        let doc = "## Version Verification\n\n\
                   Registry lookup is not available in this environment; \
                   falling back to the versions declared in the project \
                   manifests. Treat pinned versions as authoritative.\n";
        vec![Artifact::text("version-verification", doc)]
    }

    fn default_draft(&self, text: &str) -> Vec<Artifact> {
        vec![section_draft("research", text)]
    }
}

#[async_trait]
impl Processor for ResearchProcessor {
    async fn process(&self, _task: &Task, message: &Message) -> anyhow::Result<Vec<Artifact>> {
        let text = message.first_text().unwrap_or_default();
        match detect_skill(text, SKILLS) {
            Some("explore-codebase") => self.explore_codebase(),
            Some("research-platform") => self.research_platform(),
            Some("verify-versions") => Ok(self.verify_versions()),
            _ => Ok(self.default_draft(text)),
        }
    }
}

fn is_skipped(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIP_DIRS.contains(&name))
}

fn language_of(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?;
    let lang = match ext {
        "rs" => "Rust",
        "go" => "Go",
        "py" => "Python",
        "js" | "mjs" | "cjs" => "JavaScript",
        "ts" | "tsx" => "TypeScript",
        "java" => "Java",
        "rb" => "Ruby",
        "c" | "h" => "C",
        "cc" | "cpp" | "hpp" => "C++",
        "cs" => "C#",
        "sh" => "Shell",
        "sql" => "SQL",
        "md" => "Markdown",
        "yml" | "yaml" => "YAML",
        "toml" => "TOML",
        "json" => "JSON",
        _ => return None,
    };
    Some(lang)
}

/// Generic fallback draft for a section request outside any skill.
///
/// Shared by every specialist so round-robin assignment always yields
/// usable section content.
pub(crate) fn section_draft(agent: &str, text: &str) -> Artifact {
    let section = text
        .split_whitespace()
        .find_map(|token| token.strip_prefix("section="))
        .unwrap_or("notes")
        .to_string();

    let context: String = text
        .lines()
        .skip_while(|line| !line.starts_with("### "))
        .take(40)
        .collect::<Vec<_>>()
        .join("\n");

    let mut doc = format!("### {section}\n\n");
    if context.is_empty() {
        doc.push_str("No prior context was supplied; this section needs a dedicated pass.\n");
    } else {
        doc.push_str("Derived from the prior stage context:\n\n");
        doc.push_str(&context);
        doc.push('\n');
    }
    Artifact::text("section-draft", doc).with_description(format!("draft for {section} by {agent}"))
}
