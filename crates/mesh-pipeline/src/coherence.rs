// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cross-section dependency-version conflict scan.
//!
//! Extracts `<Name> [v]MAJOR.MINOR[.PATCH|.x]` mentions from section
//! prose (fenced code blocks are ignored) and reports one issue per
//! unordered pair of distinct versions seen for the same dependency.
//! Issues are warnings; they never fail a stage.

use std::collections::HashSet;
use std::sync::LazyLock;

use mesh_core::Section;
use regex::Regex;

static VERSION_MENTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z][A-Za-z0-9_.+-]{0,40})\s+v?(\d+\.\d+(?:\.(?:\d+|x))?)\b")
        .expect("version mention regex")
});

/// A cross-section version disagreement for one dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoherenceIssue {
    /// Case-folded dependency name.
    pub dependency: String,
    /// First version seen.
    pub version_a: String,
    /// Section that first mentioned `version_a`.
    pub section_a: String,
    /// Conflicting version.
    pub version_b: String,
    /// Section that first mentioned `version_b`.
    pub section_b: String,
}

impl std::fmt::Display for CoherenceIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} appears as {} (in {}) and {} (in {})",
            self.dependency, self.version_a, self.section_a, self.version_b, self.section_b
        )
    }
}

/// Scan all sections for conflicting dependency-version mentions.
#[must_use]
pub fn check_coherence(sections: &[Section]) -> Vec<CoherenceIssue> {
    // dependency → versions in first-seen order with their first section.
    let mut seen: Vec<(String, Vec<(String, String)>)> = Vec::new();

    for section in sections {
        let prose = strip_fenced_blocks(&section.content);
        // Identical mentions inside one section count once.
        let mut in_section: HashSet<(String, String)> = HashSet::new();
        for caps in VERSION_MENTION.captures_iter(&prose) {
            let dependency = caps[1].to_lowercase();
            let version = caps[2].to_string();
            if !in_section.insert((dependency.clone(), version.clone())) {
                continue;
            }
            match seen.iter_mut().find(|(dep, _)| *dep == dependency) {
                Some((_, versions)) => {
                    if !versions.iter().any(|(v, _)| *v == version) {
                        versions.push((version, section.name.clone()));
                    }
                }
                None => seen.push((dependency, vec![(version, section.name.clone())])),
            }
        }
    }

    let mut issues = Vec::new();
    for (dependency, versions) in &seen {
        for i in 0..versions.len() {
            for j in i + 1..versions.len() {
                issues.push(CoherenceIssue {
                    dependency: dependency.clone(),
                    version_a: versions[i].0.clone(),
                    section_a: versions[i].1.clone(),
                    version_b: versions[j].0.clone(),
                    section_b: versions[j].1.clone(),
                });
            }
        }
    }
    issues
}

/// Drop everything between ``` fences, keeping the prose.
fn strip_fenced_blocks(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut in_fence = false;
    for line in content.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if !in_fence {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}
