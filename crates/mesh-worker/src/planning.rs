// SPDX-License-Identifier: MIT OR Apache-2.0
//! Planning specialist.
//!
//! The code-intelligence skills (`build-code-graph`,
//! `analyze-dependencies`, `assess-impact`) delegate to an external
//! [`CodeIntel`] service; a missing service is an error, not a
//! fallback. `plan-milestones` is local.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use mesh_core::{Artifact, Message, Task};

use crate::base::Processor;
use crate::detect_skill;
use crate::research::section_draft;

/// Skill ids advertised by the planning agent.
pub const SKILLS: &[&str] = &[
    "build-code-graph",
    "analyze-dependencies",
    "assess-impact",
    "plan-milestones",
];

/// Opaque interface to the code-intelligence graph service.
///
/// The graph store and parser behind it are external collaborators;
/// only this contract matters here.
#[async_trait]
pub trait CodeIntel: Send + Sync {
    /// Build (or refresh) the code graph for a project tree.
    async fn build_graph(&self, root: &Path) -> anyhow::Result<String>;

    /// Report the dependency fan-in/fan-out of a target symbol or file.
    async fn dependencies(&self, target: &str) -> anyhow::Result<String>;

    /// Estimate the blast radius of changing a target.
    async fn impact(&self, target: &str) -> anyhow::Result<String>;
}

/// The planning agent's processor.
pub struct PlanningProcessor {
    root: std::path::PathBuf,
    intel: Option<Arc<dyn CodeIntel>>,
}

impl PlanningProcessor {
    /// A processor with an optional code-intelligence service.
    #[must_use]
    pub fn new(root: impl Into<std::path::PathBuf>, intel: Option<Arc<dyn CodeIntel>>) -> Self {
        Self {
            root: root.into(),
            intel,
        }
    }

    fn intel(&self) -> anyhow::Result<&Arc<dyn CodeIntel>> {
        self.intel
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("code intelligence service unavailable"))
    }

    /// Target of an intel skill: the remainder of the keyword line.
    fn target_of(text: &str, skill: &str) -> String {
        text.lines()
            .find(|line| line.contains(skill))
            .and_then(|line| line.split_once(skill))
            .map(|(_, rest)| rest.trim().to_string())
            .unwrap_or_default()
    }

    fn plan_milestones(text: &str) -> Vec<Artifact> {
        let mut milestones: Vec<(String, Vec<String>)> = Vec::new();
        for line in text.lines() {
            if let Some(title) = line.strip_prefix("## ") {
                milestones.push((title.trim().to_string(), Vec::new()));
            } else if let Some((_, scope)) = milestones.last_mut() {
                let trimmed = line.trim();
                if !trimmed.is_empty() && scope.len() < 3 {
                    scope.push(trimmed.trim_start_matches("- ").to_string());
                }
            }
        }

        let mut doc = String::from("# Milestone Plan\n\n");
        if milestones.is_empty() {
            doc.push_str("No `## ` sections were found to group into milestones.\n");
        }
        for (i, (title, scope)) in milestones.iter().enumerate() {
            let number = i + 1;
            doc.push_str(&format!("## Milestone {number:02}: {title}\n\n"));
            if number == 1 {
                doc.push_str("Depends on: (none)\n");
            } else {
                doc.push_str(&format!("Depends on: Milestone {:02}\n", number - 1));
            }
            if !scope.is_empty() {
                doc.push_str("\nScope:\n");
                for item in scope {
                    doc.push_str(&format!("- {item}\n"));
                }
            }
            doc.push('\n');
        }
        vec![
            Artifact::text("milestone-plan", doc)
                .with_description("numbered milestones with linear predecessor dependencies"),
        ]
    }
}

#[async_trait]
impl Processor for PlanningProcessor {
    async fn process(&self, _task: &Task, message: &Message) -> anyhow::Result<Vec<Artifact>> {
        let text = message.first_text().unwrap_or_default();
        match detect_skill(text, SKILLS) {
            Some("build-code-graph") => {
                let report = self.intel()?.build_graph(&self.root).await?;
                Ok(vec![
                    Artifact::text("code-graph", format!("## Code Graph\n\n{report}\n")),
                ])
            }
            Some(skill @ "analyze-dependencies") => {
                let target = Self::target_of(text, skill);
                let report = self.intel()?.dependencies(&target).await?;
                Ok(vec![Artifact::text(
                    "dependency-analysis",
                    format!("## Dependency Analysis\n\n{report}\n"),
                )])
            }
            Some(skill @ "assess-impact") => {
                let target = Self::target_of(text, skill);
                let report = self.intel()?.impact(&target).await?;
                Ok(vec![Artifact::text(
                    "impact-assessment",
                    format!("## Impact Assessment\n\n{report}\n"),
                )])
            }
            Some("plan-milestones") => Ok(Self::plan_milestones(text)),
            _ => Ok(vec![section_draft("planning", text)]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_core::Part;

    struct StubIntel;

    #[async_trait]
    impl CodeIntel for StubIntel {
        async fn build_graph(&self, root: &Path) -> anyhow::Result<String> {
            Ok(format!("graph of {}", root.display()))
        }
        async fn dependencies(&self, target: &str) -> anyhow::Result<String> {
            Ok(format!("deps of {target}"))
        }
        async fn impact(&self, target: &str) -> anyhow::Result<String> {
            Ok(format!("impact of {target}"))
        }
    }

    async fn run(processor: &PlanningProcessor, text: &str) -> anyhow::Result<Vec<Artifact>> {
        let task = Task::submitted("t", "ctx");
        let message = Message::user(vec![Part::text(text)]);
        processor.process(&task, &message).await
    }

    fn with_intel() -> PlanningProcessor {
        PlanningProcessor::new("/tmp/project", Some(Arc::new(StubIntel)))
    }

    fn without_intel() -> PlanningProcessor {
        PlanningProcessor::new("/tmp/project", None)
    }

    #[tokio::test]
    async fn intel_skills_fail_without_service() {
        for skill in ["build-code-graph", "analyze-dependencies", "assess-impact"] {
            let err = run(&without_intel(), skill).await.unwrap_err();
            assert!(err.to_string().contains("unavailable"), "{skill}");
        }
    }

    #[tokio::test]
    async fn intel_skills_delegate_to_service() {
        let processor = with_intel();
        let artifacts = run(&processor, "build-code-graph").await.unwrap();
        assert_eq!(artifacts[0].name, "code-graph");

        let artifacts = run(&processor, "analyze-dependencies src/lib.rs")
            .await
            .unwrap();
        assert_eq!(artifacts[0].name, "dependency-analysis");
        assert!(artifacts[0].text_content().contains("deps of src/lib.rs"));

        let artifacts = run(&processor, "assess-impact Task").await.unwrap();
        assert!(artifacts[0].text_content().contains("impact of Task"));
    }

    #[tokio::test]
    async fn milestones_group_sections_linearly() {
        let input = "plan-milestones\n\n## Storage Layer\n- task store\n\n## Wire Protocol\n- codec\n\n## Pipeline\n";
        let artifacts = run(&without_intel(), input).await.unwrap();
        let doc = artifacts[0].text_content();
        assert!(doc.contains("## Milestone 01: Storage Layer"));
        assert!(doc.contains("## Milestone 02: Wire Protocol"));
        assert!(doc.contains("## Milestone 03: Pipeline"));
        assert!(doc.contains("Depends on: (none)"));
        assert!(doc.contains("Depends on: Milestone 01"));
        assert!(doc.contains("Depends on: Milestone 02"));
        assert!(doc.contains("- task store"));
    }

    #[tokio::test]
    async fn milestones_without_sections_say_so() {
        let artifacts = run(&without_intel(), "plan-milestones\n\njust prose")
            .await
            .unwrap();
        assert!(artifacts[0].text_content().contains("No `## ` sections"));
    }
}
