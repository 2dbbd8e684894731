// SPDX-License-Identifier: MIT OR Apache-2.0
//! Template and single-agent document generation for degraded tiers.
//!
//! Basic tier: a skeleton document with a TODO placeholder per plan
//! section, every section attributed to agent `template`. Mcp-only
//! tier: the same skeleton seeded with the prior stages' context,
//! attributed to `mcp-local`. Higher tiers never take this path.

use mesh_core::{Section, Stage, StageResult};

/// Placeholder left in every template section.
pub const TODO_PLACEHOLDER: &str = "<!-- TODO: Complete this section -->";

/// Agent label of basic-tier sections.
pub const TEMPLATE_AGENT: &str = "template";

/// Agent label of mcp-only-tier sections.
pub const MCP_AGENT: &str = "mcp-local";

/// Build the basic-tier template document for a stage.
#[must_use]
pub fn template_document(stage: Stage) -> (String, Vec<Section>) {
    let mut doc = format!("# {}\n", stage.title());
    let mut sections = Vec::new();
    for name in stage.merge_plan() {
        let block = format!("## {name}\n\n{TODO_PLACEHOLDER}\n");
        doc.push('\n');
        doc.push_str(&block);
        sections.push(Section::new(*name, block, TEMPLATE_AGENT));
    }
    (doc, sections)
}

/// Build the mcp-only-tier document: the skeleton plus the prior
/// stages' context as a preamble.
#[must_use]
pub fn context_document(stage: Stage, inputs: &[StageResult]) -> (String, Vec<Section>) {
    let context = render_context(inputs);
    let mut doc = format!("# {}\n", stage.title());
    if !context.is_empty() {
        doc.push_str("\n## Context\n\n");
        doc.push_str(&context);
    }
    let mut sections = Vec::new();
    for name in stage.merge_plan() {
        let block = format!("## {name}\n\n{TODO_PLACEHOLDER}\n");
        doc.push('\n');
        doc.push_str(&block);
        sections.push(Section::new(*name, block, MCP_AGENT));
    }
    (doc, sections)
}

/// Render prior stage sections as a `### <stage>/<section>` preamble.
#[must_use]
pub fn render_context(inputs: &[StageResult]) -> String {
    let mut out = String::new();
    for input in inputs {
        for section in &input.sections {
            out.push_str(&format!(
                "### {}/{}\n\n{}\n\n",
                input.stage.index(),
                section.name,
                section.content.trim_end()
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_covers_every_plan_section() {
        let (doc, sections) = template_document(Stage::DesignPack);
        assert_eq!(sections.len(), 13);
        for name in Stage::DesignPack.merge_plan() {
            assert!(doc.contains(&format!("## {name}")), "missing {name}");
        }
        assert_eq!(doc.matches(TODO_PLACEHOLDER).count(), 13);
        assert!(sections.iter().all(|s| s.agent == TEMPLATE_AGENT));
        assert!(doc.starts_with("# Design Pack\n"));
    }

    #[test]
    fn context_document_carries_prior_stage_content() {
        let inputs = vec![StageResult {
            stage: Stage::DevelopmentStandards,
            files: vec![],
            sections: vec![Section::new(
                "development-standards",
                "Use rustfmt everywhere.",
                "disk",
            )],
        }];
        let (doc, sections) = context_document(Stage::DesignPack, &inputs);
        assert!(doc.contains("### 0/development-standards"));
        assert!(doc.contains("Use rustfmt everywhere."));
        assert!(sections.iter().all(|s| s.agent == MCP_AGENT));
    }

    #[test]
    fn context_render_is_empty_without_inputs() {
        assert!(render_context(&[]).is_empty());
        let (doc, _) = context_document(Stage::DevelopmentStandards, &[]);
        assert!(!doc.contains("## Context"));
    }
}
