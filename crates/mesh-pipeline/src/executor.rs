// SPDX-License-Identifier: MIT OR Apache-2.0
//! The capability-gated stage executor.
//!
//! Full mode builds per-section agent tasks, fans them out, merges the
//! returned sections, scans coherence, and writes the stage document.
//! Degraded tiers write template or context documents instead.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use mesh_core::{CancellationToken, Message, Part, Section, Stage, StageResult};
use regex::Regex;
use tracing::{info, warn};

use crate::detect::{CapabilityTier, Detection, DetectorConfig};
use crate::fallback::{self, MCP_AGENT, TEMPLATE_AGENT};
use crate::fanout::{AgentTask, fan_out};
use crate::progress::{ProgressReporter, ProgressState};
use crate::router::{Router, StageExecutor};
use crate::{PipelineConfig, PipelineError, coherence, merge, stage_output_path};

/// Default total timeout of one agent call during fan-out.
pub const AGENT_CALL_TIMEOUT: Duration = Duration::from_secs(120);

static MILESTONE_SPLIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^# Task Specifications — Milestone (\d+)").expect("milestone split regex")
});

/// The stage executor: capability-gated full fan-out with fallback.
pub struct Pipeline {
    cfg: PipelineConfig,
    detection: Detection,
    reporter: ProgressReporter,
    cancel: CancellationToken,
    call_timeout: Duration,
}

impl Pipeline {
    /// Assemble an executor from a completed capability detection.
    #[must_use]
    pub fn new(
        cfg: PipelineConfig,
        detection: Detection,
        reporter: ProgressReporter,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            cfg,
            detection,
            reporter,
            cancel,
            call_timeout: AGENT_CALL_TIMEOUT,
        }
    }

    /// Override the per-call agent timeout.
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    fn full_mode(&self) -> bool {
        !self.cfg.single_agent
            && self.detection.tier >= CapabilityTier::A2aMcp
            && !self.detection.agent_endpoints.is_empty()
    }

    /// The lowest stage index absent from the inputs.
    ///
    /// The router always supplies a contiguous prefix. A direct caller
    /// passing a non-contiguous input set gets the lowest missing
    /// index, which may not be what it meant.
    fn infer_stage(inputs: &[StageResult]) -> Result<Stage, PipelineError> {
        let present: Vec<usize> = inputs.iter().map(|r| r.stage.index()).collect();
        Stage::ALL
            .into_iter()
            .find(|stage| !present.contains(&stage.index()))
            .ok_or(PipelineError::NothingToInfer)
    }

    async fn execute_full(
        &self,
        stage: Stage,
        inputs: &[StageResult],
    ) -> Result<StageResult, PipelineError> {
        let context = fallback::render_context(inputs);
        let endpoints = &self.detection.agent_endpoints;

        // Sections are assigned round-robin over the live endpoints.
        let tasks: Vec<AgentTask> = stage
            .merge_plan()
            .iter()
            .enumerate()
            .map(|(i, section)| AgentTask {
                section: (*section).to_string(),
                endpoint: endpoints[i % endpoints.len()].clone(),
                message: section_message(stage, section, &context),
            })
            .collect();

        let (results, first_error) = fan_out(
            stage,
            tasks,
            &self.reporter,
            &self.cancel,
            self.call_timeout,
        )
        .await;
        if let Some(e) = first_error {
            return Err(PipelineError::FanOut(e).for_stage(stage));
        }
        if self.cancel.is_cancelled() {
            return Err(PipelineError::Canceled.for_stage(stage));
        }

        let sections: Vec<Section> = results
            .into_iter()
            .map(|r| {
                let content = r
                    .artifacts
                    .iter()
                    .map(mesh_core::Artifact::text_content)
                    .filter(|text| !text.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n\n");
                Section::new(r.section, content, r.endpoint)
            })
            .collect();

        let body = merge::merge_sections(&sections, stage.merge_plan())
            .map_err(|e| PipelineError::Merge(e).for_stage(stage))?;

        for issue in coherence::check_coherence(&sections) {
            warn!(target: "mesh.pipeline", %stage, %issue, "coherence issue");
        }

        let document = format!("# {}\n\n{body}\n", stage.title());
        let files = self.write_stage(stage, &document)?;
        Ok(StageResult {
            stage,
            files,
            sections,
        })
    }

    fn execute_fallback(&self, stage: Stage, inputs: &[StageResult]) -> Result<StageResult, PipelineError> {
        let (document, sections) = if self.detection.tier >= CapabilityTier::McpOnly {
            fallback::context_document(stage, inputs)
        } else {
            fallback::template_document(stage)
        };
        let agent = if self.detection.tier >= CapabilityTier::McpOnly {
            MCP_AGENT
        } else {
            TEMPLATE_AGENT
        };
        for section in &sections {
            self.reporter
                .section(stage, &section.name, agent, ProgressState::Complete, None);
        }
        let files = self.write_stage(stage, &document)?;
        Ok(StageResult {
            stage,
            files,
            sections,
        })
    }

    /// Write the stage document; stage 4 splits per milestone.
    fn write_stage(
        &self,
        stage: Stage,
        document: &str,
    ) -> Result<Vec<std::path::PathBuf>, PipelineError> {
        std::fs::create_dir_all(&self.cfg.output_dir)?;

        if stage == Stage::TaskSpecifications {
            let mut files = Vec::new();
            for (milestone, chunk) in split_milestones(document) {
                let path = self.cfg.output_dir.join(Stage::milestone_file_name(milestone));
                std::fs::write(&path, chunk)?;
                files.push(path);
            }
            return Ok(files);
        }

        let path = stage_output_path(&self.cfg, stage);
        std::fs::write(&path, document)?;
        Ok(vec![path])
    }
}

#[async_trait]
impl StageExecutor for Pipeline {
    async fn execute(&self, inputs: Vec<StageResult>) -> Result<StageResult, PipelineError> {
        if self.cancel.is_cancelled() {
            return Err(PipelineError::Canceled);
        }
        let stage = Self::infer_stage(&inputs)?;
        info!(
            target: "mesh.pipeline",
            %stage,
            mode = if self.full_mode() { "full" } else { "fallback" },
            tier = %self.detection.tier,
            "executing stage"
        );
        let result = if self.full_mode() {
            self.execute_full(stage, &inputs).await?
        } else {
            self.execute_fallback(stage, &inputs)?
        };
        info!(target: "mesh.pipeline", %stage, files = result.files.len(), "stage written");
        Ok(result)
    }
}

/// Compose the prompt for one section task.
///
/// The first line carries the skill keyword the receiving specialist
/// dispatches on plus the section tag; the rest is the cross-stage
/// context preamble.
fn section_message(stage: Stage, section: &str, context: &str) -> Message {
    let skill = skill_for_section(stage, section);
    let mut text = format!(
        "{skill} section={section} stage={}\n\nProduce the `{section}` section of the {} document.\n",
        stage.slug(),
        stage.title(),
    );
    if !context.is_empty() {
        text.push('\n');
        text.push_str(context);
    }
    Message::user(vec![Part::text(text)])
}

/// Which skill keyword a section request leads with.
///
/// Round-robin assignment means any specialist may receive any
/// section; specialists answer unknown keywords with a generic draft,
/// so this mapping only optimizes the happy path.
fn skill_for_section(stage: Stage, section: &str) -> &'static str {
    match (stage, section) {
        (Stage::DevelopmentStandards, _) => "research-platform",
        (Stage::DesignPack, "platform-baseline") => "research-platform",
        (Stage::DesignPack, "data-model") => "translate-schema",
        (Stage::DesignPack, "integrations") => "research-platform",
        (Stage::DesignPack, "implementation-plan") => "plan-milestones",
        (Stage::DesignPack, _) => "explore-codebase",
        (Stage::ImplementationSkeletons, "data-model-code") => "translate-schema",
        (Stage::ImplementationSkeletons, "interface-contracts") => "write-contracts",
        (Stage::ImplementationSkeletons, _) => "research-platform",
        (Stage::TaskIndex, "progress") => "plan-milestones",
        (Stage::TaskIndex, "dependencies") => "validate-dependencies",
        (Stage::TaskIndex, _) => "explore-codebase",
        (Stage::TaskSpecifications, _) => "write-task-specs",
    }
}

/// Split a stage-4 document into per-milestone chunks.
///
/// Documents without milestone headers land in `tasks_m01.md` whole.
fn split_milestones(document: &str) -> Vec<(u32, String)> {
    let marks: Vec<(usize, u32)> = MILESTONE_SPLIT
        .captures_iter(document)
        .filter_map(|caps| {
            let start = caps.get(0)?.start();
            let milestone = caps[1].parse::<u32>().ok()?;
            Some((start, milestone))
        })
        .collect();

    if marks.len() <= 1 {
        let milestone = marks.first().map_or(1, |(_, m)| *m);
        return vec![(milestone, document.to_string())];
    }

    let mut chunks = Vec::with_capacity(marks.len());
    for (i, (start, milestone)) in marks.iter().enumerate() {
        let end = marks.get(i + 1).map_or(document.len(), |(next, _)| *next);
        chunks.push((*milestone, document[*start..end].to_string()));
    }
    chunks
}

/// Detect capabilities, assemble the pipeline, and route the stage
/// range.
///
/// Returns the successful prefix of stage results and the first
/// failure, if any. Progress events flow to `reporter`'s consumer
/// until the run finishes; the reporter is closed before returning.
pub async fn run_pipeline(
    cfg: PipelineConfig,
    detector: DetectorConfig,
    from: Stage,
    to: Stage,
    reporter: ProgressReporter,
    cancel: CancellationToken,
) -> (Vec<StageResult>, Option<PipelineError>) {
    let detection = crate::detect::detect(&detector).await;
    let pipeline = Pipeline::new(cfg.clone(), detection, reporter.clone(), cancel);
    let mut router = Router::new(cfg);
    router.register_all(std::sync::Arc::new(pipeline));
    let outcome = router.route_range(from, to).await;
    reporter.close();
    outcome
}
