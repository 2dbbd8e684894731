// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stage routing with on-disk prerequisite resolution.
//!
//! The router reads prior stage documents from the output directory,
//! enforces the required/optional prerequisite rules before the
//! executor runs, and hands the executor every loadable prior stage so
//! it can infer its own stage index from the input set.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use mesh_core::{Requirement, Section, Stage, StageResult};
use tracing::{info, warn};

use crate::{PipelineConfig, PipelineError};

/// Executes one stage given every loadable prior stage.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    /// Produce the stage document; `inputs` are prior stages in index
    /// order.
    async fn execute(&self, inputs: Vec<StageResult>) -> Result<StageResult, PipelineError>;
}

/// Maps stages to executors and resolves prerequisites from disk.
pub struct Router {
    cfg: PipelineConfig,
    executors: HashMap<Stage, Arc<dyn StageExecutor>>,
}

impl Router {
    /// A router with no registered executors.
    #[must_use]
    pub fn new(cfg: PipelineConfig) -> Self {
        Self {
            cfg,
            executors: HashMap::new(),
        }
    }

    /// Register the executor for one stage, replacing any previous one.
    pub fn register(&mut self, stage: Stage, executor: Arc<dyn StageExecutor>) {
        self.executors.insert(stage, executor);
    }

    /// Register one executor for every stage.
    pub fn register_all(&mut self, executor: Arc<dyn StageExecutor>) {
        for stage in Stage::ALL {
            self.executors.insert(stage, Arc::clone(&executor));
        }
    }

    /// Route one stage: resolve prerequisites, then execute.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Prerequisite`] when a required prior document
    /// is missing (the executor is not invoked), or the executor's
    /// failure wrapped with the stage identity.
    pub async fn route(&self, stage: Stage) -> Result<StageResult, PipelineError> {
        let executor = self
            .executors
            .get(&stage)
            .ok_or(PipelineError::NoExecutor(stage))?;

        // Required absence fails fast, before the executor runs.
        for (prereq, requirement) in stage.prerequisites() {
            match load_stage(&self.cfg, *prereq) {
                Ok(_) => {}
                Err(cause) => match requirement {
                    Requirement::Required => {
                        return Err(PipelineError::Prerequisite {
                            stage: prereq.index(),
                            slug: prereq.slug(),
                            cause: cause.to_string(),
                        });
                    }
                    Requirement::Optional => {
                        info!(
                            target: "mesh.pipeline",
                            prerequisite = %prereq,
                            %cause,
                            "optional prerequisite missing; continuing"
                        );
                    }
                },
            }
        }

        // Load every loadable prior stage, beyond the declared
        // prerequisites, so the executor can infer its stage index.
        let mut inputs = Vec::new();
        for index in 0..stage.index() {
            let prior = Stage::from_index(index).expect("prior stage index");
            match load_stage(&self.cfg, prior) {
                Ok(result) => inputs.push(result),
                Err(e) => {
                    warn!(target: "mesh.pipeline", stage = %prior, error = %e, "prior stage not loadable");
                }
            }
        }

        info!(target: "mesh.pipeline", %stage, inputs = inputs.len(), "routing stage");
        executor
            .execute(inputs)
            .await
            .map_err(|e| match e {
                already @ PipelineError::Stage { .. } => already,
                other => other.for_stage(stage),
            })
    }

    /// Route stages `from..=to` in order, halting at the first failure.
    ///
    /// Returns the successful prefix and, when a stage failed, the
    /// wrapped error.
    pub async fn route_range(
        &self,
        from: Stage,
        to: Stage,
    ) -> (Vec<StageResult>, Option<PipelineError>) {
        let mut results = Vec::new();
        for index in from.index()..=to.index() {
            let stage = Stage::from_index(index).expect("stage in range");
            match self.route(stage).await {
                Ok(result) => results.push(result),
                Err(e) => return (results, Some(e)),
            }
        }
        (results, None)
    }
}

/// Load one prior stage's document(s) from the output directory.
///
/// Stages 0–3 read their single `stage-N-<slug>.md`; stage 4 reads
/// every `tasks_m*.md`, one section per milestone file.
pub fn load_stage(cfg: &PipelineConfig, stage: Stage) -> std::io::Result<StageResult> {
    if stage == Stage::TaskSpecifications {
        let mut files: Vec<std::path::PathBuf> = std::fs::read_dir(&cfg.output_dir)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("tasks_m") && n.ends_with(".md"))
            })
            .collect();
        files.sort();
        if files.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no tasks_m*.md files",
            ));
        }
        let mut sections = Vec::new();
        for file in &files {
            let content = std::fs::read_to_string(file)?;
            let name = file
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("tasks")
                .to_string();
            sections.push(Section::new(name, content, "disk"));
        }
        return Ok(StageResult {
            stage,
            files,
            sections,
        });
    }

    let path = cfg.output_dir.join(stage.file_name());
    let content = std::fs::read_to_string(&path)?;
    Ok(StageResult {
        stage,
        files: vec![path],
        sections: vec![Section::new(stage.slug(), content, "disk")],
    })
}
