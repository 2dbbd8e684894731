// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! mesh-pipeline
#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::path::PathBuf;

use mesh_core::Stage;
use thiserror::Error;

/// Cross-section dependency-version conflict scan.
pub mod coherence;
/// One-shot environment capability probe.
pub mod detect;
/// The capability-gated stage executor.
pub mod executor;
/// Template and single-agent document generation for degraded tiers.
pub mod fallback;
/// Concurrent per-section dispatch with first-error cancellation.
pub mod fanout;
/// Deterministic section merging.
pub mod merge;
/// Bounded, non-blocking stage progress reporting.
pub mod progress;
/// Stage routing with on-disk prerequisite resolution.
pub mod router;

pub use coherence::{CoherenceIssue, check_coherence};
pub use detect::{CapabilityTier, Detection, DetectorConfig, detect};
pub use executor::{Pipeline, run_pipeline};
pub use fanout::{AgentResult, AgentTask, FanOutError, fan_out};
pub use merge::{MergeError, merge_sections};
pub use progress::{ProgressEvent, ProgressReporter, ProgressState};
pub use router::{Router, StageExecutor};

/// Pipeline-wide configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Where stage documents are written and prerequisites resolved.
    pub output_dir: PathBuf,
    /// Project root handed to the specialists.
    pub project_root: PathBuf,
    /// Force the basic tier regardless of what detection finds.
    pub single_agent: bool,
}

impl PipelineConfig {
    /// Config writing to `output_dir`, reading `project_root`.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>, project_root: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            project_root: project_root.into(),
            single_agent: false,
        }
    }
}

/// Canonical output path of a stage document.
///
/// Stage 4 names its first milestone file; additional milestones land
/// next to it as `tasks_mNN.md`.
#[must_use]
pub fn stage_output_path(cfg: &PipelineConfig, stage: Stage) -> PathBuf {
    match stage {
        Stage::TaskSpecifications => cfg.output_dir.join(Stage::milestone_file_name(1)),
        other => cfg.output_dir.join(other.file_name()),
    }
}

/// Errors produced by the router and the stage executor.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required prerequisite document is missing or unreadable.
    #[error("required prerequisite stage {stage} ({slug}) not satisfied: {cause}")]
    Prerequisite {
        /// Index of the missing prerequisite stage.
        stage: usize,
        /// Slug of the missing prerequisite stage.
        slug: &'static str,
        /// Why resolution failed.
        cause: String,
    },

    /// No executor registered for the stage.
    #[error("no executor registered for {0}")]
    NoExecutor(Stage),

    /// A stage failed; wraps the underlying error with stage context.
    #[error("stage {stage} ({slug}) failed: {source}")]
    Stage {
        /// Index of the failing stage.
        stage: usize,
        /// Slug of the failing stage.
        slug: &'static str,
        /// The underlying failure.
        #[source]
        source: Box<PipelineError>,
    },

    /// The fan-out returned its first task error.
    #[error(transparent)]
    FanOut(#[from] FanOutError),

    /// Section assembly failed.
    #[error(transparent)]
    Merge(#[from] MergeError),

    /// The run was cancelled.
    #[error("pipeline cancelled")]
    Canceled,

    /// The executor inputs already cover every stage.
    #[error("cannot infer stage: all five stages are present in the inputs")]
    NothingToInfer,

    /// Reading or writing a stage document failed.
    #[error("stage file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Wrap this error with the failing stage's identity.
    #[must_use]
    pub fn for_stage(self, stage: Stage) -> Self {
        Self::Stage {
            stage: stage.index(),
            slug: stage.slug(),
            source: Box::new(self),
        }
    }
}
