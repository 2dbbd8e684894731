// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pipeline stages, sections, and merge plans.
//!
//! The pipeline runs five stages in order; each produces one Markdown
//! document (stage 4 a family of per-milestone documents) assembled
//! from named sections. The merge plan fixes the section order of the
//! assembled document.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The five pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// Stage 0 — project-wide development standards.
    DevelopmentStandards,
    /// Stage 1 — the design pack.
    DesignPack,
    /// Stage 2 — implementation skeletons.
    ImplementationSkeletons,
    /// Stage 3 — the task index.
    TaskIndex,
    /// Stage 4 — per-milestone task specifications.
    TaskSpecifications,
}

/// Declared section order of the stage-1 design pack.
pub const DESIGN_PACK_PLAN: &[&str] = &[
    "assumptions",
    "platform-baseline",
    "data-model",
    "architecture",
    "features",
    "integrations",
    "security",
    "adrs",
    "pdrs",
    "prd",
    "data-lifecycle",
    "testing",
    "implementation-plan",
];

/// Declared section order of the stage-2 implementation skeletons.
pub const SKELETONS_PLAN: &[&str] = &["data-model-code", "interface-contracts", "documentation"];

/// Declared section order of the stage-3 task index.
pub const TASK_INDEX_PLAN: &[&str] = &["progress", "dependencies", "directory-tree"];

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 5] = [
        Stage::DevelopmentStandards,
        Stage::DesignPack,
        Stage::ImplementationSkeletons,
        Stage::TaskIndex,
        Stage::TaskSpecifications,
    ];

    /// Zero-based stage index.
    #[must_use]
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Stage for a zero-based index.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Stable slug used in file names and error messages.
    #[must_use]
    pub fn slug(&self) -> &'static str {
        match self {
            Self::DevelopmentStandards => "development-standards",
            Self::DesignPack => "design-pack",
            Self::ImplementationSkeletons => "implementation-skeletons",
            Self::TaskIndex => "task-index",
            Self::TaskSpecifications => "task-specifications",
        }
    }

    /// Human-readable stage title used as the document header.
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::DevelopmentStandards => "Development Standards",
            Self::DesignPack => "Design Pack",
            Self::ImplementationSkeletons => "Implementation Skeletons",
            Self::TaskIndex => "Task Index",
            Self::TaskSpecifications => "Task Specifications",
        }
    }

    /// The declared section order of this stage's document.
    #[must_use]
    pub fn merge_plan(&self) -> &'static [&'static str] {
        match self {
            Self::DevelopmentStandards => &["development-standards"],
            Self::DesignPack => DESIGN_PACK_PLAN,
            Self::ImplementationSkeletons => SKELETONS_PLAN,
            Self::TaskIndex => TASK_INDEX_PLAN,
            Self::TaskSpecifications => &["task-specifications"],
        }
    }

    /// Canonical output file name for stages 0–3 (`stage-N-<slug>.md`).
    ///
    /// Stage 4 writes per-milestone `tasks_mNN.md` files instead; see
    /// [`Stage::milestone_file_name`].
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("stage-{}-{}.md", self.index(), self.slug())
    }

    /// Output file name for one stage-4 milestone (`tasks_mNN.md`).
    #[must_use]
    pub fn milestone_file_name(milestone: u32) -> String {
        format!("tasks_m{milestone:02}.md")
    }

    /// Which prior stages this stage needs on disk, and whether a
    /// missing one is fatal.
    #[must_use]
    pub fn prerequisites(&self) -> &'static [(Stage, Requirement)] {
        match self {
            Self::DevelopmentStandards => &[],
            Self::DesignPack => &[(Stage::DevelopmentStandards, Requirement::Optional)],
            Self::ImplementationSkeletons => &[(Stage::DesignPack, Requirement::Required)],
            Self::TaskIndex => &[
                (Stage::DesignPack, Requirement::Required),
                (Stage::ImplementationSkeletons, Requirement::Required),
            ],
            Self::TaskSpecifications => &[(Stage::TaskIndex, Requirement::Required)],
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stage {} ({})", self.index(), self.slug())
    }
}

/// Whether a prerequisite stage must exist on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Missing prerequisite fails the route before the executor runs.
    Required,
    /// Missing prerequisite is logged and skipped.
    Optional,
}

/// The smallest addressable unit of stage output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    /// Section name from the merge plan (or an agent-invented extra).
    pub name: String,
    /// Markdown content of the section.
    pub content: String,
    /// Which agent produced it (`template` / `mcp-local` in fallback).
    pub agent: String,
}

impl Section {
    /// Convenience constructor.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        content: impl Into<String>,
        agent: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            agent: agent.into(),
        }
    }
}

/// The outcome of executing one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StageResult {
    /// Which stage ran.
    pub stage: Stage,
    /// Files the stage wrote, in write order.
    pub files: Vec<PathBuf>,
    /// Sections that make up the stage document.
    pub sections: Vec<Section>,
}
