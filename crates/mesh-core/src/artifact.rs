// SPDX-License-Identifier: MIT OR Apache-2.0
//! Artifacts produced by agent tasks.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::Part;

/// A typed output of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Unique artifact identifier.
    pub artifact_id: String,
    /// Short human-readable name (e.g. `codebase-exploration`).
    pub name: String,
    /// Longer description of what the artifact contains.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Ordered payload parts.
    pub parts: Vec<Part>,
    /// Opaque artifact metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Protocol extension tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<String>,
}

impl Artifact {
    /// An artifact with a fresh id and the given name and parts.
    #[must_use]
    pub fn new(name: impl Into<String>, parts: Vec<Part>) -> Self {
        Self {
            artifact_id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: None,
            parts,
            metadata: None,
            extensions: Vec::new(),
        }
    }

    /// A single-text-part artifact.
    #[must_use]
    pub fn text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(name, vec![Part::text(text)])
    }

    /// Attach a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Concatenation of all inline text parts, joined with newlines.
    #[must_use]
    pub fn text_content(&self) -> String {
        self.parts
            .iter()
            .filter_map(Part::text_content)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
