// SPDX-License-Identifier: MIT OR Apache-2.0
//! Agent-card manifest types.
//!
//! An agent card is the self-describing manifest served at
//! `/.well-known/agent-card.json`. Callers use it for discovery and to
//! learn which skills an agent advertises.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{PROTOCOL_BINDING, PROTOCOL_VERSION};

/// One reachable endpoint of an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentInterface {
    /// Base URL of the endpoint.
    pub url: String,
    /// Protocol binding (e.g. `JSONRPC`).
    pub protocol_binding: String,
    /// Protocol version spoken on this interface.
    pub protocol_version: String,
}

impl AgentInterface {
    /// A JSON-RPC interface at the given URL with the current protocol version.
    #[must_use]
    pub fn jsonrpc(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            protocol_binding: PROTOCOL_BINDING.into(),
            protocol_version: PROTOCOL_VERSION.into(),
        }
    }
}

/// The organization behind an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentProvider {
    /// Organization name.
    pub organization: String,
    /// Organization URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Optional protocol features an agent supports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapabilities {
    /// Supports `message/stream` (SSE).
    #[serde(default)]
    pub streaming: bool,
    /// Supports push notifications.
    #[serde(default)]
    pub push_notifications: bool,
}

/// A named capability an agent declares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentSkill {
    /// Stable skill identifier; the dispatch keyword.
    pub id: String,
    /// Display name.
    pub name: String,
    /// What the skill does.
    pub description: String,
    /// Search tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Example invocations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub examples: Option<Vec<String>>,
    /// Skill-specific accepted input media types.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_modes: Option<Vec<String>>,
    /// Skill-specific produced output media types.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_modes: Option<Vec<String>>,
}

impl AgentSkill {
    /// A skill with the given id, using the id as display name.
    #[must_use]
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: description.into(),
            tags: Vec::new(),
            examples: None,
            input_modes: None,
            output_modes: None,
        }
    }

    /// Attach search tags.
    #[must_use]
    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| (*t).to_string()).collect();
        self
    }
}

/// The self-describing manifest an agent serves for discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    /// Agent name.
    pub name: String,
    /// What the agent does.
    pub description: String,
    /// Agent version.
    pub version: String,
    /// Reachable endpoints.
    pub interfaces: Vec<AgentInterface>,
    /// The organization behind the agent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<AgentProvider>,
    /// Optional protocol features.
    #[serde(default)]
    pub capabilities: AgentCapabilities,
    /// Media types accepted when none are given per skill.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default_input_modes: Vec<String>,
    /// Media types produced when none are given per skill.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default_output_modes: Vec<String>,
    /// Skills the agent advertises.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<AgentSkill>,
}

impl AgentCard {
    /// A card with streaming enabled and `text/plain` defaults.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        url: impl Into<String>,
        skills: Vec<AgentSkill>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            version: env!("CARGO_PKG_VERSION").into(),
            interfaces: vec![AgentInterface::jsonrpc(url)],
            provider: None,
            capabilities: AgentCapabilities {
                streaming: true,
                push_notifications: false,
            },
            default_input_modes: vec!["text/plain".into()],
            default_output_modes: vec!["text/plain".into()],
            skills,
        }
    }

    /// Returns `true` when the card advertises a skill with the given id.
    #[must_use]
    pub fn has_skill(&self, id: &str) -> bool {
        self.skills.iter().any(|s| s.id == id)
    }
}
