// SPDX-License-Identifier: MIT OR Apache-2.0
//! Messages and their payload parts.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The calling side (pipeline or human).
    User,
    /// The agent side.
    Agent,
}

/// The payload of a [`Part`] — exactly one of the four shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PartPayload {
    /// Inline UTF-8 text.
    Text {
        /// The text content.
        text: String,
    },
    /// Raw bytes, base64-encoded on the wire.
    Bytes {
        /// Base64-encoded payload.
        bytes: String,
    },
    /// Reference to externally hosted content.
    Uri {
        /// The URL of the content.
        uri: String,
    },
    /// Structured JSON data.
    Data {
        /// The JSON value.
        data: serde_json::Value,
    },
}

/// One payload element of a message or artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    /// The payload; the `kind` tag discriminates on the wire.
    #[serde(flatten)]
    pub payload: PartPayload,
    /// Media type of the payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// Original filename, if the part came from a file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Opaque part-level metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Part {
    /// A plain-text part with media type `text/plain`.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            payload: PartPayload::Text { text: text.into() },
            media_type: Some("text/plain".into()),
            filename: None,
            metadata: None,
        }
    }

    /// A structured-data part with media type `application/json`.
    #[must_use]
    pub fn data(data: serde_json::Value) -> Self {
        Self {
            payload: PartPayload::Data { data },
            media_type: Some("application/json".into()),
            filename: None,
            metadata: None,
        }
    }

    /// The inline text of this part, if it is a text part.
    #[must_use]
    pub fn text_content(&self) -> Option<&str> {
        match &self.payload {
            PartPayload::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// A message exchanged between a caller and an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique message identifier.
    pub message_id: String,
    /// Grouping key shared with the task this message belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    /// Task this message belongs to, once one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    /// Author side.
    pub role: Role,
    /// Ordered payload parts.
    pub parts: Vec<Part>,
    /// Opaque message metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Protocol extension tags in effect for this message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<String>,
    /// Other tasks this message refers to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reference_task_ids: Vec<String>,
}

impl Message {
    /// A user-role message with a fresh id.
    #[must_use]
    pub fn user(parts: Vec<Part>) -> Self {
        Self::new(Role::User, parts)
    }

    /// An agent-role message with a fresh id.
    #[must_use]
    pub fn agent(parts: Vec<Part>) -> Self {
        Self::new(Role::Agent, parts)
    }

    fn new(role: Role, parts: Vec<Part>) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            context_id: None,
            task_id: None,
            role,
            parts,
            metadata: None,
            extensions: Vec::new(),
            reference_task_ids: Vec::new(),
        }
    }

    /// Attach a context id.
    #[must_use]
    pub fn with_context_id(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = Some(context_id.into());
        self
    }

    /// Attach a task id.
    #[must_use]
    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    /// The text of the first text part, if any.
    ///
    /// Skill dispatch in the workers keys off this.
    #[must_use]
    pub fn first_text(&self) -> Option<&str> {
        self.parts.iter().find_map(Part::text_content)
    }
}
