// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stream events emitted on the SSE channel.
//!
//! The wire shape is a tagged union — exactly one of four event kinds
//! per frame. [`StreamItem`] is the reader-side envelope that can also
//! carry a transport-level decode failure.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::artifact::Artifact;
use crate::message::Message;
use crate::task::{Task, TaskStatus};

/// One event on a task's stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StreamEvent {
    /// A full task snapshot.
    Task(Task),
    /// A standalone message.
    Message(Message),
    /// The task moved to a new status.
    #[serde(rename_all = "camelCase")]
    StatusUpdate {
        /// Task this update belongs to.
        task_id: String,
        /// Context of the task.
        context_id: String,
        /// The new status.
        status: TaskStatus,
        /// `true` on the last event of the stream.
        #[serde(default, rename = "final", skip_serializing_if = "std::ops::Not::not")]
        is_final: bool,
    },
    /// The task produced (part of) an artifact.
    #[serde(rename_all = "camelCase")]
    ArtifactUpdate {
        /// Task this update belongs to.
        task_id: String,
        /// Context of the task.
        context_id: String,
        /// The artifact payload.
        artifact: Artifact,
        /// `true` when this chunk appends to a previously sent artifact.
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        append: bool,
        /// `true` on the artifact's last chunk.
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        last_chunk: bool,
    },
}

/// Reader-side envelope: a decoded event or a transport failure.
///
/// A malformed frame yields an item with `error` set; the stream then
/// continues with subsequent frames.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamItem {
    /// The decoded event, when the frame parsed.
    pub event: Option<StreamEvent>,
    /// Decode-failure description, when it did not.
    pub error: Option<String>,
}

impl StreamItem {
    /// An item carrying a decoded event.
    #[must_use]
    pub fn event(event: StreamEvent) -> Self {
        Self {
            event: Some(event),
            error: None,
        }
    }

    /// An item carrying a decode failure.
    #[must_use]
    pub fn error(error: impl Into<String>) -> Self {
        Self {
            event: None,
            error: Some(error.into()),
        }
    }
}
