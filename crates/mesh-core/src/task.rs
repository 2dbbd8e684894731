// SPDX-License-Identifier: MIT OR Apache-2.0
//! Tasks and the task state machine.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::artifact::Artifact;
use crate::message::Message;

/// Lifecycle state of a [`Task`].
///
/// The server moves a task `submitted → working → completed | failed`;
/// `canceled` is reachable from any non-terminal state via
/// `tasks/cancel`. Terminal states never transition further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    /// Accepted by the server, not yet started.
    Submitted,
    /// The processing callback is running.
    Working,
    /// The agent needs more input from the caller to continue.
    InputRequired,
    /// The agent needs credentials to continue.
    AuthRequired,
    /// Finished successfully; artifacts are attached.
    Completed,
    /// The processing callback returned an error.
    Failed,
    /// Cancelled by the caller before reaching a terminal state.
    Canceled,
    /// Refused by the agent without being processed.
    Rejected,
}

impl TaskState {
    /// Returns `true` when no further transition is possible.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Canceled | Self::Rejected
        )
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Submitted => "submitted",
            Self::Working => "working",
            Self::InputRequired => "input-required",
            Self::AuthRequired => "auth-required",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Current state of a task plus when and (optionally) why it got there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    /// The lifecycle state.
    pub state: TaskState,
    /// Status message; on failure this carries the error text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    /// When the task entered this state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl TaskStatus {
    /// Status in the given state, stamped now, with no message.
    #[must_use]
    pub fn now(state: TaskState) -> Self {
        Self {
            state,
            message: None,
            timestamp: Some(Utc::now()),
        }
    }
}

/// A unit of work submitted to an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier; caller-supplied or a generated v4 UUID.
    pub id: String,
    /// Free-form grouping key shared by related tasks.
    pub context_id: String,
    /// Current status.
    pub status: TaskStatus,
    /// Outputs produced so far.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Vec<Artifact>>,
    /// Conversation history, oldest first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<Message>>,
    /// Opaque caller metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Task {
    /// Create a task in `submitted` state, stamped now.
    #[must_use]
    pub fn submitted(id: impl Into<String>, context_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            context_id: context_id.into(),
            status: TaskStatus::now(TaskState::Submitted),
            artifacts: None,
            history: None,
            metadata: None,
        }
    }

    /// Generate a fresh v4 UUID task id.
    #[must_use]
    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Returns `true` when the task is in a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.state.is_terminal()
    }

    /// Append a message to the task history.
    pub fn push_history(&mut self, message: Message) {
        self.history.get_or_insert_with(Vec::new).push(message);
    }
}
