// SPDX-License-Identifier: MIT OR Apache-2.0
//! Parameter and result shapes of the agent methods.
//!
//! Field names here are the wire names; everything is camelCase.

use chrono::{DateTime, Utc};
use mesh_core::{Message, Task, TaskState};
use serde::{Deserialize, Serialize};

/// Params of `message/send` and `message/stream`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSendParams {
    /// The message to deliver.
    pub message: Message,
    /// Optional delivery configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration: Option<MessageSendConfiguration>,
}

/// Delivery configuration of `message/send`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSendConfiguration {
    /// Media types the caller can consume.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_output_modes: Option<Vec<String>>,
    /// Trim returned history to this many most-recent messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_length: Option<u32>,
    /// `true` to wait for a terminal state before responding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocking: Option<bool>,
}

impl MessageSendParams {
    /// Params with no configuration.
    #[must_use]
    pub fn new(message: Message) -> Self {
        Self {
            message,
            configuration: None,
        }
    }

    /// Params that wait for a terminal state.
    #[must_use]
    pub fn blocking(message: Message) -> Self {
        Self {
            message,
            configuration: Some(MessageSendConfiguration {
                blocking: Some(true),
                ..Default::default()
            }),
        }
    }

    /// Whether the caller asked to wait for a terminal state.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        self.configuration
            .as_ref()
            .and_then(|c| c.blocking)
            .unwrap_or(false)
    }
}

/// Params of `tasks/get`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskQueryParams {
    /// Task id.
    pub id: String,
    /// Trim returned history to this many most-recent messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_length: Option<u32>,
}

/// Params of `tasks/list`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListParams {
    /// Only tasks with this context id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    /// Only tasks in this state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskState>,
    /// Only tasks whose status timestamp is strictly later.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_timestamp_after: Option<DateTime<Utc>>,
    /// Page size; zero or negative returns the full matching set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<i32>,
    /// Id of the last task of the previous page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
    /// Trim each task's history to this many most-recent messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_length: Option<u32>,
    /// `false` to strip artifacts from the listed tasks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_artifacts: Option<bool>,
}

/// Result of `tasks/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListResult {
    /// Tasks of this page, in insertion order.
    pub tasks: Vec<Task>,
    /// Total number of matches across all pages.
    pub total_size: usize,
    /// Token for the next page; empty when exhausted.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub next_page_token: String,
}

/// Params of `tasks/cancel`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskIdParams {
    /// Task id.
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_core::Part;
    use serde_json::json;

    #[test]
    fn send_params_roundtrip() {
        let params = MessageSendParams::blocking(Message::user(vec![Part::text("hello")]));
        let wire = serde_json::to_value(&params).unwrap();
        assert_eq!(wire["configuration"]["blocking"], true);
        let back: MessageSendParams = serde_json::from_value(wire).unwrap();
        assert_eq!(back, params);
        assert!(back.is_blocking());
    }

    #[test]
    fn default_is_not_blocking() {
        let params = MessageSendParams::new(Message::user(vec![]));
        assert!(!params.is_blocking());
    }

    #[test]
    fn list_params_wire_names() {
        let params = TaskListParams {
            context_id: Some("ctx".into()),
            status: Some(TaskState::Completed),
            page_size: Some(2),
            page_token: Some("pg-2".into()),
            ..Default::default()
        };
        let wire = serde_json::to_value(&params).unwrap();
        assert_eq!(wire["contextId"], "ctx");
        assert_eq!(wire["status"], "completed");
        assert_eq!(wire["pageSize"], 2);
        assert_eq!(wire["pageToken"], "pg-2");
        assert!(wire.get("statusTimestampAfter").is_none());
    }

    #[test]
    fn list_result_omits_empty_token() {
        let result = TaskListResult {
            tasks: vec![],
            total_size: 0,
            next_page_token: String::new(),
        };
        let wire = serde_json::to_value(&result).unwrap();
        assert!(wire.get("nextPageToken").is_none());
        let back: TaskListResult = serde_json::from_value(wire).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn query_params_decode_with_missing_optionals() {
        let params: TaskQueryParams = serde_json::from_value(json!({"id": "t-1"})).unwrap();
        assert_eq!(params.id, "t-1");
        assert!(params.history_length.is_none());
    }
}
