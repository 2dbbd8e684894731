// SPDX-License-Identifier: MIT OR Apache-2.0
//! Concurrent per-section dispatch with first-error cancellation.
//!
//! One tokio task per section, all sharing a cancellation token. The
//! first task error cancels the token; in-flight peers observe it and
//! settle with their own cancellation error. The result vector is
//! index-aligned with the input.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mesh_client::AgentClient;
use mesh_core::{Artifact, CancellationToken, Message, Stage, TaskState};
use mesh_protocol::MessageSendParams;
use thiserror::Error;
use tracing::{debug, warn};

use crate::progress::{ProgressReporter, ProgressState};

/// One unit of fan-out work: a section bound to an agent endpoint.
#[derive(Debug, Clone)]
pub struct AgentTask {
    /// Section this task produces.
    pub section: String,
    /// Agent endpoint assigned to it.
    pub endpoint: String,
    /// The message to send (carries the skill keyword and context).
    pub message: Message,
}

/// Outcome of one fan-out slot; index-aligned with the input tasks.
#[derive(Debug, Clone)]
pub struct AgentResult {
    /// Section tag copied from the task.
    pub section: String,
    /// Endpoint that handled (or was assigned) the task.
    pub endpoint: String,
    /// Terminal state of the remote task, when one came back.
    pub state: Option<TaskState>,
    /// Artifacts of a successful (or partially successful) task.
    pub artifacts: Vec<Artifact>,
    /// Error text of a failed or cancelled slot.
    pub error: Option<String>,
}

/// The first task failure of a fan-out run.
#[derive(Debug, Clone, Error)]
#[error("section `{section}` failed on {endpoint}: {message}")]
pub struct FanOutError {
    /// Section whose task failed.
    pub section: String,
    /// Endpoint that failed it.
    pub endpoint: String,
    /// Error text.
    pub message: String,
}

/// Dispatch every task concurrently in blocking mode.
///
/// Returns the index-aligned results plus the first real task error
/// (cancellation fallout is recorded per slot but never returned as
/// the run error). Waits for every task to settle before returning.
pub async fn fan_out(
    stage: Stage,
    tasks: Vec<AgentTask>,
    reporter: &ProgressReporter,
    cancel: &CancellationToken,
    call_timeout: Duration,
) -> (Vec<AgentResult>, Option<FanOutError>) {
    // One client per distinct endpoint, shared across its tasks.
    let mut clients: HashMap<String, Arc<AgentClient>> = HashMap::new();
    for task in &tasks {
        clients.entry(task.endpoint.clone()).or_insert_with(|| {
            Arc::new(AgentClient::new(task.endpoint.clone()).with_timeout(call_timeout))
        });
    }

    let first_error: Arc<Mutex<Option<FanOutError>>> = Arc::new(Mutex::new(None));
    let mut handles = Vec::with_capacity(tasks.len());

    for task in tasks {
        let client = Arc::clone(&clients[&task.endpoint]);
        let reporter = reporter.clone();
        let cancel = cancel.clone();
        let first_error = Arc::clone(&first_error);
        handles.push(tokio::spawn(async move {
            run_one(stage, task, client, reporter, cancel, first_error).await
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(result) => results.push(result),
            Err(join_err) => {
                // A panicked slot still yields an indexed result.
                warn!(target: "mesh.pipeline", error = %join_err, "fan-out task panicked");
                results.push(AgentResult {
                    section: String::new(),
                    endpoint: String::new(),
                    state: None,
                    artifacts: Vec::new(),
                    error: Some(format!("task panicked: {join_err}")),
                });
            }
        }
    }

    let error = first_error.lock().expect("fan-out lock poisoned").clone();
    (results, error)
}

async fn run_one(
    stage: Stage,
    task: AgentTask,
    client: Arc<AgentClient>,
    reporter: ProgressReporter,
    cancel: CancellationToken,
    first_error: Arc<Mutex<Option<FanOutError>>>,
) -> AgentResult {
    let AgentTask {
        section,
        endpoint,
        message,
    } = task;

    reporter.section(stage, &section, &endpoint, ProgressState::Pending, None);

    if cancel.is_cancelled() {
        reporter.section(
            stage,
            &section,
            &endpoint,
            ProgressState::Failed,
            Some("cancelled before dispatch".into()),
        );
        return AgentResult {
            section,
            endpoint,
            state: None,
            artifacts: Vec::new(),
            error: Some("cancelled before dispatch".into()),
        };
    }

    reporter.section(stage, &section, &endpoint, ProgressState::Working, None);

    let params = MessageSendParams::blocking(message);
    let outcome = tokio::select! {
        () = cancel.cancelled() => Err("cancelled while in flight".to_string()),
        result = client.send_message(&params) => result.map_err(|e| e.to_string()),
    };

    match outcome {
        Ok(remote) => {
            let state = remote.status.state;
            // `input-required` is not an error; its partial artifacts
            // are preserved.
            if state == TaskState::Completed || state == TaskState::InputRequired {
                debug!(target: "mesh.pipeline", %section, %endpoint, %state, "section done");
                reporter.section(stage, &section, &endpoint, ProgressState::Complete, None);
                AgentResult {
                    section,
                    endpoint,
                    state: Some(state),
                    artifacts: remote.artifacts.unwrap_or_default(),
                    error: None,
                }
            } else {
                let message = format!("remote task ended in state {state}");
                record_first_error(&first_error, &section, &endpoint, &message);
                cancel.cancel();
                reporter.section(
                    stage,
                    &section,
                    &endpoint,
                    ProgressState::Failed,
                    Some(message.clone()),
                );
                AgentResult {
                    section,
                    endpoint,
                    state: Some(state),
                    artifacts: Vec::new(),
                    error: Some(message),
                }
            }
        }
        Err(message) => {
            let was_cancellation = message.contains("cancelled while in flight");
            if !was_cancellation {
                record_first_error(&first_error, &section, &endpoint, &message);
                cancel.cancel();
            }
            reporter.section(
                stage,
                &section,
                &endpoint,
                ProgressState::Failed,
                Some(message.clone()),
            );
            AgentResult {
                section,
                endpoint,
                state: None,
                artifacts: Vec::new(),
                error: Some(message),
            }
        }
    }
}

fn record_first_error(
    slot: &Mutex<Option<FanOutError>>,
    section: &str,
    endpoint: &str,
    message: &str,
) {
    let mut guard = slot.lock().expect("fan-out lock poisoned");
    if guard.is_none() {
        *guard = Some(FanOutError {
            section: section.to_string(),
            endpoint: endpoint.to_string(),
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_names_the_section() {
        let err = FanOutError {
            section: "data-model".into(),
            endpoint: "http://127.0.0.1:4101".into(),
            message: "HTTP 500: boom".into(),
        };
        let text = err.to_string();
        assert!(text.contains("`data-model`"));
        assert!(text.contains("4101"));
        assert!(text.contains("boom"));
    }
}
