// SPDX-License-Identifier: MIT OR Apache-2.0
//! Base worker: the task state machine around a processing callback.
//!
//! Every specialist shares this scaffold. The worker owns a private
//! [`TaskStore`], implements the server's [`WorkerHandler`] contract,
//! and delegates all domain work to one [`Processor`].

use std::sync::Arc;

use async_trait::async_trait;
use mesh_core::{
    AgentCard, Artifact, Message, Part, StreamEvent, Task, TaskState, TaskStatus,
};
use mesh_protocol::{
    MessageSendParams, TaskIdParams, TaskListParams, TaskListResult, TaskQueryParams,
};
use mesh_server::{HandlerError, WorkerHandler};
use mesh_store::{ListFilter, StoreError, TaskStore};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// The single seam where a specialist plugs in its domain logic.
///
/// Implementations read the task and message and produce artifacts;
/// they never touch the store or the state machine.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Run the task's work and return its artifacts.
    async fn process(&self, task: &Task, message: &Message) -> anyhow::Result<Vec<Artifact>>;
}

/// A worker: card + store + processor behind the handler contract.
pub struct BaseWorker {
    card: AgentCard,
    store: Arc<TaskStore>,
    processor: Arc<dyn Processor>,
}

impl BaseWorker {
    /// Assemble a worker from its card and processor.
    #[must_use]
    pub fn new(card: AgentCard, processor: Arc<dyn Processor>) -> Self {
        Self {
            card,
            store: Arc::new(TaskStore::new()),
            processor,
        }
    }

    /// The worker's private task store (tests and diagnostics).
    #[must_use]
    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    /// Create the task in `submitted`, move it to `working`, and seed
    /// history with the incoming message.
    fn admit(&self, message: &Message) -> Result<Task, HandlerError> {
        let id = message
            .task_id
            .clone()
            .unwrap_or_else(Task::new_id);
        let context_id = message
            .context_id
            .clone()
            .unwrap_or_else(Task::new_id);

        let mut task = Task::submitted(id.clone(), context_id);
        let mut incoming = message.clone();
        incoming.task_id = Some(id.clone());
        task.push_history(incoming);
        self.store.create(task).map_err(store_error)?;

        self.store
            .update(&id, |t| t.status = TaskStatus::now(TaskState::Working))
            .map_err(store_error)
    }

    /// Run the processor and settle the task into a terminal state.
    async fn settle(
        store: &TaskStore,
        processor: &dyn Processor,
        task: Task,
        message: &Message,
    ) -> Result<Task, HandlerError> {
        let id = task.id.clone();
        match processor.process(&task, message).await {
            Ok(artifacts) => {
                debug!(target: "mesh.worker", task = %id, artifacts = artifacts.len(), "task completed");
                store
                    .update(&id, |t| {
                        t.status = TaskStatus::now(TaskState::Completed);
                        t.artifacts = Some(artifacts);
                    })
                    .map_err(store_error)
            }
            Err(e) => {
                let text = e.to_string();
                warn!(target: "mesh.worker", task = %id, error = %text, "task failed");
                store
                    .update(&id, |t| {
                        let mut status = TaskStatus::now(TaskState::Failed);
                        status.message =
                            Some(Message::agent(vec![Part::text(&text)]).with_task_id(&id));
                        t.status = status;
                    })
                    .map_err(store_error)?;
                Err(HandlerError::Internal(e))
            }
        }
    }
}

#[async_trait]
impl WorkerHandler for BaseWorker {
    fn agent_card(&self) -> AgentCard {
        self.card.clone()
    }

    async fn on_message_send(&self, params: MessageSendParams) -> Result<Task, HandlerError> {
        let task = self.admit(&params.message)?;

        if params.is_blocking() {
            let settled =
                Self::settle(&self.store, self.processor.as_ref(), task, &params.message).await?;
            return Ok(shape_task(settled, history_length(&params), true));
        }

        // Non-blocking: settle in the background, answer with the
        // working-state snapshot.
        let store = Arc::clone(&self.store);
        let processor = Arc::clone(&self.processor);
        let message = params.message.clone();
        let snapshot = task.clone();
        tokio::spawn(async move {
            let _ = Self::settle(&store, processor.as_ref(), snapshot, &message).await;
        });
        Ok(shape_task(task, history_length(&params), true))
    }

    async fn on_message_stream(
        &self,
        params: MessageSendParams,
    ) -> Result<mpsc::Receiver<StreamEvent>, HandlerError> {
        let task = self.admit(&params.message)?;
        let (tx, rx) = mpsc::channel(16);

        let store = Arc::clone(&self.store);
        let processor = Arc::clone(&self.processor);
        let message = params.message.clone();
        tokio::spawn(async move {
            let task_id = task.id.clone();
            let context_id = task.context_id.clone();
            let _ = tx
                .send(StreamEvent::StatusUpdate {
                    task_id: task_id.clone(),
                    context_id: context_id.clone(),
                    status: task.status.clone(),
                    is_final: false,
                })
                .await;

            match Self::settle(&store, processor.as_ref(), task, &message).await {
                Ok(settled) => {
                    let artifacts = settled.artifacts.clone().unwrap_or_default();
                    let last = artifacts.len().saturating_sub(1);
                    for (i, artifact) in artifacts.into_iter().enumerate() {
                        let _ = tx
                            .send(StreamEvent::ArtifactUpdate {
                                task_id: task_id.clone(),
                                context_id: context_id.clone(),
                                artifact,
                                append: false,
                                last_chunk: i == last,
                            })
                            .await;
                    }
                    let _ = tx
                        .send(StreamEvent::StatusUpdate {
                            task_id,
                            context_id,
                            status: settled.status,
                            is_final: true,
                        })
                        .await;
                }
                Err(_) => {
                    // The failed status (with the error text) is in the
                    // store; mirror it onto the stream.
                    if let Ok(failed) = store.get(&task_id) {
                        let _ = tx
                            .send(StreamEvent::StatusUpdate {
                                task_id,
                                context_id,
                                status: failed.status,
                                is_final: true,
                            })
                            .await;
                    }
                }
            }
        });
        Ok(rx)
    }

    async fn on_get_task(&self, params: TaskQueryParams) -> Result<Task, HandlerError> {
        let task = self.store.get(&params.id).map_err(store_error)?;
        Ok(shape_task(task, params.history_length, true))
    }

    async fn on_list_tasks(&self, params: TaskListParams) -> Result<TaskListResult, HandlerError> {
        let filter = ListFilter {
            context_id: params.context_id,
            status: params.status,
            status_timestamp_after: params.status_timestamp_after,
            page_size: params.page_size.unwrap_or(0),
            page_token: params.page_token.filter(|t| !t.is_empty()),
        };
        let page = self.store.list(&filter).map_err(store_error)?;
        let include_artifacts = params.include_artifacts.unwrap_or(true);
        Ok(TaskListResult {
            tasks: page
                .tasks
                .into_iter()
                .map(|t| shape_task(t, params.history_length, include_artifacts))
                .collect(),
            total_size: page.total_size,
            next_page_token: page.next_page_token,
        })
    }

    async fn on_cancel_task(&self, params: TaskIdParams) -> Result<Task, HandlerError> {
        // Cancel on a terminal task is a no-op returning the existing
        // state.
        self.store
            .update(&params.id, |t| {
                if !t.is_terminal() {
                    t.status = TaskStatus::now(TaskState::Canceled);
                }
            })
            .map_err(store_error)
    }
}

fn history_length(params: &MessageSendParams) -> Option<u32> {
    params
        .configuration
        .as_ref()
        .and_then(|c| c.history_length)
}

/// Apply the caller's view options to an outgoing task copy.
fn shape_task(mut task: Task, history_length: Option<u32>, include_artifacts: bool) -> Task {
    if let (Some(limit), Some(history)) = (history_length, task.history.as_mut()) {
        let limit = limit as usize;
        if history.len() > limit {
            history.drain(..history.len() - limit);
        }
    }
    if !include_artifacts {
        task.artifacts = None;
    }
    task
}

fn store_error(e: StoreError) -> HandlerError {
    match e {
        StoreError::NotFound(id) => HandlerError::TaskNotFound(id),
        StoreError::InvalidPageToken(token) => {
            // A bad token is a caller fault, not a server fault.
            HandlerError::InvalidParams(format!("invalid page token: {token}"))
        }
        other @ StoreError::AlreadyExists(_) => HandlerError::Internal(anyhow::anyhow!(other)),
    }
}
