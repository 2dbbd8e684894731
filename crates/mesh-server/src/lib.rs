// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! mesh-server
#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::State,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use mesh_core::{AgentCard, CancellationToken, StreamEvent, Task};
use mesh_protocol::jsonrpc::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId, codes, methods,
};
use mesh_protocol::{
    MessageSendParams, TaskIdParams, TaskListParams, TaskListResult, TaskQueryParams,
};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info};

/// Errors a [`WorkerHandler`] may surface through the wire.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// No task with the given id (`-32001`).
    #[error("task not found: {0}")]
    TaskNotFound(String),

    /// The task cannot be cancelled (`-32002`).
    #[error("task not cancelable: {0}")]
    TaskNotCancelable(String),

    /// The params decoded but were semantically invalid (`-32602`).
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// Anything else (`-32603`).
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl HandlerError {
    fn code(&self) -> i64 {
        match self {
            Self::TaskNotFound(_) => codes::TASK_NOT_FOUND,
            Self::TaskNotCancelable(_) => codes::TASK_NOT_CANCELABLE,
            Self::InvalidParams(_) => codes::INVALID_PARAMS,
            Self::Internal(_) => codes::INTERNAL_ERROR,
        }
    }
}

/// The contract between the agent server and a worker.
///
/// One implementation per agent; the server owns the HTTP surface and
/// delegates every method here.
#[async_trait]
pub trait WorkerHandler: Send + Sync {
    /// The card served at the well-known path.
    fn agent_card(&self) -> AgentCard;

    /// Handle `message/send`.
    async fn on_message_send(&self, params: MessageSendParams) -> Result<Task, HandlerError>;

    /// Handle `message/stream`: run the task while emitting events.
    ///
    /// The returned channel must emit a terminal status update as its
    /// last event and then close.
    async fn on_message_stream(
        &self,
        params: MessageSendParams,
    ) -> Result<mpsc::Receiver<StreamEvent>, HandlerError>;

    /// Handle `tasks/get`.
    async fn on_get_task(&self, params: TaskQueryParams) -> Result<Task, HandlerError>;

    /// Handle `tasks/list`.
    async fn on_list_tasks(&self, params: TaskListParams) -> Result<TaskListResult, HandlerError>;

    /// Handle `tasks/cancel`.
    async fn on_cancel_task(&self, params: TaskIdParams) -> Result<Task, HandlerError>;
}

/// Shared state of the agent HTTP app.
#[derive(Clone)]
pub struct AppState {
    /// The worker behind this endpoint.
    pub handler: Arc<dyn WorkerHandler>,
}

/// Build the axum app with the two protocol routes.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", post(dispatch))
        .route("/.well-known/agent-card.json", get(agent_card))
        .with_state(state)
}

async fn agent_card(State(state): State<AppState>) -> Json<AgentCard> {
    Json(state.handler.agent_card())
}

async fn dispatch(State(state): State<AppState>, body: String) -> Response {
    // Parse failures cannot recover the request id.
    let raw: serde_json::Value = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(e) => {
            return rpc_failure(
                RequestId::Null,
                codes::PARSE_ERROR,
                format!("parse error: {e}"),
            );
        }
    };
    let request: JsonRpcRequest = match serde_json::from_value(raw) {
        Ok(r) => r,
        Err(e) => {
            return rpc_failure(
                RequestId::Null,
                codes::INVALID_REQUEST,
                format!("invalid request: {e}"),
            );
        }
    };
    if !request.is_valid() {
        return rpc_failure(
            request.id,
            codes::INVALID_REQUEST,
            "invalid request: unsupported jsonrpc version",
        );
    }

    let id = request.id.clone();
    let params = request.params.unwrap_or(serde_json::Value::Null);

    match request.method.as_str() {
        methods::MESSAGE_SEND => {
            respond(id, decode(params), |p| state.handler.on_message_send(p)).await
        }
        methods::MESSAGE_STREAM => match decode::<MessageSendParams>(params) {
            Err(e) => rpc_failure(id, codes::INVALID_PARAMS, e),
            Ok(p) => match state.handler.on_message_stream(p).await {
                Err(e) => rpc_failure(id, e.code(), e.to_string()),
                Ok(events) => sse_response(events),
            },
        },
        methods::TASKS_GET => respond(id, decode(params), |p| state.handler.on_get_task(p)).await,
        methods::TASKS_LIST => {
            respond(id, decode(params), |p| state.handler.on_list_tasks(p)).await
        }
        methods::TASKS_CANCEL => {
            respond(id, decode(params), |p| state.handler.on_cancel_task(p)).await
        }
        other => rpc_failure(
            id,
            codes::METHOD_NOT_FOUND,
            format!("method not found: {other}"),
        ),
    }
}

fn decode<P: DeserializeOwned>(params: serde_json::Value) -> Result<P, String> {
    serde_json::from_value(params).map_err(|e| format!("invalid params: {e}"))
}

async fn respond<P, T, F, Fut>(id: RequestId, params: Result<P, String>, run: F) -> Response
where
    T: serde::Serialize,
    F: FnOnce(P) -> Fut,
    Fut: Future<Output = Result<T, HandlerError>>,
{
    let params = match params {
        Ok(p) => p,
        Err(e) => return rpc_failure(id, codes::INVALID_PARAMS, e),
    };
    match run(params).await {
        Ok(value) => match JsonRpcResponse::success(id.clone(), &value) {
            Ok(response) => Json(response).into_response(),
            Err(e) => {
                error!(target: "mesh.server", error = %e, "result serialization failed");
                rpc_failure(id, codes::INTERNAL_ERROR, "result serialization failed")
            }
        },
        Err(e) => rpc_failure(id, e.code(), e.to_string()),
    }
}

fn rpc_failure(id: RequestId, code: i64, message: impl Into<String>) -> Response {
    Json(JsonRpcResponse::failure(id, JsonRpcError::new(code, message))).into_response()
}

fn sse_response(events: mpsc::Receiver<StreamEvent>) -> Response {
    let stream = ReceiverStream::new(events).map(|event| {
        let payload = serde_json::to_string(&event)
            .unwrap_or_else(|e| format!(r#"{{"error":"encode failure: {e}"}}"#));
        Ok::<_, std::convert::Infallible>(SseEvent::default().data(payload))
    });
    Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
}

/// A configured-but-unstarted agent endpoint.
pub struct AgentServer {
    addr: SocketAddr,
    handler: Arc<dyn WorkerHandler>,
}

impl AgentServer {
    /// Bind-to-be server for the given address and worker.
    #[must_use]
    pub fn new(addr: SocketAddr, handler: Arc<dyn WorkerHandler>) -> Self {
        Self { addr, handler }
    }

    /// Bind the listener and start serving.
    ///
    /// # Errors
    ///
    /// Fails when the address cannot be bound.
    pub async fn start(self) -> anyhow::Result<ServerHandle> {
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;
        let app = build_app(AppState {
            handler: self.handler,
        });
        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        let join = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { signal.cancelled().await })
                .await
        });
        info!(target: "mesh.server", addr = %local_addr, "agent listening");
        Ok(ServerHandle {
            addr: local_addr,
            shutdown,
            join,
        })
    }
}

/// Handle to a running agent endpoint.
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: CancellationToken,
    join: JoinHandle<std::io::Result<()>>,
}

impl ServerHandle {
    /// The bound address (useful with port 0).
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL of this endpoint.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Initiate graceful shutdown and wait for the listener to stop.
    ///
    /// # Errors
    ///
    /// Surfaces serve-loop failures.
    pub async fn stop(self) -> anyhow::Result<()> {
        self.shutdown.cancel();
        self.join.await??;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use mesh_core::{Message, Part, TaskState, TaskStatus};
    use serde_json::json;
    use tower::ServiceExt;

    struct EchoHandler;

    #[async_trait]
    impl WorkerHandler for EchoHandler {
        fn agent_card(&self) -> AgentCard {
            AgentCard::new("echo", "echoes text", "http://127.0.0.1:0", vec![])
        }

        async fn on_message_send(
            &self,
            params: MessageSendParams,
        ) -> Result<Task, HandlerError> {
            let mut task = Task::submitted(Task::new_id(), "echo-ctx");
            task.status = TaskStatus::now(TaskState::Completed);
            task.artifacts = Some(vec![mesh_core::Artifact::text(
                "echo",
                params.message.first_text().unwrap_or_default(),
            )]);
            Ok(task)
        }

        async fn on_message_stream(
            &self,
            _params: MessageSendParams,
        ) -> Result<mpsc::Receiver<StreamEvent>, HandlerError> {
            let (tx, rx) = mpsc::channel(4);
            let status = StreamEvent::StatusUpdate {
                task_id: "t".into(),
                context_id: "c".into(),
                status: TaskStatus::now(TaskState::Completed),
                is_final: true,
            };
            tx.send(status).await.ok();
            Ok(rx)
        }

        async fn on_get_task(&self, params: TaskQueryParams) -> Result<Task, HandlerError> {
            Err(HandlerError::TaskNotFound(params.id))
        }

        async fn on_list_tasks(
            &self,
            _params: TaskListParams,
        ) -> Result<TaskListResult, HandlerError> {
            Ok(TaskListResult {
                tasks: vec![],
                total_size: 0,
                next_page_token: String::new(),
            })
        }

        async fn on_cancel_task(&self, params: TaskIdParams) -> Result<Task, HandlerError> {
            Err(HandlerError::TaskNotCancelable(params.id))
        }
    }

    fn app() -> Router {
        build_app(AppState {
            handler: Arc::new(EchoHandler),
        })
    }

    async fn rpc(app: Router, body: serde_json::Value) -> serde_json::Value {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn well_known_route_serves_the_card() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/.well-known/agent-card.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let card: AgentCard = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(card.name, "echo");
    }

    #[tokio::test]
    async fn message_send_dispatches_to_the_handler() {
        let params = MessageSendParams::new(Message::user(vec![Part::text("world")]));
        let reply = rpc(
            app(),
            json!({
                "jsonrpc": "2.0", "id": 1,
                "method": "message/send",
                "params": serde_json::to_value(&params).unwrap(),
            }),
        )
        .await;
        assert_eq!(reply["id"], 1);
        let task: Task = serde_json::from_value(reply["result"].clone()).unwrap();
        assert_eq!(task.status.state, TaskState::Completed);
        assert_eq!(
            task.artifacts.unwrap()[0].parts[0].text_content(),
            Some("world")
        );
    }

    #[tokio::test]
    async fn malformed_body_is_a_parse_error() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .body(Body::from("{nope"))
                    .unwrap(),
            )
            .await
            .unwrap();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let reply: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(reply["error"]["code"], -32700);
        assert!(reply["id"].is_null());
    }

    #[tokio::test]
    async fn wrong_version_is_invalid_request() {
        let reply = rpc(
            app(),
            json!({"jsonrpc": "1.0", "id": 5, "method": "tasks/get", "params": {"id": "x"}}),
        )
        .await;
        assert_eq!(reply["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let reply = rpc(
            app(),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tasks/purge", "params": {}}),
        )
        .await;
        assert_eq!(reply["error"]["code"], -32601);
        assert_eq!(reply["id"], 2);
    }

    #[tokio::test]
    async fn bad_params_are_invalid_params() {
        let reply = rpc(
            app(),
            json!({"jsonrpc": "2.0", "id": 3, "method": "tasks/get", "params": {"wrong": true}}),
        )
        .await;
        assert_eq!(reply["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn handler_task_not_found_maps_to_reserved_code() {
        let reply = rpc(
            app(),
            json!({"jsonrpc": "2.0", "id": 4, "method": "tasks/get", "params": {"id": "task-missing"}}),
        )
        .await;
        assert_eq!(reply["error"]["code"], -32001);
        assert!(
            reply["error"]["message"]
                .as_str()
                .unwrap()
                .contains("task-missing")
        );
    }

    #[tokio::test]
    async fn message_stream_answers_with_event_stream() {
        let params = MessageSendParams::new(Message::user(vec![Part::text("x")]));
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({
                            "jsonrpc": "2.0", "id": 9,
                            "method": "message/stream",
                            "params": serde_json::to_value(&params).unwrap(),
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(content_type.starts_with("text/event-stream"));
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(body.contains("data: "));
        assert!(body.contains("status-update"));
    }
}
