// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! mesh-client
#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use futures::StreamExt;
use mesh_core::{AgentCard, CancellationToken, StreamItem, Task};
use mesh_protocol::jsonrpc::{self, JsonRpcRequest, JsonRpcResponse, ProtocolError, RequestId};
use mesh_protocol::{
    MessageSendParams, SseDecoder, TaskIdParams, TaskListParams, TaskListResult, TaskQueryParams,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

/// Well-known path serving the agent card.
pub const AGENT_CARD_PATH: &str = "/.well-known/agent-card.json";

/// Default total per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Errors returned by [`AgentClient`] calls.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered outside the 2xx range; no JSON-RPC error
    /// object is available.
    #[error("HTTP {status}: {body}")]
    Transport {
        /// HTTP status code.
        status: u16,
        /// Response body text.
        body: String,
    },

    /// The server answered with a JSON-RPC error object.
    #[error("{method} failed with code {code}: {message}")]
    Rpc {
        /// Method that failed.
        method: String,
        /// JSON-RPC error code.
        code: i64,
        /// Human-readable message.
        message: String,
        /// Optional structured detail.
        data: Option<serde_json::Value>,
    },

    /// The HTTP request itself failed (connect, timeout, ...).
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body did not decode.
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The response envelope was structurally invalid.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Outbound JSON-RPC client for one agent endpoint.
///
/// Call ids are monotonically numbered from 1 per client instance.
pub struct AgentClient {
    base_url: String,
    http: reqwest::Client,
    timeout: Duration,
    next_id: AtomicI64,
}

impl AgentClient {
    /// A client for the given base URL; trailing slashes are tolerated.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            http: reqwest::Client::new(),
            timeout: DEFAULT_TIMEOUT,
            next_id: AtomicI64::new(1),
        }
    }

    /// Override the total per-call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the underlying HTTP engine.
    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// The normalized base URL this client talks to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submit a message and return the resulting task.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn send_message(&self, params: &MessageSendParams) -> Result<Task, ClientError> {
        self.call(jsonrpc::methods::MESSAGE_SEND, params).await
    }

    /// Fetch one task.
    ///
    /// # Errors
    ///
    /// See [`ClientError`]; a missing task surfaces as
    /// [`ClientError::Rpc`] with code `-32001`.
    pub async fn get_task(&self, params: &TaskQueryParams) -> Result<Task, ClientError> {
        self.call(jsonrpc::methods::TASKS_GET, params).await
    }

    /// List tasks with filtering and pagination.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn list_tasks(&self, params: &TaskListParams) -> Result<TaskListResult, ClientError> {
        self.call(jsonrpc::methods::TASKS_LIST, params).await
    }

    /// Cancel a task; a no-op on terminal tasks.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn cancel_task(&self, params: &TaskIdParams) -> Result<Task, ClientError> {
        self.call(jsonrpc::methods::TASKS_CANCEL, params).await
    }

    /// Fetch the agent card from the well-known path.
    ///
    /// # Errors
    ///
    /// [`ClientError::Transport`] on a non-2xx response,
    /// [`ClientError::Decode`] when the body is not a card.
    pub async fn discover_agent(&self) -> Result<AgentCard, ClientError> {
        let url = format!("{}{AGENT_CARD_PATH}", self.base_url);
        debug!(target: "mesh.client", %url, "discovering agent");
        let response = self.http.get(&url).timeout(self.timeout).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::Transport {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Submit a message via `message/stream` and receive the task's
    /// events as they happen.
    ///
    /// The returned channel yields one [`StreamItem`] per SSE frame
    /// and closes when the server ends the stream or `cancel` fires.
    /// The reader task owns the response body and drops it on exit.
    ///
    /// # Errors
    ///
    /// Fails like any call if the HTTP exchange cannot be established.
    pub async fn subscribe_to_task(
        &self,
        params: &MessageSendParams,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<StreamItem>, ClientError> {
        let request = self.request(jsonrpc::methods::MESSAGE_STREAM, params)?;
        let response = self
            .http
            .post(&self.base_url)
            .json(&request)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(ClientError::Transport {
                status: status.as_u16(),
                body,
            });
        }

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            let mut decoder = SseDecoder::new();
            let mut body = response.bytes_stream();
            loop {
                let chunk = tokio::select! {
                    () = cancel.cancelled() => break,
                    chunk = body.next() => chunk,
                };
                match chunk {
                    Some(Ok(bytes)) => {
                        for item in decoder.feed(&bytes) {
                            if tx.send(item).await.is_err() {
                                return;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        let _ = tx.send(StreamItem::error(format!("stream error: {e}"))).await;
                        break;
                    }
                    None => break,
                }
            }
            if let Some(item) = decoder.finish() {
                let _ = tx.send(item).await;
            }
            // Dropping `body` (and with it the response) closes the
            // connection; dropping `tx` closes the channel.
        });
        Ok(rx)
    }

    fn request(
        &self,
        method: &str,
        params: &impl Serialize,
    ) -> Result<JsonRpcRequest, ClientError> {
        let id = RequestId::Num(self.next_id.fetch_add(1, Ordering::Relaxed));
        JsonRpcRequest::new(id, method, params).map_err(|e| match e {
            ProtocolError::Json(e) => ClientError::Decode(e),
            other => ClientError::Protocol(other.to_string()),
        })
    }

    async fn call<P: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        params: &P,
    ) -> Result<T, ClientError> {
        let request = self.request(method, params)?;
        debug!(target: "mesh.client", %method, id = %request.id, url = %self.base_url, "rpc call");

        let response = self
            .http
            .post(&self.base_url)
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::Transport {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: JsonRpcResponse = serde_json::from_str(&body)?;
        match envelope.into_result::<T>() {
            Ok(value) => Ok(value),
            Err(ProtocolError::Rpc(e)) => Err(ClientError::Rpc {
                method: method.to_string(),
                code: e.code,
                message: e.message,
                data: e.data,
            }),
            Err(ProtocolError::Json(e)) => Err(ClientError::Decode(e)),
            Err(other) => Err(ClientError::Protocol(other.to_string())),
        }
    }
}

impl std::fmt::Debug for AgentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slashes_are_stripped() {
        let client = AgentClient::new("http://127.0.0.1:4100///");
        assert_eq!(client.base_url(), "http://127.0.0.1:4100");
    }

    #[test]
    fn builder_overrides() {
        let client = AgentClient::new("http://x").with_timeout(Duration::from_secs(3));
        assert_eq!(client.timeout, Duration::from_secs(3));
    }

    #[test]
    fn call_ids_start_at_one_and_increase() {
        let client = AgentClient::new("http://x");
        let a = client.request("tasks/get", &serde_json::json!({})).unwrap();
        let b = client.request("tasks/get", &serde_json::json!({})).unwrap();
        assert_eq!(a.id, RequestId::Num(1));
        assert_eq!(b.id, RequestId::Num(2));
    }

    #[test]
    fn transport_error_display() {
        let err = ClientError::Transport {
            status: 503,
            body: "unavailable".into(),
        };
        assert_eq!(err.to_string(), "HTTP 503: unavailable");
    }
}
