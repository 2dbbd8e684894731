// SPDX-License-Identifier: MIT OR Apache-2.0
//! JSON-RPC 2.0 envelopes, method names, and error codes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The fixed `jsonrpc` version string.
pub const JSONRPC_VERSION: &str = "2.0";

/// Method names of the agent protocol.
pub mod methods {
    /// Submit a message and run a task.
    pub const MESSAGE_SEND: &str = "message/send";
    /// Submit a message and stream task events over SSE.
    pub const MESSAGE_STREAM: &str = "message/stream";
    /// Fetch one task.
    pub const TASKS_GET: &str = "tasks/get";
    /// List tasks with filtering and pagination.
    pub const TASKS_LIST: &str = "tasks/list";
    /// Cancel a non-terminal task.
    pub const TASKS_CANCEL: &str = "tasks/cancel";
}

/// Error codes of the agent protocol.
pub mod codes {
    /// Malformed JSON in the request body.
    pub const PARSE_ERROR: i64 = -32700;
    /// The envelope is not a valid JSON-RPC request.
    pub const INVALID_REQUEST: i64 = -32600;
    /// Unknown method.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Params do not match the method's schema.
    pub const INVALID_PARAMS: i64 = -32602;
    /// The handler returned an error.
    pub const INTERNAL_ERROR: i64 = -32603;
    /// No task with the given id.
    pub const TASK_NOT_FOUND: i64 = -32001;
    /// The task is in a state that cannot be cancelled.
    pub const TASK_NOT_CANCELABLE: i64 = -32002;
}

/// A JSON-RPC caller id: integer, string, or null.
///
/// `Null` appears only in responses to requests whose id could not be
/// recovered (e.g. a parse error).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Integer id.
    Num(i64),
    /// String id.
    Str(String),
    /// Absent / unrecoverable id.
    Null,
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
            Self::Null => f.write_str("null"),
        }
    }
}

/// A JSON-RPC request envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Caller-chosen id echoed in the response.
    pub id: RequestId,
    /// Method name.
    pub method: String,
    /// Opaque parameter blob; decoded per method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    /// Build a request for the given method.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Json`] if the params cannot be
    /// serialized.
    pub fn new(
        id: RequestId,
        method: impl Into<String>,
        params: &impl Serialize,
    ) -> Result<Self, ProtocolError> {
        Ok(Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            method: method.into(),
            params: Some(serde_json::to_value(params)?),
        })
    }

    /// Returns `true` when the envelope carries the correct version tag.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.jsonrpc == JSONRPC_VERSION && !self.method.is_empty()
    }
}

/// The error member of a JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Protocol error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Optional structured detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcError {
    /// An error with no detail payload.
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

/// A JSON-RPC response envelope: exactly one of `result` or `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Echo of the request id (`null` if unrecoverable).
    pub id: RequestId,
    /// Success payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Failure payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// A success response.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Json`] if the result cannot be
    /// serialized.
    pub fn success(id: RequestId, result: &impl Serialize) -> Result<Self, ProtocolError> {
        Ok(Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            result: Some(serde_json::to_value(result)?),
            error: None,
        })
    }

    /// An error response.
    #[must_use]
    pub fn failure(id: RequestId, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Decode the result payload into `T`, or surface the error member.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::Rpc`] when the response carries an error,
    /// [`ProtocolError::MissingResult`] when it carries neither member,
    /// [`ProtocolError::Json`] when the result does not decode as `T`.
    pub fn into_result<T: serde::de::DeserializeOwned>(self) -> Result<T, ProtocolError> {
        if let Some(error) = self.error {
            return Err(ProtocolError::Rpc(error));
        }
        let result = self.result.ok_or(ProtocolError::MissingResult)?;
        Ok(serde_json::from_value(result)?)
    }
}

/// Errors arising from envelope encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// JSON serialization or deserialization failure.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The peer answered with a JSON-RPC error object.
    #[error("rpc error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// The response carried neither `result` nor `error`.
    #[error("response carries neither result nor error")]
    MissingResult,
}
