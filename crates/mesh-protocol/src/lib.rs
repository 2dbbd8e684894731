// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! mesh-protocol
#![deny(unsafe_code)]
#![warn(missing_docs)]

/// JSON-RPC 2.0 envelopes, method names, and error codes.
pub mod jsonrpc;
/// Parameter and result shapes of the agent methods.
pub mod methods;
/// Server-Sent-Events framing and incremental decoding.
pub mod sse;

pub use jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, ProtocolError, RequestId};
pub use methods::{
    MessageSendConfiguration, MessageSendParams, TaskIdParams, TaskListParams, TaskListResult,
    TaskQueryParams,
};
pub use sse::{SseDecoder, encode_frame};
