// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! mesh-core
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The wire contract is JSON with camelCase field names; every type in
//! this crate round-trips losslessly through `serde_json`. All types
//! are fully owned, so `Clone` is a deep copy.

/// Artifacts produced by agent tasks.
pub mod artifact;
/// Cancellation primitives shared by the client, server, and pipeline.
pub mod cancel;
/// Agent-card manifest types.
pub mod card;
/// Messages and their payload parts.
pub mod message;
/// Pipeline stages, sections, and merge plans.
pub mod stage;
/// Stream events emitted on the SSE channel.
pub mod stream;
/// Tasks and the task state machine.
pub mod task;

pub use artifact::Artifact;
pub use cancel::CancellationToken;
pub use card::{AgentCapabilities, AgentCard, AgentInterface, AgentProvider, AgentSkill};
pub use message::{Message, Part, PartPayload, Role};
pub use stage::{Requirement, Section, Stage, StageResult};
pub use stream::{StreamEvent, StreamItem};
pub use task::{Task, TaskState, TaskStatus};

/// Protocol version string advertised in agent-card interfaces.
///
/// # Examples
///
/// ```
/// assert_eq!(mesh_core::PROTOCOL_VERSION, "0.3.0");
/// ```
pub const PROTOCOL_VERSION: &str = "0.3.0";

/// Protocol binding identifier used in agent-card interfaces.
pub const PROTOCOL_BINDING: &str = "JSONRPC";
