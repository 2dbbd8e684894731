// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! mesh-worker
#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Base worker: the task state machine around a processing callback.
pub mod base;
/// Planning specialist.
pub mod planning;
/// Specialist registry with ordered startup and teardown.
pub mod registry;
/// Research specialist.
pub mod research;
/// Schema specialist.
pub mod schema;
/// Task-writer specialist.
pub mod taskwriter;

pub use base::{BaseWorker, Processor};
pub use planning::{CodeIntel, PlanningProcessor};
pub use registry::{RunningRoster, SpecialistRegistry, SpecialistRole, WorkerConfig};
pub use research::ResearchProcessor;
pub use schema::SchemaProcessor;
pub use taskwriter::TaskWriterProcessor;

/// Pick the first advertised skill keyword present in a message text.
///
/// Skill dispatch keys off the first text part of the incoming
/// message; unknown keywords fall through to the specialist's default
/// behavior.
#[must_use]
pub fn detect_skill<'a>(text: &str, skills: &[&'a str]) -> Option<&'a str> {
    skills.iter().copied().find(|skill| text.contains(skill))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_skill_finds_keyword_anywhere_in_text() {
        let skills = ["explore-codebase", "research-platform"];
        assert_eq!(
            detect_skill("please research-platform for me", &skills),
            Some("research-platform")
        );
        assert_eq!(detect_skill("nothing here", &skills), None);
    }

    #[test]
    fn detect_skill_prefers_declaration_order() {
        let skills = ["translate-schema", "validate-types"];
        assert_eq!(
            detect_skill("translate-schema then validate-types", &skills),
            Some("translate-schema")
        );
    }
}
