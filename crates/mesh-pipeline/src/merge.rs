// SPDX-License-Identifier: MIT OR Apache-2.0
//! Deterministic section merging.
//!
//! Known sections come first in the declared plan order; extras are
//! appended in input order. Duplicates and missing plan sections are
//! hard errors.

use std::collections::BTreeMap;

use mesh_core::Section;
use thiserror::Error;

/// Separator between merged sections.
pub const SECTION_SEPARATOR: &str = "\n\n---\n\n";

/// Errors from [`merge_sections`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MergeError {
    /// One or more section names appeared more than once.
    #[error("duplicate sections: {0}")]
    Duplicates(String),

    /// One or more plan sections are absent from the input.
    #[error("missing required sections: {0}")]
    Missing(String),
}

/// Compose the stage document body from its sections.
///
/// # Errors
///
/// [`MergeError::Duplicates`] listing every duplicated name with its
/// count, or [`MergeError::Missing`] naming every absent plan section.
pub fn merge_sections(sections: &[Section], plan: &[&str]) -> Result<String, MergeError> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for section in sections {
        *counts.entry(section.name.as_str()).or_insert(0) += 1;
    }

    let duplicates: Vec<String> = counts
        .iter()
        .filter(|(_, n)| **n > 1)
        .map(|(name, n)| format!("{name} ×{n}"))
        .collect();
    if !duplicates.is_empty() {
        return Err(MergeError::Duplicates(duplicates.join(", ")));
    }

    let missing: Vec<&str> = plan
        .iter()
        .copied()
        .filter(|name| !counts.contains_key(name))
        .collect();
    if !missing.is_empty() {
        return Err(MergeError::Missing(missing.join(", ")));
    }

    let mut ordered: Vec<&Section> = Vec::with_capacity(sections.len());
    for name in plan {
        if let Some(section) = sections.iter().find(|s| s.name == *name) {
            ordered.push(section);
        }
    }
    // Extras keep their input order after the plan sections.
    for section in sections {
        if !plan.contains(&section.name.as_str()) {
            ordered.push(section);
        }
    }

    Ok(ordered
        .iter()
        .map(|s| s.content.trim_end())
        .collect::<Vec<_>>()
        .join(SECTION_SEPARATOR))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAN: &[&str] = &["alpha", "beta", "gamma"];

    fn section(name: &str) -> Section {
        Section::new(name, format!("content of {name}"), "test-agent")
    }

    #[test]
    fn out_of_order_input_merges_identically() {
        let in_order = [section("alpha"), section("beta"), section("gamma")];
        let shuffled = [section("gamma"), section("alpha"), section("beta")];
        let a = merge_sections(&in_order, PLAN).unwrap();
        let b = merge_sections(&shuffled, PLAN).unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("content of alpha"));
        assert!(a.ends_with("content of gamma"));
    }

    #[test]
    fn sections_join_with_the_separator() {
        let doc = merge_sections(
            &[section("alpha"), section("beta"), section("gamma")],
            PLAN,
        )
        .unwrap();
        assert_eq!(doc.matches("\n\n---\n\n").count(), 2);
    }

    #[test]
    fn missing_section_is_named() {
        let err = merge_sections(&[section("alpha"), section("gamma")], PLAN).unwrap_err();
        assert_eq!(err, MergeError::Missing("beta".into()));
    }

    #[test]
    fn all_missing_sections_are_listed() {
        let err = merge_sections(&[section("beta")], PLAN).unwrap_err();
        assert_eq!(err, MergeError::Missing("alpha, gamma".into()));
    }

    #[test]
    fn duplicate_sections_are_counted() {
        let err = merge_sections(
            &[
                section("alpha"),
                section("alpha"),
                section("beta"),
                section("gamma"),
                section("beta"),
                section("alpha"),
            ],
            PLAN,
        )
        .unwrap_err();
        assert_eq!(err, MergeError::Duplicates("alpha ×3, beta ×2".into()));
    }

    #[test]
    fn extras_append_in_input_order() {
        let doc = merge_sections(
            &[
                section("zeta"),
                section("gamma"),
                section("alpha"),
                section("epsilon"),
                section("beta"),
            ],
            PLAN,
        )
        .unwrap();
        let zeta = doc.find("content of zeta").unwrap();
        let epsilon = doc.find("content of epsilon").unwrap();
        let gamma = doc.find("content of gamma").unwrap();
        // Plan sections first, then zeta before epsilon.
        assert!(gamma < zeta);
        assert!(zeta < epsilon);
    }

    #[test]
    fn empty_plan_accepts_any_input() {
        let doc = merge_sections(&[section("anything")], &[]).unwrap();
        assert_eq!(doc, "content of anything");
    }
}
