//! Grouping decisions and their vocabulary.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Serialize, Serializer};

/// How a grouping result was produced.
///
/// The `layout_*` modes belong to the segment-level path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingMode {
    Heuristic,
    Semantic,
    ParseFallback,
    TimeoutFallback,
    ErrorFallback,
    LinesOnly,
    LayoutEmpty,
    LayoutSemantic,
    LayoutParseFallback,
    LayoutTimeoutFallback,
    LayoutErrorFallback,
}

impl GroupingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            GroupingMode::Heuristic => "heuristic",
            GroupingMode::Semantic => "semantic",
            GroupingMode::ParseFallback => "parse_fallback",
            GroupingMode::TimeoutFallback => "timeout_fallback",
            GroupingMode::ErrorFallback => "error_fallback",
            GroupingMode::LinesOnly => "lines_only",
            GroupingMode::LayoutEmpty => "layout_empty",
            GroupingMode::LayoutSemantic => "layout_semantic",
            GroupingMode::LayoutParseFallback => "layout_parse_fallback",
            GroupingMode::LayoutTimeoutFallback => "layout_timeout_fallback",
            GroupingMode::LayoutErrorFallback => "layout_error_fallback",
        }
    }

    /// True for every mode reached by degrading from a failed semantic pass.
    pub fn is_degraded(self) -> bool {
        matches!(
            self,
            GroupingMode::ParseFallback
                | GroupingMode::TimeoutFallback
                | GroupingMode::ErrorFallback
                | GroupingMode::LayoutParseFallback
                | GroupingMode::LayoutTimeoutFallback
                | GroupingMode::LayoutErrorFallback
        )
    }
}

impl fmt::Display for GroupingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the heuristic is unsure about a page.
///
/// Variants are declared in the order of their wire names, so a
/// `BTreeSet<AmbiguousReason>` iterates alphabetically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AmbiguousReason {
    /// A page column produced no description group.
    ColumnHasNoGroups(usize),
    DescriptionFarFromTitle,
    DescriptionWithoutTitle,
    NoDescriptionGroupsDetected,
    UncertainLineType,
}

impl fmt::Display for AmbiguousReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmbiguousReason::ColumnHasNoGroups(column) => {
                write!(f, "column_{column}_has_no_groups")
            }
            AmbiguousReason::DescriptionFarFromTitle => f.write_str("description_far_from_title"),
            AmbiguousReason::DescriptionWithoutTitle => f.write_str("description_without_title"),
            AmbiguousReason::NoDescriptionGroupsDetected => {
                f.write_str("no_description_groups_detected")
            }
            AmbiguousReason::UncertainLineType => f.write_str("uncertain_line_type"),
        }
    }
}

impl Serialize for AmbiguousReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Outcome of a grouping pass over lines or segments.
///
/// `groups` hold item indices: sorted within a group, disjoint across groups.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupingDecision {
    pub mode: GroupingMode,
    pub confidence: f64,
    pub groups: Vec<Vec<usize>>,
    pub ambiguous: bool,
    pub ambiguous_reasons: BTreeSet<AmbiguousReason>,
}

impl GroupingDecision {
    /// A confident decision with no groups.
    pub fn empty(mode: GroupingMode) -> Self {
        Self {
            mode,
            confidence: 1.0,
            groups: Vec::new(),
            ambiguous: false,
            ambiguous_reasons: BTreeSet::new(),
        }
    }

    /// Same decision under a different mode, e.g. after a failed escalation.
    pub fn with_mode(mut self, mode: GroupingMode) -> Self {
        self.mode = mode;
        self
    }

    /// Reasons in their wire spelling.
    pub fn reason_names(&self) -> Vec<String> {
        self.ambiguous_reasons.iter().map(ToString::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_sort_by_wire_name() {
        let reasons: BTreeSet<_> = [
            AmbiguousReason::UncertainLineType,
            AmbiguousReason::DescriptionWithoutTitle,
            AmbiguousReason::ColumnHasNoGroups(1),
            AmbiguousReason::NoDescriptionGroupsDetected,
            AmbiguousReason::DescriptionFarFromTitle,
        ]
        .into_iter()
        .collect();
        let names: Vec<String> = reasons.iter().map(ToString::to_string).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert_eq!(names[0], "column_1_has_no_groups");
    }

    #[test]
    fn decision_serializes_reason_strings() {
        let mut decision = GroupingDecision::empty(GroupingMode::Heuristic);
        decision
            .ambiguous_reasons
            .insert(AmbiguousReason::DescriptionWithoutTitle);
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["mode"], "heuristic");
        assert_eq!(json["ambiguous_reasons"][0], "description_without_title");
    }

    #[test]
    fn mode_names_match_serde() {
        for mode in [
            GroupingMode::TimeoutFallback,
            GroupingMode::LayoutErrorFallback,
            GroupingMode::LinesOnly,
        ] {
            assert_eq!(serde_json::to_value(mode).unwrap(), mode.as_str());
        }
        assert!(GroupingMode::LayoutParseFallback.is_degraded());
        assert!(!GroupingMode::Semantic.is_degraded());
    }
}
