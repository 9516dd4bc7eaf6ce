//! Deterministic title/description grouping.
//!
//! Lines are walked top-down inside each column. Titles become the anchor;
//! description lines close enough below the anchor chain into a group.
//! Prices and numeric-only lines never anchor anything.

use std::collections::BTreeSet;

use tracing::debug;

use crate::columns::{column_count, resolve_columns};
use crate::decision::{AmbiguousReason, GroupingDecision, GroupingMode};
use crate::features::LineFeatures;
use crate::geometry::HasBBox;
use crate::params::GroupingParams;
use crate::role::{is_description_candidate, is_title_candidate};

/// Element at `len / 2` of the sorted line heights.
fn median_height(features: &[LineFeatures]) -> f64 {
    let mut heights: Vec<f64> = features.iter().map(HasBBox::height).collect();
    heights.sort_by(f64::total_cmp);
    heights.get(heights.len() / 2).copied().unwrap_or(0.0)
}

/// Group accumulator for one column walk.
#[derive(Default)]
struct Chain {
    current: Vec<usize>,
    last_y: Option<f64>,
    closed: Vec<Vec<usize>>,
}

impl Chain {
    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.closed.push(std::mem::take(&mut self.current));
        }
        self.last_y = None;
    }

    fn push(&mut self, index: usize, y_center: f64, chain_gap: f64) {
        if self.last_y.is_some_and(|last| y_center - last > chain_gap) {
            self.flush();
        }
        self.current.push(index);
        self.last_y = Some(y_center);
    }

    fn finish(mut self) -> Vec<Vec<usize>> {
        self.flush();
        self.closed
    }
}

/// Groups description lines under their titles.
///
/// Pure function of `features` and `params`.
pub fn heuristic_group_lines(features: &[LineFeatures], params: &GroupingParams) -> GroupingDecision {
    if features.is_empty() {
        return GroupingDecision::empty(GroupingMode::Heuristic);
    }

    let column_ids = resolve_columns(features, params);
    let columns = column_count(&column_ids);
    let median = median_height(features);
    let title_gap = params.title_gap(median);
    let chain_gap = params.chain_gap(median);
    debug!(
        lines = features.len(),
        columns, median, title_gap, chain_gap, "heuristic grouping"
    );

    let mut reasons = BTreeSet::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();

    for column in 0..columns {
        let mut ordered: Vec<&LineFeatures> = features
            .iter()
            .zip(&column_ids)
            .filter(|&(_, &id)| id == column)
            .map(|(feature, _)| feature)
            .collect();
        ordered.sort_by(|a, b| a.y_center().total_cmp(&b.y_center()));

        let mut chain = Chain::default();
        let mut anchor: Option<&LineFeatures> = None;

        for feature in ordered {
            if feature.is_numeric_only {
                chain.flush();
                continue;
            }
            if is_title_candidate(feature) {
                chain.flush();
                anchor = Some(feature);
                continue;
            }
            if !is_description_candidate(feature) {
                reasons.insert(AmbiguousReason::UncertainLineType);
                continue;
            }

            let Some(title) = anchor else {
                reasons.insert(AmbiguousReason::DescriptionWithoutTitle);
                chain.flush();
                continue;
            };
            let gap_to_title = feature.y_center() - title.y_center();
            if !(0.0..=title_gap).contains(&gap_to_title) {
                reasons.insert(AmbiguousReason::DescriptionFarFromTitle);
                chain.flush();
                continue;
            }

            chain.push(feature.index, feature.y_center(), chain_gap);
        }

        let column_groups = chain.finish();
        if columns > 1 && column_groups.is_empty() {
            reasons.insert(AmbiguousReason::ColumnHasNoGroups(column));
        }
        groups.extend(column_groups);
    }

    for group in &mut groups {
        group.sort_unstable();
        group.dedup();
    }
    groups.retain(|group| !group.is_empty());

    let ambiguity = reasons.len() as f64 / features.len().max(1) as f64;
    let mut confidence = (1.0 - ambiguity).clamp(0.0, 1.0);
    let mut ambiguous = !reasons.is_empty() || confidence < params.ambiguity_threshold;
    if groups.is_empty() && features.len() > params.empty_result_line_limit {
        ambiguous = true;
        reasons.insert(AmbiguousReason::NoDescriptionGroupsDetected);
        confidence = confidence.min(params.empty_result_confidence_cap);
    }

    GroupingDecision {
        mode: GroupingMode::Heuristic,
        confidence,
        groups,
        ambiguous,
        ambiguous_reasons: reasons,
    }
}

/// Escalate only large, ambiguous pages.
pub fn should_escalate(decision: &GroupingDecision, line_count: usize, threshold: usize) -> bool {
    line_count > threshold && decision.ambiguous
}
