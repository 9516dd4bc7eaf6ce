//! Grouping strategies: from ingested lines to paragraphs and loose lines.
//!
//! Every strategy returns a [`GroupingOutput`]. Semantic failures degrade
//! the output's mode; they are never returned as errors.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use itertools::Itertools;
use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::{debug, info};

use crate::cluster::build_fallback_segment_groups;
use crate::decision::{AmbiguousReason, GroupingMode};
use crate::features::{build_line_features, build_line_payload};
use crate::fusion::ContextFragment;
use crate::geometry::{CanvasScale, PolygonCoords};
use crate::heuristic::{heuristic_group_lines, should_escalate};
use crate::input::LineRecord;
use crate::lexical::is_price_only;
use crate::params::{ClusterParams, GroupingParams, SemanticParams};
use crate::role::{Role, is_description_like};
use crate::segment::{Segment, build_segment_payload, build_segments};
use crate::semantic::{
    Granularity, SemanticGrouper, SemanticOutcome, SemanticRequest, request_semantic_groups,
};

/// Member texts of one group, with the union of their polygons.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paragraph {
    pub content: String,
    pub polygon: PolygonCoords,
}

/// A line or segment that belongs to no paragraph.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndividualLine {
    pub content: String,
    pub polygon: PolygonCoords,
    pub source_line_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_hint: Option<Role>,
}

impl IndividualLine {
    fn from_line(line: &LineRecord) -> Self {
        Self {
            content: line.text.clone(),
            polygon: line.polygon.clone(),
            source_line_index: line.index,
            segment_index: None,
            role_hint: None,
        }
    }

    fn from_segment(segment: &Segment) -> Self {
        Self {
            content: segment.text.clone(),
            polygon: segment.polygon.clone(),
            source_line_index: segment.source_line_index,
            segment_index: Some(segment.index),
            role_hint: Some(segment.role_hint),
        }
    }

    fn is_price(&self) -> bool {
        match self.role_hint {
            Some(role) => role == Role::Price,
            None => is_price_only(&self.content),
        }
    }
}

/// Result of one grouping run over one menu image.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupingOutput {
    pub paragraphs: Vec<Paragraph>,
    pub individual_lines: Vec<IndividualLine>,
    pub mode: GroupingMode,
    pub confidence: f64,
    pub ambiguous_reasons: BTreeSet<AmbiguousReason>,
    pub fallback_clustered: bool,
    /// Source line indices behind each paragraph, in paragraph order.
    pub source_line_groups: Vec<Vec<usize>>,
}

impl GroupingOutput {
    /// Every line untouched, no paragraphs.
    pub fn ungrouped(lines: &[LineRecord], mode: GroupingMode) -> Self {
        Self {
            paragraphs: Vec::new(),
            individual_lines: lines.iter().map(IndividualLine::from_line).collect(),
            mode,
            confidence: 1.0,
            ambiguous_reasons: BTreeSet::new(),
            fallback_clustered: false,
            source_line_groups: Vec::new(),
        }
    }

    /// Paragraphs and price lines as fusion input, boxes normalized by `scale`.
    pub fn context_fragments(&self, scale: &CanvasScale) -> Vec<ContextFragment> {
        let paragraphs = self
            .paragraphs
            .iter()
            .map(|p| ContextFragment::paragraph(p.content.clone(), scale.normalize(&p.polygon)));
        let prices = self
            .individual_lines
            .iter()
            .filter(|line| line.is_price())
            .map(|line| ContextFragment::price(line.content.trim(), scale.normalize(&line.polygon)));
        paragraphs.chain(prices).collect()
    }
}

/// A way of turning one image's lines into a [`GroupingOutput`].
#[async_trait]
pub trait GroupingStrategy: Send + Sync {
    async fn group(&self, lines: &[LineRecord]) -> GroupingOutput;
}

fn log_summary(output: &GroupingOutput, line_count: usize, started: Instant) {
    info!(
        mode = %output.mode,
        line_count,
        paragraphs = output.paragraphs.len(),
        individual = output.individual_lines.len(),
        confidence = format_args!("{:.3}", output.confidence),
        reasons = ?output.ambiguous_reasons,
        fallback_clustered = output.fallback_clustered,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "grouping finished"
    );
}

/// Turns line-index groups into paragraphs; every grouped line leaves the
/// individual list even if its text is blank.
pub fn materialize_line_groups(
    lines: &[LineRecord],
    groups: &[Vec<usize>],
) -> (Vec<Paragraph>, Vec<IndividualLine>, Vec<Vec<usize>>) {
    let mut paragraphs = Vec::new();
    let mut source_groups = Vec::new();
    let mut grouped = FxHashSet::default();

    for group in groups {
        let members: Vec<&LineRecord> = group
            .iter()
            .sorted()
            .filter_map(|&i| lines.get(i))
            .collect();
        grouped.extend(members.iter().map(|line| line.index));

        let content = members
            .iter()
            .map(|line| line.text.trim())
            .filter(|text| !text.is_empty())
            .join(" ");
        if content.is_empty() {
            continue;
        }
        let mut polygon = PolygonCoords::default();
        for line in &members {
            polygon.extend(&line.polygon);
        }
        paragraphs.push(Paragraph { content, polygon });
        source_groups.push(members.iter().map(|line| line.index).collect());
    }

    let individual = lines
        .iter()
        .filter(|line| !grouped.contains(&line.index))
        .map(IndividualLine::from_line)
        .collect();
    (paragraphs, individual, source_groups)
}

/// Paragraph members of a segment group: never prices, and only the
/// description-like members when there are any.
fn select_group_members<'a>(segments: &'a [Segment], group: &[usize]) -> Vec<&'a Segment> {
    let non_price: Vec<&Segment> = group
        .iter()
        .filter_map(|&i| segments.get(i))
        .filter(|s| s.role_hint != Role::Price)
        .collect();
    let descriptions: Vec<&Segment> = non_price
        .iter()
        .copied()
        .filter(|s| is_description_like(s.role_hint, &s.text))
        .collect();
    if descriptions.is_empty() {
        non_price
    } else {
        descriptions
    }
}

/// Segment-level counterpart of [`materialize_line_groups`].
///
/// Only selected members leave the individual list; a price inside a group
/// stays an individual line.
pub fn materialize_segment_groups(
    segments: &[Segment],
    groups: &[Vec<usize>],
) -> (Vec<Paragraph>, Vec<IndividualLine>, Vec<Vec<usize>>) {
    let mut paragraphs = Vec::new();
    let mut source_groups = Vec::new();
    let mut grouped = FxHashSet::default();

    for group in groups {
        let mut members = select_group_members(segments, group);
        members.sort_by_key(|s| (s.source_line_index, s.segment_order, s.index));

        let content = members
            .iter()
            .map(|s| s.text.trim())
            .filter(|text| !text.is_empty())
            .join(" ");
        if content.is_empty() {
            continue;
        }

        let mut polygon = PolygonCoords::default();
        for member in &members {
            polygon.extend(&member.polygon);
        }
        paragraphs.push(Paragraph { content, polygon });
        source_groups.push(members.iter().map(|s| s.source_line_index).unique().collect());
        grouped.extend(members.iter().map(|s| s.index));
    }

    let individual = segments
        .iter()
        .filter(|s| !grouped.contains(&s.index))
        .map(IndividualLine::from_segment)
        .collect();
    (paragraphs, individual, source_groups)
}

/// Geometry-only grouping; never calls out.
#[derive(Debug, Clone, Default)]
pub struct HeuristicStrategy {
    pub params: GroupingParams,
}

impl HeuristicStrategy {
    pub fn new(params: GroupingParams) -> Self {
        Self { params }
    }
}

#[async_trait]
impl GroupingStrategy for HeuristicStrategy {
    async fn group(&self, lines: &[LineRecord]) -> GroupingOutput {
        let started = Instant::now();
        let features = build_line_features(lines);
        let decision = heuristic_group_lines(&features, &self.params);
        let (paragraphs, individual_lines, source_line_groups) =
            materialize_line_groups(lines, &decision.groups);

        let output = GroupingOutput {
            paragraphs,
            individual_lines,
            mode: decision.mode,
            confidence: decision.confidence,
            ambiguous_reasons: decision.ambiguous_reasons,
            fallback_clustered: false,
            source_line_groups,
        };
        log_summary(&output, lines.len(), started);
        output
    }
}

/// Heuristic first; large ambiguous pages escalate to line-level semantic
/// grouping. Without a grouper this is the plain heuristic.
#[derive(Clone)]
pub struct SemanticLinesStrategy {
    pub grouping: GroupingParams,
    pub semantic: SemanticParams,
    grouper: Option<Arc<dyn SemanticGrouper>>,
}

impl SemanticLinesStrategy {
    pub fn new(
        grouping: GroupingParams,
        semantic: SemanticParams,
        grouper: Option<Arc<dyn SemanticGrouper>>,
    ) -> Self {
        Self {
            grouping,
            semantic,
            grouper,
        }
    }
}

#[async_trait]
impl GroupingStrategy for SemanticLinesStrategy {
    async fn group(&self, lines: &[LineRecord]) -> GroupingOutput {
        let started = Instant::now();
        let features = build_line_features(lines);
        let decision = heuristic_group_lines(&features, &self.grouping);

        let escalate = should_escalate(&decision, lines.len(), self.semantic.line_threshold);
        let mut mode = decision.mode;
        let mut groups = decision.groups;
        if let Some(grouper) = &self.grouper
            && escalate
        {
            debug!(lines = lines.len(), "escalating to semantic line grouping");
            let outcome = match SemanticRequest::new(Granularity::Lines, &build_line_payload(&features)) {
                Ok(request) => {
                    request_semantic_groups(
                        grouper.as_ref(),
                        &request,
                        lines.len(),
                        self.semantic.timeout(),
                    )
                    .await
                }
                Err(err) => SemanticOutcome::ProviderFailed(err.to_string()),
            };
            (mode, groups) = match outcome {
                SemanticOutcome::Groups(groups) => (GroupingMode::Semantic, groups),
                SemanticOutcome::ParseFailure => (GroupingMode::ParseFallback, Vec::new()),
                SemanticOutcome::TimedOut => (GroupingMode::TimeoutFallback, Vec::new()),
                SemanticOutcome::ProviderFailed(_) => (GroupingMode::ErrorFallback, Vec::new()),
            };
        }

        let (paragraphs, individual_lines, source_line_groups) =
            materialize_line_groups(lines, &groups);
        let output = GroupingOutput {
            paragraphs,
            individual_lines,
            mode,
            confidence: decision.confidence,
            ambiguous_reasons: decision.ambiguous_reasons,
            fallback_clustered: false,
            source_line_groups,
        };
        log_summary(&output, lines.len(), started);
        output
    }
}

/// Splits lines into segments and lets the semantic grouper group them,
/// clustering geometrically when it returns nothing usable.
#[derive(Clone)]
pub struct SemanticSegmentsStrategy {
    pub semantic: SemanticParams,
    pub cluster: ClusterParams,
    grouper: Arc<dyn SemanticGrouper>,
}

impl SemanticSegmentsStrategy {
    pub fn new(semantic: SemanticParams, cluster: ClusterParams, grouper: Arc<dyn SemanticGrouper>) -> Self {
        Self {
            semantic,
            cluster,
            grouper,
        }
    }
}

#[async_trait]
impl GroupingStrategy for SemanticSegmentsStrategy {
    async fn group(&self, lines: &[LineRecord]) -> GroupingOutput {
        let started = Instant::now();
        let segments = build_segments(lines);
        if segments.is_empty() {
            let output = GroupingOutput::ungrouped(lines, GroupingMode::LayoutEmpty);
            log_summary(&output, lines.len(), started);
            return output;
        }
        debug!(segments = segments.len(), "segment grouping");

        let outcome = match SemanticRequest::new(Granularity::Segments, &build_segment_payload(&segments)) {
            Ok(request) => {
                request_semantic_groups(
                    self.grouper.as_ref(),
                    &request,
                    segments.len(),
                    self.semantic.timeout(),
                )
                .await
            }
            Err(err) => SemanticOutcome::ProviderFailed(err.to_string()),
        };
        let (mode, groups) = match outcome {
            SemanticOutcome::Groups(groups) => (GroupingMode::LayoutSemantic, groups),
            SemanticOutcome::ParseFailure => (GroupingMode::LayoutParseFallback, Vec::new()),
            SemanticOutcome::TimedOut => {
                return degraded(lines, GroupingMode::LayoutTimeoutFallback, started);
            }
            SemanticOutcome::ProviderFailed(_) => {
                return degraded(lines, GroupingMode::LayoutErrorFallback, started);
            }
        };

        let (mut paragraphs, mut individual_lines, mut source_line_groups) =
            materialize_segment_groups(&segments, &groups);
        let mut fallback_clustered = false;
        if source_line_groups.is_empty() && self.semantic.enable_cluster_fallback {
            let clustered = build_fallback_segment_groups(&segments, &self.cluster);
            if !clustered.is_empty() {
                (paragraphs, individual_lines, source_line_groups) =
                    materialize_segment_groups(&segments, &clustered);
                fallback_clustered = true;
            }
        }

        let output = GroupingOutput {
            paragraphs,
            individual_lines,
            mode,
            confidence: if mode == GroupingMode::LayoutSemantic { 1.0 } else { 0.0 },
            ambiguous_reasons: BTreeSet::new(),
            fallback_clustered,
            source_line_groups,
        };
        log_summary(&output, lines.len(), started);
        output
    }
}

/// Original lines untouched, for a segment pass that never got an answer.
fn degraded(lines: &[LineRecord], mode: GroupingMode, started: Instant) -> GroupingOutput {
    let mut output = GroupingOutput::ungrouped(lines, mode);
    output.confidence = 0.0;
    log_summary(&output, lines.len(), started);
    output
}

/// No grouping at all: every line comes back as an individual line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinesOnlyStrategy;

#[async_trait]
impl GroupingStrategy for LinesOnlyStrategy {
    async fn group(&self, lines: &[LineRecord]) -> GroupingOutput {
        let started = Instant::now();
        let output = GroupingOutput::ungrouped(lines, GroupingMode::LinesOnly);
        log_summary(&output, lines.len(), started);
        output
    }
}
