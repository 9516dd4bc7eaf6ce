//! Geometry-only clustering of description segments.
//!
//! Used when the semantic pass returns no usable groups. Only
//! description-like segments take part; they are bucketed into columns by
//! x-center and split into runs by vertical gap and source-line distance.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::geometry::HasBBox;
use crate::params::ClusterParams;
use crate::role::is_description_like;
use crate::segment::Segment;

/// A column being built: members and the running centroid of their x-centers.
struct Column<'a> {
    members: Vec<&'a Segment>,
    center: f64,
}

impl<'a> Column<'a> {
    fn new(segment: &'a Segment) -> Self {
        Self {
            center: segment.x_center(),
            members: vec![segment],
        }
    }

    fn push(&mut self, segment: &'a Segment) {
        self.members.push(segment);
        self.center =
            self.members.iter().map(|s| s.x_center()).sum::<f64>() / self.members.len() as f64;
    }
}

fn assign_columns<'a>(segments: &[&'a Segment], tolerance: f64) -> Vec<Column<'a>> {
    let mut sorted = segments.to_vec();
    sorted.sort_by(|a, b| a.x_center().total_cmp(&b.x_center()));

    let mut columns: Vec<Column<'a>> = Vec::new();
    for segment in sorted {
        let closest = columns
            .iter()
            .enumerate()
            .map(|(i, column)| (i, (segment.x_center() - column.center).abs()))
            .filter(|&(_, delta)| delta <= tolerance)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i);
        match closest {
            Some(i) => columns[i].push(segment),
            None => columns.push(Column::new(segment)),
        }
    }
    columns
}

/// Groups description-like segments by layout alone.
///
/// Returns sorted, disjoint groups of segment indices, ordered by their
/// topmost then leftmost member.
pub fn build_fallback_segment_groups(segments: &[Segment], params: &ClusterParams) -> Vec<Vec<usize>> {
    let candidates: Vec<&Segment> = segments
        .iter()
        .filter(|s| is_description_like(s.role_hint, &s.text))
        .collect();
    if candidates.is_empty() {
        return Vec::new();
    }

    let mut heights: Vec<f64> = candidates.iter().map(|s| s.height().max(0.0)).collect();
    heights.sort_by(f64::total_cmp);
    let median = heights[heights.len() / 2];
    let max_gap = params.gap_floor.max(median * params.gap_factor);

    let columns = assign_columns(&candidates, params.column_tolerance);
    debug!(
        candidates = candidates.len(),
        columns = columns.len(),
        max_gap,
        "clustering description segments"
    );

    let mut groups: Vec<Vec<usize>> = Vec::new();
    for mut column in columns {
        column.members.sort_by(|a, b| {
            a.y_min()
                .total_cmp(&b.y_min())
                .then(a.source_line_index.cmp(&b.source_line_index))
                .then(a.segment_order.cmp(&b.segment_order))
        });

        let mut current: Vec<usize> = Vec::new();
        let mut previous: Option<&Segment> = None;
        for segment in column.members {
            if let Some(prev) = previous {
                let vertical_gap = segment.y_min() - prev.y_max();
                let line_gap = segment.source_line_index.saturating_sub(prev.source_line_index);
                if vertical_gap > max_gap || line_gap > params.max_source_line_gap {
                    groups.push(std::mem::take(&mut current));
                }
            }
            current.push(segment.index);
            previous = Some(segment);
        }
        groups.push(current);
    }

    for group in &mut groups {
        group.sort_unstable();
        group.dedup();
    }
    groups.retain(|group| !group.is_empty());

    let by_index: FxHashMap<usize, &Segment> = candidates.iter().map(|s| (s.index, *s)).collect();
    let corner = |group: &[usize]| {
        group.iter().filter_map(|i| by_index.get(i)).fold(
            (f64::MAX, f64::MAX),
            |(top, left), s| (top.min(s.y_min()), left.min(s.x_min())),
        )
    };
    groups.sort_by(|a, b| {
        let (a_top, a_left) = corner(a);
        let (b_top, b_left) = corner(b);
        a_top.total_cmp(&b_top).then(a_left.total_cmp(&b_left))
    });
    groups
}
