//! Two-column page detection.
//!
//! Menus are often printed in two columns. A page is split at the median
//! x-center only when both halves are populated and clearly separated;
//! everything else is one column.

use crate::geometry::HasBBox;
use crate::params::GroupingParams;

/// Column id (0 = left, 1 = right) for every item, in input order.
pub fn resolve_columns<T: HasBBox>(items: &[T], params: &GroupingParams) -> Vec<usize> {
    let single = vec![0; items.len()];
    if items.len() < params.column_min_lines {
        return single;
    }

    let mut centers: Vec<f64> = items.iter().map(HasBBox::x_center).collect();
    centers.sort_by(f64::total_cmp);
    let (Some(&min_x), Some(&max_x)) = (centers.first(), centers.last()) else {
        return single;
    };
    if max_x - min_x < params.column_min_spread {
        return single;
    }

    let median = centers[centers.len() / 2];
    let (left, right): (Vec<f64>, Vec<f64>) = centers.iter().partition(|&&x| x < median);
    if left.len() < 2 || right.len() < 2 {
        return single;
    }

    // Both halves are sorted, so the facing edges are at the seam.
    let left_max = left[left.len() - 1];
    let right_min = right[0];
    if right_min - left_max < params.column_min_gap {
        return single;
    }

    items
        .iter()
        .map(|item| usize::from(item.x_center() >= median))
        .collect()
}

/// Number of distinct columns in a column assignment.
pub fn column_count(columns: &[usize]) -> usize {
    columns.iter().max().map_or(0, |&max| max + 1)
}
