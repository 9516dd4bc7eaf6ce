//! Re-attaching description and price fragments to dishes.
//!
//! A grouped paragraph or a lone price line is scored against every dish by
//! center distance (lower is better) and attached to the best dish when the
//! score clears the cutoff. Unmatched fragments are dropped.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geometry::{BoundingBox, HasBBox};
use crate::params::FusionParams;

/// A dish as produced by the downstream enrichment step.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DishRecord {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub bbox: BoundingBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
}

impl DishRecord {
    pub fn new(title: impl Into<String>, bbox: BoundingBox) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            bbox,
            price: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    fn append_description(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if self.description.is_empty() {
            self.description = text.to_string();
        } else if !self
            .description
            .to_lowercase()
            .contains(&text.to_lowercase())
        {
            self.description.push(' ');
            self.description.push_str(text);
        }
    }

    fn merge_price(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        match &mut self.price {
            None => self.price = Some(text.to_string()),
            Some(price) if price != text => {
                price.push_str(" / ");
                price.push_str(text);
            }
            Some(_) => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentKind {
    Paragraph,
    Price,
}

/// Text found on the page outside any dish, with its normalized box.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ContextFragment {
    pub kind: FragmentKind,
    pub text: String,
    pub bbox: BoundingBox,
}

impl ContextFragment {
    pub fn paragraph(text: impl Into<String>, bbox: BoundingBox) -> Self {
        Self {
            kind: FragmentKind::Paragraph,
            text: text.into(),
            bbox,
        }
    }

    pub fn price(text: impl Into<String>, bbox: BoundingBox) -> Self {
        Self {
            kind: FragmentKind::Price,
            text: text.into(),
            bbox,
        }
    }
}

/// What fusion did, fragment by fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FusionReport {
    pub paragraphs_attached: usize,
    pub prices_attached: usize,
    pub unmatched: usize,
    /// Dish chosen for each fragment, in fragment order.
    pub assignments: Vec<Option<usize>>,
}

fn paragraph_score(dish: &BoundingBox, fragment: &BoundingBox, params: &FusionParams) -> f64 {
    let dy = fragment.y_center() - dish.y_center();
    let dx = fragment.x_center() - dish.x_center();
    let overlap = dish.horizontal_overlap_ratio(fragment);

    let mut score = params.paragraph_dy_weight * dy.abs()
        + params.paragraph_dx_weight * dx.abs()
        + params.paragraph_overlap_weight * (1.0 - overlap);
    if dy < -params.paragraph_above_margin {
        score += params.paragraph_above_penalty;
    }
    if dy > params.paragraph_far_below_margin {
        score += params.paragraph_far_below_penalty;
    }
    score
}

fn price_score(dish: &BoundingBox, fragment: &BoundingBox, params: &FusionParams) -> f64 {
    let dy = fragment.y_center() - dish.y_center();
    let dx = fragment.x_center() - dish.x_center();

    let mut score = params.price_dy_weight * dy.abs() + params.price_dx_weight * dx.abs();
    if dx < 0.0 {
        score += params.price_left_penalty;
    }
    if dy > params.price_far_below_margin {
        score += params.price_far_below_penalty;
    }
    score
}

/// Lowest-scoring dish under `cutoff`; the first dish wins ties.
fn best_dish(dishes: &[DishRecord], score: impl Fn(&BoundingBox) -> f64, cutoff: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, dish) in dishes.iter().enumerate() {
        let s = score(&dish.bbox);
        if best.is_none_or(|(_, b)| s < b) {
            best = Some((i, s));
        }
    }
    best.filter(|&(_, s)| s < cutoff).map(|(i, _)| i)
}

/// Attaches each fragment to at most one dish, mutating `dishes` in place.
///
/// Fragments are processed in order, so a dish box grown by one fragment is
/// what the next fragment is scored against.
pub fn fuse_context(
    dishes: &mut [DishRecord],
    fragments: &[ContextFragment],
    params: &FusionParams,
) -> FusionReport {
    let mut report = FusionReport::default();

    for fragment in fragments {
        let (target, cutoff) = match fragment.kind {
            FragmentKind::Paragraph => (
                best_dish(dishes, |dish| paragraph_score(dish, &fragment.bbox, params), params.paragraph_cutoff),
                params.paragraph_cutoff,
            ),
            FragmentKind::Price => (
                best_dish(dishes, |dish| price_score(dish, &fragment.bbox, params), params.price_cutoff),
                params.price_cutoff,
            ),
        };
        report.assignments.push(target);

        let Some(i) = target else {
            debug!(kind = ?fragment.kind, text = %fragment.text, cutoff, "fragment left unmatched");
            report.unmatched += 1;
            continue;
        };
        let dish = &mut dishes[i];
        match fragment.kind {
            FragmentKind::Paragraph => {
                dish.append_description(&fragment.text);
                report.paragraphs_attached += 1;
            }
            FragmentKind::Price => {
                dish.merge_price(&fragment.text);
                report.prices_attached += 1;
            }
        }
        dish.bbox = dish.bbox.union(&fragment.bbox);
    }

    debug!(
        paragraphs = report.paragraphs_attached,
        prices = report.prices_attached,
        unmatched = report.unmatched,
        "context fused"
    );
    report
}
