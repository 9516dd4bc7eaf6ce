//! Semantic line washing.
//!
//! After grouping, every remaining line and paragraph can be labelled by a
//! [`SemanticLabeler`] so that branding, addresses and section headers are
//! dropped before dishes are built. Like grouping, washing degrades instead
//! of failing: without usable labels each item falls back to its role hint.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::{LayoutError, Result};
use crate::features::PayloadBBox;
use crate::geometry::{CanvasScale, PolygonCoords};
use crate::role::Role;
use crate::semantic::{RawIndex, bounded, extract_json};
use crate::strategy::GroupingOutput;

/// What an item turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WashLabel {
    DishTitle,
    Description,
    Price,
    NonDish,
    Unknown,
}

impl WashLabel {
    /// Label assumed for an item the labeler skipped.
    pub fn from_role_hint(role_hint: Option<Role>) -> Self {
        match role_hint {
            Some(Role::Price) => WashLabel::Price,
            Some(Role::Description) => WashLabel::Description,
            _ => WashLabel::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Individual,
    Paragraph,
}

/// One line or paragraph offered to the labeler.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WashItem {
    pub content: String,
    pub polygon: PolygonCoords,
    pub source_line_index: Option<usize>,
    pub segment_index: Option<usize>,
    pub role_hint: Option<Role>,
    pub origin: Origin,
}

impl WashItem {
    /// Individual lines first, then paragraphs (as descriptions).
    pub fn from_output(output: &GroupingOutput) -> Vec<WashItem> {
        let individual = output.individual_lines.iter().map(|line| WashItem {
            content: line.content.clone(),
            polygon: line.polygon.clone(),
            source_line_index: Some(line.source_line_index),
            segment_index: line.segment_index,
            role_hint: line.role_hint,
            origin: Origin::Individual,
        });
        let paragraphs = output.paragraphs.iter().map(|paragraph| WashItem {
            content: paragraph.content.clone(),
            polygon: paragraph.polygon.clone(),
            source_line_index: None,
            segment_index: None,
            role_hint: Some(Role::Description),
            origin: Origin::Paragraph,
        });
        individual.chain(paragraphs).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WashPayload {
    pub index: usize,
    pub text: String,
    pub source_line_index: Option<usize>,
    pub segment_index: Option<usize>,
    pub role_hint: Role,
    pub origin: Origin,
    pub bbox: PayloadBBox,
}

/// Wash request payload; boxes are normalized over the items themselves.
pub fn build_wash_payload(items: &[WashItem]) -> Vec<WashPayload> {
    let scale = CanvasScale::from_polygons(items.iter().map(|item| &item.polygon));
    items
        .iter()
        .enumerate()
        .map(|(index, item)| WashPayload {
            index,
            text: item.content.trim().to_string(),
            source_line_index: item.source_line_index,
            segment_index: item.segment_index,
            role_hint: item.role_hint.unwrap_or(Role::Unknown),
            origin: item.origin,
            bbox: PayloadBBox::from(&scale.normalize(&item.polygon)),
        })
        .collect()
}

/// Capability that labels wash payload items. Returns the raw answer.
#[async_trait]
pub trait SemanticLabeler: Send + Sync {
    async fn label(&self, payload: &serde_json::Value) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct WashedResponse {
    #[serde(alias = "Segments")]
    segments: Vec<WashedItem>,
}

#[derive(Debug, Deserialize)]
struct WashedItem {
    index: RawIndex,
    label: WashLabel,
}

/// Decodes a labelling answer into `(index, label)` pairs.
pub fn decode_labels(text: &str) -> Result<Vec<(RawIndex, WashLabel)>> {
    let response: WashedResponse = serde_json::from_str(extract_json(text))
        .map_err(|e| LayoutError::Parse(e.to_string()))?;
    Ok(response
        .segments
        .into_iter()
        .map(|item| (item.index, item.label))
        .collect())
}

/// Keeps the first label of every in-range index.
pub fn validate_labels(
    raw: Vec<(RawIndex, WashLabel)>,
    item_count: usize,
) -> BTreeMap<usize, WashLabel> {
    let mut seen = FxHashSet::default();
    let mut labels = BTreeMap::new();
    for (index, label) in raw {
        let Some(i) = index.to_index().filter(|&i| i < item_count) else {
            let err = LayoutError::Validation {
                index: index.to_string(),
                msg: "out of range",
            };
            warn!(%err, item_count, "dropping wash label");
            continue;
        };
        if !seen.insert(i) {
            let err = LayoutError::Validation {
                index: index.to_string(),
                msg: "already labelled",
            };
            warn!(%err, "dropping wash label");
            continue;
        }
        labels.insert(i, label);
    }
    labels
}

/// Items sorted into buckets by label.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WashPartition {
    /// `dish_title` and `unknown` items.
    pub dish_candidates: Vec<WashItem>,
    pub prices: Vec<WashItem>,
    pub descriptions: Vec<WashItem>,
    pub discarded: Vec<WashItem>,
}

/// Buckets items by label; unlabelled items use their role hint.
pub fn partition_by_label(items: Vec<WashItem>, labels: &BTreeMap<usize, WashLabel>) -> WashPartition {
    let mut partition = WashPartition::default();
    for (i, item) in items.into_iter().enumerate() {
        let label = labels
            .get(&i)
            .copied()
            .unwrap_or_else(|| WashLabel::from_role_hint(item.role_hint));
        match label {
            WashLabel::Price => partition.prices.push(item),
            WashLabel::Description => partition.descriptions.push(item),
            WashLabel::NonDish => partition.discarded.push(item),
            WashLabel::DishTitle | WashLabel::Unknown => partition.dish_candidates.push(item),
        }
    }
    partition
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WashMode {
    WashSemantic,
    WashParseFallback,
    WashTimeoutFallback,
    WashErrorFallback,
    WashEmpty,
}

impl fmt::Display for WashMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WashMode::WashSemantic => "wash_semantic",
            WashMode::WashParseFallback => "wash_parse_fallback",
            WashMode::WashTimeoutFallback => "wash_timeout_fallback",
            WashMode::WashErrorFallback => "wash_error_fallback",
            WashMode::WashEmpty => "wash_empty",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WashOutcome {
    pub mode: WashMode,
    pub labeled_count: usize,
    pub partition: WashPartition,
}

/// Labels `items` within `timeout` and partitions them.
pub async fn wash_lines(
    labeler: &dyn SemanticLabeler,
    items: Vec<WashItem>,
    timeout: Duration,
) -> WashOutcome {
    if items.is_empty() {
        return WashOutcome {
            mode: WashMode::WashEmpty,
            labeled_count: 0,
            partition: WashPartition::default(),
        };
    }

    let item_count = items.len();
    let (mode, labels) = match serde_json::to_value(build_wash_payload(&items)) {
        Ok(payload) => match bounded(labeler.label(&payload), timeout).await {
            Ok(text) => match decode_labels(&text) {
                Ok(raw) => (WashMode::WashSemantic, validate_labels(raw, item_count)),
                Err(err) => {
                    error!(%err, "wash answer rejected");
                    (WashMode::WashParseFallback, BTreeMap::new())
                }
            },
            Err(err @ LayoutError::Timeout(_)) => {
                warn!(%err, "wash abandoned");
                (WashMode::WashTimeoutFallback, BTreeMap::new())
            }
            Err(err @ LayoutError::Parse(_)) => {
                error!(%err, "wash answer rejected");
                (WashMode::WashParseFallback, BTreeMap::new())
            }
            Err(err) => {
                error!(%err, "wash labeler failed");
                (WashMode::WashErrorFallback, BTreeMap::new())
            }
        },
        Err(err) => {
            error!(%err, "wash payload not serializable");
            (WashMode::WashErrorFallback, BTreeMap::new())
        }
    };

    let labeled_count = labels.len();
    let partition = partition_by_label(items, &labels);
    info!(
        mode = %mode,
        line_count = item_count,
        labeled = labeled_count,
        dishes = partition.dish_candidates.len(),
        prices = partition.prices.len(),
        descriptions = partition.descriptions.len(),
        discarded = partition.discarded.len(),
        "wash finished"
    );
    WashOutcome {
        mode,
        labeled_count,
        partition,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(content: &str, role_hint: Role) -> WashItem {
        WashItem {
            content: content.to_string(),
            polygon: PolygonCoords::rect(0.0, 0.0, 10.0, 10.0),
            source_line_index: Some(0),
            segment_index: None,
            role_hint: Some(role_hint),
            origin: Origin::Individual,
        }
    }

    fn contents(items: &[WashItem]) -> Vec<&str> {
        items.iter().map(|item| item.content.as_str()).collect()
    }

    #[test]
    fn labels_route_items_and_discard_non_dish() {
        let items = vec![
            item("Classic Burger", Role::Title),
            item("with pickles and mustard", Role::Description),
            item("$12.99", Role::Price),
            item("OPEN 7AM - 2PM", Role::Unknown),
            item("Chef Choice", Role::Unknown),
        ];
        let labels = BTreeMap::from([
            (0, WashLabel::DishTitle),
            (1, WashLabel::Description),
            (2, WashLabel::Price),
            (3, WashLabel::NonDish),
            (4, WashLabel::Unknown),
        ]);
        let partition = partition_by_label(items, &labels);
        assert_eq!(contents(&partition.dish_candidates), ["Classic Burger", "Chef Choice"]);
        assert_eq!(contents(&partition.prices), ["$12.99"]);
        assert_eq!(contents(&partition.descriptions), ["with pickles and mustard"]);
        assert_eq!(contents(&partition.discarded), ["OPEN 7AM - 2PM"]);
    }

    #[test]
    fn unlabelled_items_follow_role_hint() {
        let items = vec![
            item("Set Menu", Role::Title),
            item("selected daily ingredients", Role::Description),
            item("15.50", Role::Price),
            item("店内写真", Role::Unknown),
        ];
        let partition = partition_by_label(items, &BTreeMap::new());
        assert_eq!(contents(&partition.dish_candidates), ["Set Menu", "店内写真"]);
        assert_eq!(contents(&partition.prices), ["15.50"]);
        assert_eq!(contents(&partition.descriptions), ["selected daily ingredients"]);
        assert!(partition.discarded.is_empty());
    }

    #[test]
    fn label_validation_keeps_first_in_range() {
        let raw = vec![
            (RawIndex::from(0_i64), WashLabel::Price),
            (RawIndex::from(0_i64), WashLabel::NonDish),
            (RawIndex::from(5_i64), WashLabel::Description),
            (RawIndex::from(-1_i64), WashLabel::Unknown),
        ];
        let labels = validate_labels(raw, 2);
        assert_eq!(labels, BTreeMap::from([(0, WashLabel::Price)]));
    }

    #[test]
    fn decodes_segment_labels() {
        let text = r#"```json
{"Segments":[{"index":0,"label":"non_dish"},{"index":1,"label":"dish_title"}]}
```"#;
        assert_eq!(
            decode_labels(text).unwrap(),
            vec![
                (RawIndex::from(0_i64), WashLabel::NonDish),
                (RawIndex::from(1_i64), WashLabel::DishTitle),
            ]
        );
        assert!(decode_labels(r#"{"segments":[{"index":0,"label":"menu"}]}"#).is_err());
    }

    #[test]
    fn oversized_or_loose_indices_keep_the_other_labels() {
        let text = r#"{"segments":[
            {"index":18446744073709551615,"label":"price"},
            {"index":"1","label":"non_dish"},
            {"index":0.0,"label":"dish_title"},
            {"index":1.5,"label":"price"}
        ]}"#;
        let labels = validate_labels(decode_labels(text).unwrap(), 2);
        assert_eq!(
            labels,
            BTreeMap::from([(0, WashLabel::DishTitle), (1, WashLabel::NonDish)])
        );
    }
}
