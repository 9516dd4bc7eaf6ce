//! Per-line geometry and lexical features.

use serde::Serialize;

use crate::geometry::{BoundingBox, HasBBox, round4};
use crate::input::LineRecord;
use crate::lexical::{has_price_like_pattern, is_numeric_only, word_count};

/// Geometry and lexical flags of one ingested line.
#[derive(Debug, Clone, PartialEq)]
pub struct LineFeatures {
    pub index: usize,
    pub text: String,
    pub bbox: BoundingBox,
    pub has_price_like_pattern: bool,
    pub is_numeric_only: bool,
    pub word_count: usize,
}

impl LineFeatures {
    pub fn from_record(record: &LineRecord) -> Self {
        let text = record.text.trim().to_string();
        Self {
            index: record.index,
            has_price_like_pattern: has_price_like_pattern(&text),
            is_numeric_only: is_numeric_only(&text),
            word_count: word_count(&text),
            bbox: record.bbox,
            text,
        }
    }
}

impl HasBBox for LineFeatures {
    fn x_min(&self) -> f64 {
        self.bbox.x_min
    }
    fn x_max(&self) -> f64 {
        self.bbox.x_max
    }
    fn y_min(&self) -> f64 {
        self.bbox.y_min
    }
    fn y_max(&self) -> f64 {
        self.bbox.y_max
    }
}

/// Computes features for every line, in input order.
pub fn build_line_features(lines: &[LineRecord]) -> Vec<LineFeatures> {
    lines.iter().map(LineFeatures::from_record).collect()
}

/// Bounding box as sent to the semantic capability, centers included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayloadBBox {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    pub x_center: f64,
    pub y_center: f64,
}

impl From<&BoundingBox> for PayloadBBox {
    fn from(bbox: &BoundingBox) -> Self {
        Self {
            x_min: round4(bbox.x_min),
            x_max: round4(bbox.x_max),
            y_min: round4(bbox.y_min),
            y_max: round4(bbox.y_max),
            x_center: round4(bbox.x_center()),
            y_center: round4(bbox.y_center()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineFlags {
    pub price_like: bool,
    pub numeric_only: bool,
    pub word_count: usize,
}

/// One entry of the line-level semantic grouping request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinePayload {
    pub index: usize,
    pub text: String,
    pub bbox: PayloadBBox,
    pub flags: LineFlags,
}

/// Compact line payload for the semantic grouping pass.
pub fn build_line_payload(features: &[LineFeatures]) -> Vec<LinePayload> {
    features
        .iter()
        .map(|feature| LinePayload {
            index: feature.index,
            text: feature.text.clone(),
            bbox: PayloadBBox::from(&feature.bbox),
            flags: LineFlags {
                price_like: feature.has_price_like_pattern,
                numeric_only: feature.is_numeric_only,
                word_count: feature.word_count,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Polygon, PolygonCoords};
    use crate::input::{OcrLine, ingest_lines};

    fn record(text: &str, rect: (f64, f64, f64, f64)) -> OcrLine {
        OcrLine::new(
            text,
            Polygon::Coords(PolygonCoords::rect(rect.0, rect.1, rect.2, rect.3)),
        )
    }

    #[test]
    fn features_flag_prices_and_numbers() {
        let lines = ingest_lines(vec![
            record("12.5", (10.0, 10.0, 60.0, 30.0)),
            record("  Margherita - 12 ", (10.0, 40.0, 220.0, 60.0)),
            record("Fresh basil and tomato", (10.0, 70.0, 200.0, 90.0)),
        ])
        .unwrap();
        let features = build_line_features(&lines);

        assert!(features[0].is_numeric_only);
        assert!(features[0].has_price_like_pattern);
        assert_eq!(features[1].text, "Margherita - 12");
        assert!(features[1].has_price_like_pattern);
        assert!(!features[1].is_numeric_only);
        assert_eq!(features[2].word_count, 4);
        assert!(!features[2].has_price_like_pattern);
    }

    #[test]
    fn payload_rounds_to_four_places() {
        let lines = ingest_lines(vec![record("Tea", (1.0, 1.0, 2.0, 2.0)), record(
            "Coffee",
            (0.0, 0.0, 3.0, 3.0),
        )])
        .unwrap();
        let payload = build_line_payload(&build_line_features(&lines));
        assert_eq!(payload[0].bbox.x_min, 0.3333);
        assert_eq!(payload[0].bbox.x_center, 0.5);
        assert_eq!(payload[1].flags.word_count, 1);
    }
}
