//! Splitting OCR lines into independent text segments.
//!
//! One OCR line may carry several dishes (`Pasta 12.99 Burger 13.49`), items
//! glued by inline delimiters (`Beef Bowl | Salmon Bowl`), or a dish with its
//! price (`Udon - 1,200円`). Each line is cut in three passes, in this order:
//!
//! 1. split on inline delimiters;
//! 2. inside each chunk holding two or more prices, cut after every price;
//! 3. move a trailing price of each chunk into its own segment.
//!
//! Segment geometry is projected from the parent line proportionally to the
//! character offsets of the segment, keeping the line's vertical extent.

use serde::Serialize;

use crate::features::PayloadBBox;
use crate::geometry::{BoundingBox, HasBBox, PolygonCoords};
use crate::input::{LineRecord, canvas_scale};
use crate::lexical::{PRICE_SEPARATORS, SEGMENT_DELIMITER, price_token_ends, trailing_price_start};
use crate::role::{Role, classify_segment};

/// A sub-line text fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Position in the flattened segment list of the whole image.
    pub index: usize,
    pub source_line_index: usize,
    /// Position within the parent line.
    pub segment_order: usize,
    pub text: String,
    pub role_hint: Role,
    /// Projected polygon in source pixel space.
    pub polygon: PolygonCoords,
    pub bbox: BoundingBox,
}

impl HasBBox for Segment {
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

type Range = (usize, usize);

/// Splits every line into segments. Blank lines produce nothing.
pub fn build_segments(lines: &[LineRecord]) -> Vec<Segment> {
    let scale = canvas_scale(lines);
    let mut output = Vec::new();

    for line in lines {
        let text = line.text.as_str();
        let Some((start, end)) = trim_range(text, 0, text.len()) else {
            continue;
        };

        let ranges = split_with_delimiters(text, start, end)
            .into_iter()
            .flat_map(|(s, e)| split_by_repeated_prices(text, s, e))
            .flat_map(|(s, e)| split_out_trailing_price(text, s, e));

        let text_chars = text.chars().count();
        let mut segment_order = 0;
        for (s, e) in ranges {
            let segment_text = text[s..e].trim();
            if segment_text.is_empty() {
                continue;
            }
            let polygon = project_char_range(&line.polygon, text, text_chars, s, e);
            output.push(Segment {
                index: output.len(),
                source_line_index: line.index,
                segment_order,
                text: segment_text.to_string(),
                role_hint: classify_segment(segment_text),
                bbox: scale.normalize(&polygon),
                polygon,
            });
            segment_order += 1;
        }
    }

    output
}

/// Byte range of `text[start..end]` without surrounding whitespace.
fn trim_range(text: &str, start: usize, end: usize) -> Option<Range> {
    let slice = &text[start..end];
    let lead = slice.len() - slice.trim_start().len();
    let inner = slice.trim();
    if inner.is_empty() {
        return None;
    }
    Some((start + lead, start + lead + inner.len()))
}

/// Like [`trim_range`], also dropping separators in front of a price.
fn trim_price_range(text: &str, start: usize, end: usize) -> Option<Range> {
    let (start, end) = trim_range(text, start, end)?;
    let slice = &text[start..end];
    let stripped = slice.trim_start_matches(PRICE_SEPARATORS);
    trim_range(text, start + (slice.len() - stripped.len()), end)
}

fn split_with_delimiters(text: &str, start: usize, end: usize) -> Vec<Range> {
    let mut ranges = Vec::new();
    let mut cursor = start;
    for m in SEGMENT_DELIMITER.find_iter(&text[start..end]) {
        ranges.extend(trim_range(text, cursor, start + m.start()));
        cursor = start + m.end();
    }
    ranges.extend(trim_range(text, cursor, end));
    ranges
}

fn split_by_repeated_prices(text: &str, start: usize, end: usize) -> Vec<Range> {
    let price_ends = price_token_ends(&text[start..end]);
    if price_ends.len() < 2 {
        return vec![(start, end)];
    }

    let mut ranges = Vec::new();
    let mut cursor = start;
    for price_end in price_ends {
        let price_end = start + price_end;
        ranges.extend(trim_range(text, cursor, price_end));
        cursor = price_end;
    }
    ranges.extend(trim_range(text, cursor, end));

    if ranges.len() >= 2 {
        ranges
    } else {
        vec![(start, end)]
    }
}

fn split_out_trailing_price(text: &str, start: usize, end: usize) -> Vec<Range> {
    let Some(offset) = trailing_price_start(&text[start..end]) else {
        return vec![(start, end)];
    };
    let price_start = start + offset;

    let pieces: Vec<Range> = trim_range(text, start, price_start)
        .into_iter()
        .chain(trim_price_range(text, price_start, end))
        .collect();
    if pieces.is_empty() {
        vec![(start, end)]
    } else {
        pieces
    }
}

/// Projects a byte range of the line text onto the line's x-extent.
///
/// Character counts, not glyph widths, drive the projection. A degenerate
/// line extent keeps the full line width; a degenerate segment width is
/// widened to `max(1px, 2% of the line)`.
fn project_char_range(
    line_polygon: &PolygonCoords,
    text: &str,
    text_chars: usize,
    start: usize,
    end: usize,
) -> PolygonCoords {
    let (x_min, y_min, x_max, y_max) = line_polygon.extent();
    if text_chars == 0 || x_max <= x_min {
        return PolygonCoords::rect(x_min, y_min, x_max, y_max);
    }

    let width = x_max - x_min;
    let start_chars = text[..start].chars().count() as f64;
    let end_chars = text[..end].chars().count() as f64;
    let seg_x_min = x_min + width * start_chars / text_chars as f64;
    let mut seg_x_max = x_min + width * end_chars / text_chars as f64;
    if seg_x_max <= seg_x_min {
        seg_x_max = seg_x_min + (width * 0.02).max(1.0);
    }
    PolygonCoords::rect(seg_x_min, y_min, seg_x_max, y_max)
}

/// One entry of the segment-level semantic grouping request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentPayload {
    pub index: usize,
    pub source_line_index: usize,
    pub segment_order: usize,
    pub text: String,
    pub bbox: PayloadBBox,
    pub role_hint: Role,
}

/// Compact segment payload for the semantic grouping pass.
pub fn build_segment_payload(segments: &[Segment]) -> Vec<SegmentPayload> {
    segments
        .iter()
        .map(|segment| SegmentPayload {
            index: segment.index,
            source_line_index: segment.source_line_index,
            segment_order: segment.segment_order,
            text: segment.text.clone(),
            bbox: PayloadBBox::from(&segment.bbox),
            role_hint: segment.role_hint,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Polygon;
    use crate::input::{OcrLine, ingest_lines};

    fn lines(items: &[(&str, (f64, f64, f64, f64))]) -> Vec<LineRecord> {
        ingest_lines(
            items
                .iter()
                .map(|(text, r)| {
                    OcrLine::new(*text, Polygon::Coords(PolygonCoords::rect(r.0, r.1, r.2, r.3)))
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn splits_delimiters_and_trailing_price() {
        let records = lines(&[
            (
                "Beef Bowl with kimchi | Salmon Bowl with ponzu",
                (10.0, 10.0, 510.0, 40.0),
            ),
            ("Udon - 1,200円", (10.0, 50.0, 210.0, 80.0)),
        ]);
        let segments = build_segments(&records);

        let texts: Vec<_> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(
            texts,
            ["Beef Bowl with kimchi", "Salmon Bowl with ponzu", "Udon", "1,200円"]
        );
        let sources: Vec<_> = segments.iter().map(|s| s.source_line_index).collect();
        assert_eq!(sources, [0, 0, 1, 1]);
        let roles: Vec<_> = segments.iter().map(|s| s.role_hint).collect();
        assert_eq!(roles, [Role::Title, Role::Title, Role::Title, Role::Price]);
        assert_eq!(segments[3].segment_order, 1);
        assert_eq!(segments[3].index, 3);
    }

    #[test]
    fn splits_multiple_dishes_on_one_line() {
        let records = lines(&[("Pasta 12.99 Burger 13.49 Salad 9.99", (10.0, 10.0, 610.0, 40.0))]);
        let segments = build_segments(&records);

        let texts: Vec<_> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, ["Pasta", "12.99", "Burger", "13.49", "Salad", "9.99"]);
        let roles: Vec<_> = segments.iter().map(|s| s.role_hint).collect();
        assert_eq!(
            roles,
            [
                Role::Title,
                Role::Price,
                Role::Title,
                Role::Price,
                Role::Title,
                Role::Price
            ]
        );
    }

    #[test]
    fn geometry_follows_character_offsets() {
        let records = lines(&[("Pasta 12.99", (0.0, 0.0, 110.0, 20.0))]);
        let segments = build_segments(&records);

        assert_eq!(segments[0].polygon.extent(), (0.0, 0.0, 50.0, 20.0));
        assert_eq!(segments[1].polygon.extent(), (60.0, 0.0, 110.0, 20.0));
    }

    #[test]
    fn zero_width_lines_keep_their_extent() {
        let records = lines(&[("Tea | Coffee", (40.0, 0.0, 40.0, 20.0))]);
        let segments = build_segments(&records);

        assert_eq!(segments.len(), 2);
        for segment in &segments {
            assert_eq!(segment.polygon.extent(), (40.0, 0.0, 40.0, 20.0));
        }
    }

    #[test]
    fn blank_lines_are_skipped() {
        let records = lines(&[("   ", (0.0, 0.0, 10.0, 10.0)), ("Tea", (0.0, 20.0, 10.0, 30.0))]);
        let segments = build_segments(&records);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].source_line_index, 1);
        assert_eq!(segments[0].index, 0);
    }

    #[test]
    fn single_price_line_stays_whole() {
        let records = lines(&[("12.99", (0.0, 0.0, 50.0, 10.0))]);
        let segments = build_segments(&records);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].role_hint, Role::Price);
    }
}
