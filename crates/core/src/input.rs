//! OCR line ingestion.
//!
//! Turns wire-level `OcrLine`s into immutable `LineRecord`s: polygons are
//! normalized into paired coordinates and every line gets its bbox in the
//! shared [0, 1] image space.

use serde::{Deserialize, Serialize};

use crate::error::{LayoutError, Result};
use crate::geometry::{BoundingBox, CanvasScale, HasBBox, Polygon, PolygonCoords};

/// One OCR-detected text line as delivered by the extraction service.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OcrLine {
    pub content: String,
    pub polygon: Polygon,
}

impl OcrLine {
    pub fn new(content: impl Into<String>, polygon: Polygon) -> Self {
        Self {
            content: content.into(),
            polygon,
        }
    }
}

/// An ingested line. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineRecord {
    pub index: usize,
    pub text: String,
    pub polygon: PolygonCoords,
    pub bbox: BoundingBox,
}

impl HasBBox for LineRecord {
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

/// Normalizes every polygon once and assigns positional indices.
pub fn ingest_lines(lines: Vec<OcrLine>) -> Result<Vec<LineRecord>> {
    let polygons = lines
        .iter()
        .enumerate()
        .map(|(index, line)| line.polygon.clone().into_coords(index))
        .collect::<Result<Vec<_>>>()?;
    let scale = CanvasScale::from_polygons(&polygons);

    Ok(lines
        .into_iter()
        .zip(polygons)
        .enumerate()
        .map(|(index, (line, polygon))| LineRecord {
            index,
            bbox: scale.normalize(&polygon),
            text: line.content,
            polygon,
        })
        .collect())
}

/// Canvas scale of an already-ingested image.
pub fn canvas_scale(lines: &[LineRecord]) -> CanvasScale {
    CanvasScale::from_polygons(lines.iter().map(|line| &line.polygon))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OcrDocument {
    Lines(Vec<OcrLine>),
    Analyze {
        #[serde(rename = "analyzeResult")]
        analyze_result: AnalyzeResult,
    },
}

#[derive(Deserialize)]
struct AnalyzeResult {
    pages: Vec<AnalyzePage>,
}

#[derive(Deserialize)]
struct AnalyzePage {
    #[serde(default)]
    lines: Vec<OcrLine>,
}

/// Parses OCR output JSON.
///
/// Accepts a bare array of lines or a layout-analysis document
/// (`analyzeResult.pages[0].lines`).
pub fn parse_ocr_json(json: &str) -> Result<Vec<OcrLine>> {
    match serde_json::from_str::<OcrDocument>(json)? {
        OcrDocument::Lines(lines) => Ok(lines),
        OcrDocument::Analyze { analyze_result } => analyze_result
            .pages
            .into_iter()
            .next()
            .map(|page| page.lines)
            .ok_or_else(|| LayoutError::Config("analyzeResult has no pages".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingest_assigns_indices_and_normalizes() {
        let lines = vec![
            OcrLine::new("Soup", Polygon::Flat(vec![0.0, 0.0, 50.0, 0.0, 50.0, 10.0, 0.0, 10.0])),
            OcrLine::new(
                "Salad",
                Polygon::Coords(PolygonCoords::rect(0.0, 90.0, 100.0, 100.0)),
            ),
        ];
        let records = ingest_lines(lines).unwrap();
        assert_eq!(records[1].index, 1);
        assert_eq!(records[0].bbox, BoundingBox::new(0.0, 0.5, 0.0, 0.1));
        assert_eq!(records[1].bbox.y_max, 1.0);
    }

    #[test]
    fn ingest_reports_the_malformed_line() {
        let lines = vec![
            OcrLine::new("ok", Polygon::Flat(vec![0.0, 0.0, 1.0, 1.0])),
            OcrLine::new("bad", Polygon::Flat(vec![])),
        ];
        let err = ingest_lines(lines).unwrap_err();
        assert!(matches!(err, LayoutError::Geometry { line: 1, .. }));
    }

    #[test]
    fn parses_analyze_result_documents() {
        let json = r#"{"analyzeResult":{"pages":[{"lines":[
            {"content":"Tea","polygon":[1,2,3,2,3,4,1,4]}
        ]}]}}"#;
        let lines = parse_ocr_json(json).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].content, "Tea");
    }
}
