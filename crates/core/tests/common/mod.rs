#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use menulayout_core::geometry::Polygon;
use menulayout_core::{
    LayoutError, LineRecord, OcrLine, PolygonCoords, Result, SemanticGrouper, SemanticLabeler,
    SemanticRequest, ingest_lines,
};

/// Pixel rectangle `(x_min, y_min, x_max, y_max)`.
pub type Rect = (f64, f64, f64, f64);

/// Ingests `(text, rect)` pairs as one menu image.
pub fn menu(lines: &[(&str, Rect)]) -> Vec<LineRecord> {
    ingest_lines(
        lines
            .iter()
            .map(|&(text, (x0, y0, x1, y1))| {
                OcrLine::new(text, Polygon::Coords(PolygonCoords::rect(x0, y0, x1, y1)))
            })
            .collect(),
    )
    .unwrap()
}

/// Scenario A: two dishes, each with a one-line description below.
pub fn two_dish_menu() -> Vec<LineRecord> {
    menu(&[
        ("Margherita - 12", (20.0, 100.0, 400.0, 130.0)),
        ("Fresh basil, tomato sauce and mozzarella", (20.0, 140.0, 600.0, 170.0)),
        ("Carbonara - 14", (20.0, 180.0, 420.0, 210.0)),
        ("Guanciale, egg yolk and pecorino", (20.0, 220.0, 560.0, 250.0)),
    ])
}

/// Two printed columns, interleaved in OCR order.
pub fn two_column_menu() -> Vec<LineRecord> {
    menu(&[
        ("Tiramisu - 7", (620.0, 100.0, 980.0, 130.0)),
        ("Carbonara - 14", (20.0, 100.0, 380.0, 130.0)),
        ("Mascarpone, coffee and cocoa", (620.0, 140.0, 980.0, 170.0)),
        ("Guanciale, egg yolk and pecorino", (20.0, 140.0, 380.0, 170.0)),
        ("Panna Cotta - 6", (620.0, 200.0, 980.0, 230.0)),
        ("Amatriciana - 13", (20.0, 200.0, 380.0, 230.0)),
        ("Vanilla, berry coulis", (620.0, 240.0, 980.0, 270.0)),
        ("Tomato, guanciale, pecorino", (20.0, 240.0, 380.0, 270.0)),
    ])
}

/// Smallest two-column page: one dish per column, two lines each side.
pub fn two_column_pair() -> Vec<LineRecord> {
    menu(&[
        ("Tiramisu - 7", (620.0, 100.0, 980.0, 130.0)),
        ("Carbonara - 14", (20.0, 100.0, 380.0, 130.0)),
        ("Mascarpone, coffee and cocoa", (620.0, 140.0, 980.0, 170.0)),
        ("Guanciale, egg yolk and pecorino", (20.0, 140.0, 380.0, 170.0)),
    ])
}

/// Fourteen bare titles: large, no description groups, so ambiguous.
pub fn title_wall() -> Vec<LineRecord> {
    let names = [
        "Espresso", "Americano", "Cappuccino", "Latte", "Mocha", "Macchiato", "Cortado",
        "Flat White", "Affogato", "Ristretto", "Lungo", "Chai Latte", "Matcha Latte", "Hot Chocolate",
    ];
    let lines: Vec<(&str, Rect)> = names
        .iter()
        .enumerate()
        .map(|(i, &name)| {
            let y = 50.0 + i as f64 * 60.0;
            (name, (20.0, y, 300.0, y + 30.0))
        })
        .collect();
    menu(&lines)
}

/// Segment fixture: dish + price lines, each followed by a description line.
pub fn ramen_menu() -> Vec<LineRecord> {
    menu(&[
        ("Chicken Ramen 12.5", (20.0, 100.0, 420.0, 130.0)),
        ("rich broth, garlic oil", (20.0, 135.0, 380.0, 165.0)),
        ("Miso Ramen 11", (20.0, 300.0, 400.0, 330.0)),
        ("corn, butter, scallion", (20.0, 335.0, 380.0, 365.0)),
    ])
}

/// How the scripted capability answers.
pub enum Script {
    Answer(String),
    Fail,
    Hang,
}

/// Semantic capability double that counts its calls.
pub struct Scripted {
    script: Script,
    calls: AtomicUsize,
}

impl Scripted {
    pub fn answering(text: &str) -> Self {
        Self::new(Script::Answer(text.to_string()))
    }

    pub fn failing() -> Self {
        Self::new(Script::Fail)
    }

    pub fn hanging() -> Self {
        Self::new(Script::Hang)
    }

    fn new(script: Script) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn respond(&self) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Answer(text) => Ok(text.clone()),
            Script::Fail => Err(LayoutError::Provider("503 Service Unavailable".to_string())),
            Script::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl SemanticGrouper for Scripted {
    async fn group(&self, _request: &SemanticRequest) -> Result<String> {
        self.respond().await
    }
}

#[async_trait]
impl SemanticLabeler for Scripted {
    async fn label(&self, _payload: &serde_json::Value) -> Result<String> {
        self.respond().await
    }
}

/// Every line index appears exactly once across paragraphs and loose lines.
pub fn assert_lines_partitioned(output: &menulayout_core::GroupingOutput, line_count: usize) {
    let mut seen: Vec<usize> = output
        .source_line_groups
        .iter()
        .flatten()
        .copied()
        .chain(output.individual_lines.iter().map(|line| line.source_line_index))
        .collect();
    seen.sort_unstable();
    assert_eq!(seen, (0..line_count).collect::<Vec<_>>());
}
