//! menulayout - semantic structure for OCR'd restaurant menus.
//!
//! Groups flat OCR text lines into dish descriptions with geometry
//! heuristics, escalates ambiguous pages to an injected semantic grouper
//! under a timeout, and fuses the resulting paragraphs and prices back into
//! dish records.

pub mod cluster;
pub mod columns;
pub mod decision;
pub mod error;
pub mod features;
pub mod flow;
pub mod fusion;
pub mod geometry;
pub mod heuristic;
pub mod input;
pub mod lexical;
#[cfg(feature = "openai")]
pub mod openai;
pub mod params;
pub mod role;
pub mod segment;
pub mod semantic;
pub mod strategy;
pub mod wash;

pub use decision::{AmbiguousReason, GroupingDecision, GroupingMode};
pub use error::{LayoutError, Result};
pub use flow::{Flow, FlowDescriptor, FlowRegistry, default_registry};
pub use fusion::{ContextFragment, DishRecord, FragmentKind, FusionReport, fuse_context};
pub use geometry::{BoundingBox, CanvasScale, HasBBox, Polygon, PolygonCoords};
pub use input::{LineRecord, OcrLine, canvas_scale, ingest_lines, parse_ocr_json};
pub use params::{ClusterParams, EngineConfig, FusionParams, GroupingParams, SemanticParams};
pub use role::Role;
pub use semantic::{Granularity, SemanticGrouper, SemanticOutcome, SemanticRequest};
pub use strategy::{GroupingOutput, GroupingStrategy, IndividualLine, Paragraph};
pub use wash::{SemanticLabeler, WashLabel, WashMode, WashOutcome, wash_lines};
