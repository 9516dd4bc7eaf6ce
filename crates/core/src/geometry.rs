//! Geometric types for OCR line placement.
//!
//! Provides:
//! - `Polygon`, the two wire encodings of an OCR polygon
//! - `PolygonCoords`, the paired-vector form every polygon is normalized into
//! - `BoundingBox`, an axis-aligned box in normalized [0, 1] image space
//! - `CanvasScale`, the per-image normalization divisor

use serde::{Deserialize, Serialize};

use crate::error::{LayoutError, Result};

/// Minimal width substituted for degenerate extents before any division.
pub const MIN_EXTENT: f64 = 1e-6;

/// Accessors shared by everything that has a normalized bounding box.
pub trait HasBBox {
    fn x_min(&self) -> f64;
    fn x_max(&self) -> f64;
    fn y_min(&self) -> f64;
    fn y_max(&self) -> f64;

    fn x_center(&self) -> f64 {
        (self.x_min() + self.x_max()) / 2.0
    }

    fn y_center(&self) -> f64 {
        (self.y_min() + self.y_max()) / 2.0
    }

    fn width(&self) -> f64 {
        self.x_max() - self.x_min()
    }

    fn height(&self) -> f64 {
        self.y_max() - self.y_min()
    }
}

/// An OCR polygon as it arrives on the wire.
///
/// Either a flat `[x0, y0, x1, y1, ...]` array or separate coordinate arrays.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Polygon {
    Flat(Vec<f64>),
    Coords(PolygonCoords),
}

impl Polygon {
    /// Converts into paired coordinate vectors, rejecting malformed shapes.
    pub fn into_coords(self, line: usize) -> Result<PolygonCoords> {
        let coords = match self {
            Polygon::Flat(values) => {
                if values.len() % 2 != 0 {
                    return Err(LayoutError::Geometry {
                        line,
                        msg: format!("flat polygon has odd length {}", values.len()),
                    });
                }
                let (x_coords, y_coords) = values.chunks_exact(2).map(|p| (p[0], p[1])).unzip();
                PolygonCoords { x_coords, y_coords }
            }
            Polygon::Coords(coords) => coords,
        };
        coords.validate(line)?;
        Ok(coords)
    }
}

/// Paired coordinate vectors in source pixel space.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolygonCoords {
    #[serde(alias = "x_coords")]
    pub x_coords: Vec<f64>,
    #[serde(alias = "y_coords")]
    pub y_coords: Vec<f64>,
}

impl PolygonCoords {
    /// Axis-aligned rectangle polygon in clockwise order.
    pub fn rect(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Self {
            x_coords: vec![x_min, x_max, x_max, x_min],
            y_coords: vec![y_min, y_min, y_max, y_max],
        }
    }

    fn validate(&self, line: usize) -> Result<()> {
        if self.x_coords.is_empty() || self.y_coords.is_empty() {
            return Err(LayoutError::Geometry {
                line,
                msg: "polygon has no points".to_string(),
            });
        }
        if self.x_coords.len() != self.y_coords.len() {
            return Err(LayoutError::Geometry {
                line,
                msg: format!(
                    "x/y coordinate counts differ ({} vs {})",
                    self.x_coords.len(),
                    self.y_coords.len()
                ),
            });
        }
        if self
            .x_coords
            .iter()
            .chain(&self.y_coords)
            .any(|v| !v.is_finite())
        {
            return Err(LayoutError::Geometry {
                line,
                msg: "polygon has non-finite coordinates".to_string(),
            });
        }
        Ok(())
    }

    /// Appends another polygon's points (paragraph polygons are point unions).
    pub fn extend(&mut self, other: &PolygonCoords) {
        self.x_coords.extend_from_slice(&other.x_coords);
        self.y_coords.extend_from_slice(&other.y_coords);
    }

    /// Pixel-space extent `(x_min, y_min, x_max, y_max)`.
    pub fn extent(&self) -> (f64, f64, f64, f64) {
        let (x_min, x_max) = min_max(&self.x_coords);
        let (y_min, y_max) = min_max(&self.y_coords);
        (x_min, y_min, x_max, y_max)
    }

    fn max_x(&self) -> f64 {
        self.x_coords.iter().copied().fold(f64::MIN, f64::max)
    }

    fn max_y(&self) -> f64 {
        self.y_coords.iter().copied().fold(f64::MIN, f64::max)
    }
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::MAX, f64::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

/// Axis-aligned box in normalized image space.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct BoundingBox {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl BoundingBox {
    /// Creates a box, swapping bounds given in the wrong order.
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Self {
        Self {
            x_min: x_min.min(x_max),
            x_max: x_min.max(x_max),
            y_min: y_min.min(y_max),
            y_max: y_min.max(y_max),
        }
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x_min: self.x_min.min(other.x_min),
            x_max: self.x_max.max(other.x_max),
            y_min: self.y_min.min(other.y_min),
            y_max: self.y_max.max(other.y_max),
        }
    }

    /// Horizontal overlap relative to the narrower box, in [0, 1].
    ///
    /// Zero-width boxes are widened to [`MIN_EXTENT`].
    pub fn horizontal_overlap_ratio(&self, other: &BoundingBox) -> f64 {
        let overlap = (self.x_max.min(other.x_max) - self.x_min.max(other.x_min)).max(0.0);
        let narrower = self.width().min(other.width()).max(MIN_EXTENT);
        (overlap / narrower).clamp(0.0, 1.0)
    }
}

impl HasBBox for BoundingBox {
    fn x_min(&self) -> f64 {
        self.x_min
    }
    fn x_max(&self) -> f64 {
        self.x_max
    }
    fn y_min(&self) -> f64 {
        self.y_min
    }
    fn y_max(&self) -> f64 {
        self.y_max
    }
}

#[inline]
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Per-image normalization divisor.
///
/// OCR providers report coordinates on an unknown canvas, so the largest
/// coordinate seen anywhere in the image defines the unit square. Never below 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasScale {
    pub max_x: f64,
    pub max_y: f64,
}

impl Default for CanvasScale {
    fn default() -> Self {
        Self {
            max_x: 1.0,
            max_y: 1.0,
        }
    }
}

impl CanvasScale {
    pub fn from_polygons<'a>(polygons: impl IntoIterator<Item = &'a PolygonCoords>) -> Self {
        polygons
            .into_iter()
            .fold(CanvasScale::default(), |scale, polygon| CanvasScale {
                max_x: scale.max_x.max(polygon.max_x()),
                max_y: scale.max_y.max(polygon.max_y()),
            })
    }

    pub fn normalize(&self, polygon: &PolygonCoords) -> BoundingBox {
        let (x_min, y_min, x_max, y_max) = polygon.extent();
        BoundingBox::new(
            x_min / self.max_x,
            x_max / self.max_x,
            y_min / self.max_y,
            y_max / self.max_y,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_polygon_splits_coordinate_pairs() {
        let polygon = Polygon::Flat(vec![10.0, 20.0, 100.0, 20.0, 100.0, 60.0, 10.0, 60.0]);
        let coords = polygon.into_coords(0).unwrap();
        assert_eq!(coords.x_coords, vec![10.0, 100.0, 100.0, 10.0]);
        assert_eq!(coords.y_coords, vec![20.0, 20.0, 60.0, 60.0]);
    }

    #[test]
    fn odd_flat_polygon_is_rejected() {
        let err = Polygon::Flat(vec![1.0, 2.0, 3.0]).into_coords(4).unwrap_err();
        assert!(matches!(err, LayoutError::Geometry { line: 4, .. }));
    }

    #[test]
    fn mismatched_coords_are_rejected() {
        let polygon = Polygon::Coords(PolygonCoords {
            x_coords: vec![1.0, 2.0],
            y_coords: vec![1.0],
        });
        assert!(polygon.into_coords(0).is_err());
    }

    #[test]
    fn both_wire_spellings_deserialize() {
        let camel: Polygon = serde_json::from_str(r#"{"xCoords":[1,2],"yCoords":[3,4]}"#).unwrap();
        let snake: Polygon =
            serde_json::from_str(r#"{"x_coords":[1,2],"y_coords":[3,4]}"#).unwrap();
        assert_eq!(camel, snake);
        let flat: Polygon = serde_json::from_str("[1,3,2,4]").unwrap();
        assert_eq!(flat.into_coords(0).unwrap(), camel.into_coords(0).unwrap());
    }

    #[test]
    fn canvas_scale_never_shrinks_below_one() {
        let tiny = PolygonCoords::rect(0.1, 0.1, 0.5, 0.5);
        let scale = CanvasScale::from_polygons([&tiny]);
        assert_eq!(scale, CanvasScale::default());
    }

    #[test]
    fn normalize_divides_by_max_coordinate() {
        let a = PolygonCoords::rect(10.0, 10.0, 110.0, 30.0);
        let b = PolygonCoords::rect(0.0, 50.0, 200.0, 100.0);
        let scale = CanvasScale::from_polygons([&a, &b]);
        let bbox = scale.normalize(&a);
        assert_eq!(bbox, BoundingBox::new(0.05, 0.55, 0.1, 0.3));
    }

    #[test]
    fn overlap_ratio_handles_zero_width() {
        let point = BoundingBox::new(0.5, 0.5, 0.1, 0.2);
        let wide = BoundingBox::new(0.0, 1.0, 0.1, 0.2);
        assert_eq!(point.horizontal_overlap_ratio(&wide), 0.0);
        let half = BoundingBox::new(0.25, 0.75, 0.0, 0.1);
        assert_eq!(half.horizontal_overlap_ratio(&wide), 1.0);
    }

    #[test]
    fn new_orders_swapped_bounds() {
        let bbox = BoundingBox::new(0.8, 0.2, 0.9, 0.1);
        assert!(bbox.x_min <= bbox.x_max && bbox.y_min <= bbox.y_max);
    }
}
