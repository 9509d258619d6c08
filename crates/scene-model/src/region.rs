//! Region geometry.
//!
//! A region is one colourable overlay area, tied one-to-one to a sensor
//! stream by index. Geometry is read from a JSON shape list whose records are
//! tagged by `"type"`.

use serde::{Deserialize, Serialize};

/// A point in background pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Shift by an offset.
    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn distance(self, other: Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [f64; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

/// Geometry of a region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RegionShape {
    /// Axis-aligned rectangle between two opposite corners.
    Rectangle {
        #[serde(alias = "start_point")]
        start: Point,
        #[serde(alias = "end_point")]
        end: Point,
    },

    Circle {
        #[serde(alias = "center")]
        centre: Point,
        radius: f64,
    },

    /// Closed polygon; the last vertex connects back to the first.
    #[serde(alias = "poly")]
    Polygon { points: Vec<Point> },
}

impl RegionShape {
    /// Anchor point used for labels and arrow routing.
    ///
    /// Polygons use the arithmetic mean of their vertices truncated to whole
    /// pixels, not the area centroid.
    pub fn centre(&self) -> Point {
        match self {
            Self::Rectangle { start, end } => {
                Point::new((start.x + end.x) / 2.0, (start.y + end.y) / 2.0)
            }
            Self::Circle { centre, .. } => *centre,
            Self::Polygon { points } => {
                let n = points.len().max(1) as f64;
                let sum_x: f64 = points.iter().map(|p| p.x).sum();
                let sum_y: f64 = points.iter().map(|p| p.y).sum();
                Point::new((sum_x / n).trunc(), (sum_y / n).trunc())
            }
        }
    }

    /// Polygon vertices in drawing order. Rectangles expand to their four
    /// corners starting at `start`; circles have none.
    pub fn corners(&self) -> Vec<Point> {
        match self {
            Self::Rectangle { start, end } => vec![
                *start,
                Point::new(start.x, end.y),
                *end,
                Point::new(end.x, start.y),
            ],
            Self::Circle { .. } => Vec::new(),
            Self::Polygon { points } => points.clone(),
        }
    }

    /// The same shape shifted by `(dx, dy)`.
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        match self {
            Self::Rectangle { start, end } => Self::Rectangle {
                start: start.offset(dx, dy),
                end: end.offset(dx, dy),
            },
            Self::Circle { centre, radius } => Self::Circle {
                centre: centre.offset(dx, dy),
                radius: *radius,
            },
            Self::Polygon { points } => Self::Polygon {
                points: points.iter().map(|p| p.offset(dx, dy)).collect(),
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Rectangle { .. } => "rectangle",
            Self::Circle { .. } => "circle",
            Self::Polygon { .. } => "polygon",
        }
    }

    /// Reject geometry that cannot be rasterized into a non-empty area.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Rectangle { start, end } => {
                if !start.is_finite() || !end.is_finite() {
                    return Err("rectangle has non-finite coordinates".to_string());
                }
                if start.x == end.x || start.y == end.y {
                    return Err(format!(
                        "degenerate rectangle from ({}, {}) to ({}, {})",
                        start.x, start.y, end.x, end.y
                    ));
                }
            }
            Self::Circle { centre, radius } => {
                if !centre.is_finite() || !radius.is_finite() {
                    return Err("circle has non-finite coordinates".to_string());
                }
                if *radius <= 0.0 {
                    return Err(format!("circle radius must be positive, got {radius}"));
                }
            }
            Self::Polygon { points } => {
                if points.len() < 3 {
                    return Err(format!(
                        "polygon needs at least 3 points, got {}",
                        points.len()
                    ));
                }
                if points.iter().any(|p| !p.is_finite()) {
                    return Err("polygon has non-finite coordinates".to_string());
                }
            }
        }
        Ok(())
    }
}

/// One record of a shape list file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeRecord {
    /// Optional display name; falls back to the stream's name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(flatten)]
    pub shape: RegionShape,
}

/// Parse a JSON shape list.
pub fn parse_shapes(json: &str) -> Result<Vec<ShapeRecord>, serde_json::Error> {
    serde_json::from_str(json)
}

/// A named region bound to the sensor stream at the same index.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub index: usize,
    pub name: String,
    pub shape: RegionShape,
}

impl Region {
    pub fn new(index: usize, name: impl Into<String>, shape: RegionShape) -> Self {
        Self {
            index,
            name: name.into(),
            shape,
        }
    }

    pub fn centre(&self) -> Point {
        self.shape.centre()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_shape_kinds_and_aliases() {
        let json = r#"[
            {"type": "rectangle", "start": [10, 20], "end": [30, 60], "name": "Hall"},
            {"type": "circle", "centre": [100, 100], "radius": 15},
            {"type": "poly", "points": [[0, 0], [10, 0], [0, 10]]},
            {"type": "polygon", "points": [[5, 5], [6, 5], [6, 6]]},
            {"type": "rectangle", "start_point": [1, 1], "end_point": [2, 2]}
        ]"#;
        let shapes = parse_shapes(json).unwrap();
        assert_eq!(shapes.len(), 5);
        assert_eq!(shapes[0].name.as_deref(), Some("Hall"));
        assert_eq!(shapes[1].shape.kind(), "circle");
        assert_eq!(shapes[2].shape.kind(), "polygon");
        assert_eq!(shapes[3].shape.kind(), "polygon");
        assert_eq!(
            shapes[4].shape,
            RegionShape::Rectangle {
                start: Point::new(1.0, 1.0),
                end: Point::new(2.0, 2.0)
            }
        );
    }

    #[test]
    fn unknown_shape_type_is_rejected() {
        let json = r#"[{"type": "hexagon", "points": []}]"#;
        assert!(parse_shapes(json).is_err());
    }

    #[test]
    fn centres_follow_shape_rules() {
        let rect = RegionShape::Rectangle {
            start: Point::new(10.0, 20.0),
            end: Point::new(31.0, 60.0),
        };
        assert_eq!(rect.centre(), Point::new(20.5, 40.0));

        let circle = RegionShape::Circle {
            centre: Point::new(7.0, 9.0),
            radius: 3.0,
        };
        assert_eq!(circle.centre(), Point::new(7.0, 9.0));

        let tri = RegionShape::Polygon {
            points: vec![
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(0.0, 10.0),
            ],
        };
        // Mean of vertices (3.33, 3.33), truncated.
        assert_eq!(tri.centre(), Point::new(3.0, 3.0));
    }

    #[test]
    fn malformed_geometry_fails_validation() {
        let flat = RegionShape::Rectangle {
            start: Point::new(5.0, 5.0),
            end: Point::new(5.0, 20.0),
        };
        assert!(flat.validate().is_err());

        let dot = RegionShape::Circle {
            centre: Point::new(5.0, 5.0),
            radius: 0.0,
        };
        assert!(dot.validate().is_err());

        let line = RegionShape::Polygon {
            points: vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)],
        };
        assert!(line.validate().unwrap_err().contains("at least 3"));
    }

    #[test]
    fn rectangle_corners_start_at_start() {
        let rect = RegionShape::Rectangle {
            start: Point::new(1.0, 2.0),
            end: Point::new(5.0, 8.0),
        };
        assert_eq!(
            rect.corners(),
            vec![
                Point::new(1.0, 2.0),
                Point::new(1.0, 8.0),
                Point::new(5.0, 8.0),
                Point::new(5.0, 2.0),
            ]
        );
    }

    #[test]
    fn translation_moves_every_vertex() {
        let tri = RegionShape::Polygon {
            points: vec![
                Point::new(0.0, 0.0),
                Point::new(4.0, 0.0),
                Point::new(0.0, 4.0),
            ],
        };
        let moved = tri.translated(10.0, 20.0);
        assert_eq!(moved.corners()[1], Point::new(14.0, 20.0));
    }
}
