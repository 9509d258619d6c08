//! Arrow routing between regions and camera panels.
//!
//! The region-side endpoint of an arrow is found on a discretized sample of
//! the region's boundary rather than by exact line intersection. Circles use
//! the point one radius from the centre towards the target.

use heatreel_scene_model::region::{Point, RegionShape};

/// Straight shaft plus two head strokes, all in whole pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrowPath {
    /// Camera-side end of the shaft.
    pub tail: Point,
    /// Region-side end of the shaft, where the head is drawn.
    pub tip: Point,
    /// Outer ends of the two head strokes; each stroke runs to `tip`.
    pub head: [Point; 2],
}

impl ArrowPath {
    /// Segments to draw: shaft first, then both head strokes.
    pub fn segments(&self) -> [(Point, Point); 3] {
        [
            (self.tail, self.tip),
            (self.head[0], self.tip),
            (self.head[1], self.tip),
        ]
    }
}

/// Integer points along the edges of a rectangle or polygon.
///
/// Horizontal and vertical edges yield every whole pixel from the lower
/// coordinate up to (not including) the higher one. Slanted edges yield
/// `samples_per_edge` points evenly spaced in x, truncated to whole pixels.
/// Circles have no vertices and yield nothing.
pub fn boundary_samples(shape: &RegionShape, samples_per_edge: u32) -> Vec<Point> {
    let corners = shape.corners();
    let Some(&first) = corners.first() else {
        return Vec::new();
    };

    let mut points = Vec::new();
    let mut start = first;
    for &end in corners[1..].iter().chain(std::iter::once(&first)) {
        if start.x == end.x {
            let (lo, hi) = (start.y.min(end.y) as i64, start.y.max(end.y) as i64);
            points.extend((lo..hi).map(|y| Point::new(end.x.trunc(), y as f64)));
        } else if start.y == end.y {
            let (lo, hi) = (start.x.min(end.x) as i64, start.x.max(end.x) as i64);
            points.extend((lo..hi).map(|x| Point::new(x as f64, end.y.trunc())));
        } else {
            let slope = (end.y - start.y) / (end.x - start.x);
            let min_x = start.x.min(end.x);
            let span = (start.x - end.x).abs();
            let n = samples_per_edge.max(1);
            for i in 0..n {
                let x = min_x + (i as f64 * span) / n as f64;
                let y = slope * x - slope * start.x + start.y;
                points.push(Point::new(x.trunc(), y.trunc()));
            }
        }
        start = end;
    }
    points
}

/// Boundary sample closest to the line through `centre` and `target`.
///
/// Only samples lying strictly between the centre and the target along x are
/// considered; distance is measured perpendicular to the line. The first of
/// several equally close samples wins. `None` when no sample qualifies.
pub fn closest_boundary_point(samples: &[Point], centre: Point, target: Point) -> Option<Point> {
    let c = Point::new(centre.x.trunc(), centre.y.trunc());
    let t = Point::new(target.x.trunc(), target.y.trunc());
    let (dx, dy) = (t.x - c.x, t.y - c.y);
    let len = dx.hypot(dy);
    if len == 0.0 {
        return None;
    }

    let between = |p: &Point| {
        (centre.x < target.x && centre.x < p.x && p.x < target.x)
            || (centre.x > target.x && centre.x > p.x && p.x > target.x)
    };

    let mut best: Option<(Point, f64)> = None;
    for p in samples.iter().filter(|p| between(p)) {
        let distance = ((p.x - c.x) * dy - (p.y - c.y) * dx).abs() / len;
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((*p, distance));
        }
    }
    best.map(|(p, _)| p)
}

/// Point at distance `radius` from `centre` towards `target`, truncated to
/// whole pixels.
pub fn circle_boundary_point(centre: Point, radius: f64, target: Point) -> Point {
    let distance = centre.distance(target);
    if distance == 0.0 {
        return Point::new(centre.x.trunc(), centre.y.trunc());
    }
    let ratio = radius / distance;
    Point::new(
        (centre.x + (target.x - centre.x) * ratio).trunc(),
        (centre.y + (target.y - centre.y) * ratio).trunc(),
    )
}

/// Route an arrow from `target` (a camera panel's inner-edge midpoint) to the
/// boundary of `shape`. Shapes and target must share one coordinate space.
pub fn route_arrow(
    shape: &RegionShape,
    target: Point,
    samples_per_edge: u32,
    head_length: f64,
    head_half_angle: f64,
) -> ArrowPath {
    let centre = shape.centre();
    let tip = match shape {
        RegionShape::Circle { radius, .. } => circle_boundary_point(centre, *radius, target),
        RegionShape::Rectangle { .. } | RegionShape::Polygon { .. } => {
            let samples = boundary_samples(shape, samples_per_edge);
            closest_boundary_point(&samples, centre, target)
                .unwrap_or_else(|| Point::new(centre.x.trunc(), centre.y.trunc()))
        }
    };
    let tail = Point::new(target.x.trunc(), target.y.trunc());
    ArrowPath {
        tail,
        tip,
        head: arrowhead(tip, tail, head_length, head_half_angle),
    }
}

/// Ends of the two head strokes at `tip`, rotated `±half_angle` from the
/// direction pointing back along the shaft to `tail`.
pub fn arrowhead(tip: Point, tail: Point, length: f64, half_angle: f64) -> [Point; 2] {
    let phi = (tail.y - tip.y).atan2(tail.x - tip.x);
    [phi - half_angle, phi + half_angle].map(|angle| {
        Point::new(
            tip.x + (length * angle.cos()).trunc(),
            tip.y + (length * angle.sin()).trunc(),
        )
    })
}
