//! Region masks.
//!
//! Each region is rasterized once into a filled mask and an outline mask,
//! both sized to the background. A mask pixel is either unset or carries a
//! colour; recolouring swaps the colour of every set pixel and never changes
//! which pixels are set.

use image::{GrayImage, Luma, Rgb};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_line_segment_mut, draw_polygon_mut, Canvas,
};
use imageproc::rect::Rect;

use heatreel_scene_model::region::{Point, RegionShape};

/// Colour carried by freshly rasterized filled masks.
pub const FILL_MARKER: Rgb<u8> = Rgb([1, 1, 1]);

/// Colour carried by freshly rasterized outline masks.
pub const OUTLINE_MARKER: Rgb<u8> = Rgb([2, 2, 2]);

const INSIDE: Luma<u8> = Luma([255]);

/// A sparse colour layer over the canvas; `None` marks "not region".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionMask {
    width: u32,
    height: u32,
    pixels: Vec<Option<Rgb<u8>>>,
}

impl RegionMask {
    /// A mask with no set pixels.
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![None; width as usize * height as usize],
        }
    }

    /// Set every non-zero pixel of a membership image to `color`.
    pub fn from_membership(membership: &GrayImage, color: Rgb<u8>) -> Self {
        let pixels = membership
            .pixels()
            .map(|p| (p.0[0] > 0).then_some(color))
            .collect();
        Self {
            width: membership.width(),
            height: membership.height(),
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> Option<Rgb<u8>> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels[(y * self.width + x) as usize]
    }

    /// Number of set pixels.
    pub fn count(&self) -> usize {
        self.pixels.iter().filter(|p| p.is_some()).count()
    }

    /// Row-major pixel slots.
    pub fn pixels(&self) -> &[Option<Rgb<u8>>] {
        &self.pixels
    }

    /// Same membership, every set pixel painted `color`.
    pub fn recolored(&self, color: Rgb<u8>) -> Self {
        Self {
            width: self.width,
            height: self.height,
            pixels: self.pixels.iter().map(|p| p.map(|_| color)).collect(),
        }
    }
}

/// Filled and outline masks of one region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionMasks {
    pub filled: RegionMask,
    pub outline: RegionMask,
}

impl RegionMasks {
    /// Substitute both marker colours without re-rasterizing.
    pub fn recolor(&self, fill: Rgb<u8>, outline: Rgb<u8>) -> Self {
        Self {
            filled: self.filled.recolored(fill),
            outline: self.outline.recolored(outline),
        }
    }

    pub fn merged(&self) -> RegionMask {
        merge(&self.filled, &self.outline)
    }
}

/// Rasterize `shape` on a `width` x `height` canvas.
pub fn create_masks(
    shape: &RegionShape,
    width: u32,
    height: u32,
    outline_thickness: u32,
) -> RegionMasks {
    let filled = shape.rasterize_filled(width, height);
    let outline = shape.rasterize_outline(width, height, outline_thickness);
    RegionMasks {
        filled: RegionMask::from_membership(&filled, FILL_MARKER),
        outline: RegionMask::from_membership(&outline, OUTLINE_MARKER),
    }
}

/// Overlay `outline` on `filled`; outline pixels win where both are set.
pub fn merge(filled: &RegionMask, outline: &RegionMask) -> RegionMask {
    let pixels = filled
        .pixels
        .iter()
        .zip(&outline.pixels)
        .map(|(f, o)| o.or(*f))
        .collect();
    RegionMask {
        width: filled.width,
        height: filled.height,
        pixels,
    }
}

/// Membership rasterization for region geometry.
pub trait Rasterize {
    /// Interior and boundary pixels.
    fn rasterize_filled(&self, width: u32, height: u32) -> GrayImage;

    /// Boundary ring `thickness` pixels wide.
    fn rasterize_outline(&self, width: u32, height: u32, thickness: u32) -> GrayImage;
}

impl Rasterize for RegionShape {
    fn rasterize_filled(&self, width: u32, height: u32) -> GrayImage {
        let mut canvas = GrayImage::new(width, height);
        match self {
            RegionShape::Rectangle { start, end } => {
                let x0 = start.x.min(end.x).round() as i32;
                let y0 = start.y.min(end.y).round() as i32;
                let w = (start.x - end.x).abs().round() as u32 + 1;
                let h = (start.y - end.y).abs().round() as u32 + 1;
                draw_filled_rect_mut(&mut canvas, Rect::at(x0, y0).of_size(w, h), INSIDE);
            }
            RegionShape::Circle { centre, radius } => {
                draw_filled_circle_mut(
                    &mut canvas,
                    (centre.x.round() as i32, centre.y.round() as i32),
                    radius.round() as i32,
                    INSIDE,
                );
            }
            RegionShape::Polygon { points } => {
                let poly = polygon_pixels(points);
                if poly.len() >= 3 {
                    draw_polygon_mut(&mut canvas, &poly, INSIDE);
                }
            }
        }
        canvas
    }

    fn rasterize_outline(&self, width: u32, height: u32, thickness: u32) -> GrayImage {
        let mut canvas = GrayImage::new(width, height);
        match self {
            RegionShape::Circle { centre, radius } => {
                draw_ring(&mut canvas, *centre, *radius, thickness.max(1) as f64);
            }
            RegionShape::Rectangle { .. } | RegionShape::Polygon { .. } => {
                let corners = self.corners();
                for (i, a) in corners.iter().enumerate() {
                    let b = corners[(i + 1) % corners.len()];
                    draw_thick_segment_mut(&mut canvas, *a, b, thickness, INSIDE);
                }
            }
        }
        canvas
    }
}

/// Integer polygon vertices with a closing duplicate removed.
fn polygon_pixels(points: &[Point]) -> Vec<imageproc::point::Point<i32>> {
    let mut poly: Vec<imageproc::point::Point<i32>> = points
        .iter()
        .map(|p| imageproc::point::Point::new(p.x.round() as i32, p.y.round() as i32))
        .collect();
    poly.dedup();
    while poly.len() > 1 && poly.first() == poly.last() {
        poly.pop();
    }
    poly
}

/// Annulus of pixels whose distance to `centre` is within `thickness / 2`
/// of `radius`.
fn draw_ring(canvas: &mut GrayImage, centre: Point, radius: f64, thickness: f64) {
    let half = thickness / 2.0;
    let reach = radius + half + 1.0;
    let (w, h) = (canvas.width() as f64, canvas.height() as f64);
    let x_lo = (centre.x - reach).floor().max(0.0) as u32;
    let y_lo = (centre.y - reach).floor().max(0.0) as u32;
    let x_hi = (centre.x + reach).ceil().min(w - 1.0).max(0.0) as u32;
    let y_hi = (centre.y + reach).ceil().min(h - 1.0).max(0.0) as u32;
    if canvas.width() == 0 || canvas.height() == 0 {
        return;
    }
    for y in y_lo..=y_hi {
        for x in x_lo..=x_hi {
            let d = (x as f64 - centre.x).hypot(y as f64 - centre.y);
            if (d - radius).abs() <= half {
                canvas.put_pixel(x, y, INSIDE);
            }
        }
    }
}

/// Draw a line segment `thickness` pixels wide with round joins.
pub fn draw_thick_segment_mut<C>(canvas: &mut C, a: Point, b: Point, thickness: u32, color: C::Pixel)
where
    C: Canvas,
{
    if thickness <= 1 {
        draw_line_segment_mut(
            canvas,
            (a.x as f32, a.y as f32),
            (b.x as f32, b.y as f32),
            color,
        );
        return;
    }

    let half = thickness as f64 / 2.0;
    let radius = (half - 0.5).round().max(1.0) as i32;
    draw_filled_circle_mut(canvas, (a.x.round() as i32, a.y.round() as i32), radius, color);
    draw_filled_circle_mut(canvas, (b.x.round() as i32, b.y.round() as i32), radius, color);

    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len = dx.hypot(dy);
    if len < f64::EPSILON {
        return;
    }
    let (nx, ny) = (-dy / len * half, dx / len * half);
    let quad = [
        imageproc::point::Point::new((a.x + nx).round() as i32, (a.y + ny).round() as i32),
        imageproc::point::Point::new((b.x + nx).round() as i32, (b.y + ny).round() as i32),
        imageproc::point::Point::new((b.x - nx).round() as i32, (b.y - ny).round() as i32),
        imageproc::point::Point::new((a.x - nx).round() as i32, (a.y - ny).round() as i32),
    ];
    if quad[0] != quad[3] {
        draw_polygon_mut(canvas, &quad, color);
    }
}
