//! Auxiliary panels drawn around the main shapes image.
//!
//! Every builder takes the panel's inner size and returns the bordered
//! panel, ready to be pasted into the frame.

use heatreel_processing_core::colormap::Colormap;
use heatreel_scene_model::config::{BorderKind, BorderStyle, RenderConfig};
use heatreel_scene_model::region::Region;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use crate::text::{TextPainter, TextStyles};

/// Fill behind readout, caption, and bar chart content.
pub const PANEL_BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Fill of a camera panel whose source has ended.
pub const PLACEHOLDER_BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);

pub const NO_VIDEO: &str = "No Video";

const AXIS_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

/// Surround `inner` with a border of `style.width` pixels.
pub fn add_border(inner: &RgbImage, style: &BorderStyle) -> RgbImage {
    let b = style.width;
    if b == 0 {
        return inner.clone();
    }
    let (w, h) = inner.dimensions();
    match style.kind {
        BorderKind::Constant => {
            let mut out = RgbImage::from_pixel(w + 2 * b, h + 2 * b, Rgb(style.color));
            imageops::replace(&mut out, inner, b as i64, b as i64);
            out
        }
        BorderKind::Replicate => RgbImage::from_fn(w + 2 * b, h + 2 * b, |x, y| {
            let sx = x.saturating_sub(b).min(w.saturating_sub(1));
            let sy = y.saturating_sub(b).min(h.saturating_sub(1));
            *inner.get_pixel(sx, sy)
        }),
    }
}

/// Resize to `width` keeping the aspect ratio; the height is floored.
pub fn resize_to_width(image: &RgbImage, width: u32) -> RgbImage {
    let height = (image.height() as u64 * width as u64 / image.width().max(1) as u64).max(1) as u32;
    imageops::resize(image, width, height, FilterType::Triangle)
}

/// Shorten an integer for a tick label: three significant digits and a
/// K/M/B/T suffix chosen by digit count (sign included).
///
/// ```
/// use heatreel_render_engine::panels::abbreviate;
/// assert_eq!(abbreviate(12345), "12.3K");
/// assert_eq!(abbreviate(999), "999");
/// ```
pub fn abbreviate(n: i64) -> String {
    let (divisor, suffix) = match n.to_string().len() {
        4..=6 => (1e3, "K"),
        7..=9 => (1e6, "M"),
        10..=12 => (1e9, "B"),
        13..=15 => (1e12, "T"),
        _ => return three_significant(n as f64),
    };
    format!("{}{suffix}", three_significant(n as f64 / divisor))
}

/// `%.3g`: fixed notation for exponents in `-4..3`, otherwise scientific,
/// trailing zeros removed either way.
fn three_significant(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return value.to_string();
    }
    let sci = format!("{value:.2e}");
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    if (-4..3).contains(&exp) {
        let decimals = (2 - exp) as usize;
        trim_fraction(&format!("{value:.decimals$}"))
    } else {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_fraction(mantissa), exp.abs())
    }
}

fn trim_fraction(s: &str) -> String {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s.to_string()
    }
}

/// The static colorbar: heading, separator, tick labels, scale lines, and
/// the gradient from `scale.min` to `scale.max`.
pub fn render_colorbar(
    width: u32,
    height: u32,
    config: &RenderConfig,
    colormap: &Colormap,
    text: &TextStyles,
) -> RgbImage {
    let cb = &config.colorbar;
    let mut img = RgbImage::from_pixel(width, height, Rgb(cb.background_color));

    let part = |frac: f64, of: u32| (of as f64 * frac) as u32;
    let side = part(cb.horizontal_border_fraction, width);
    let gap = part(cb.tick_line_gap_fraction, height);
    let bottom = part(cb.bottom_border_fraction, height);
    let top = part(cb.top_border_fraction, height);
    let ticks = part(cb.tick_box_fraction, height);
    let heading = part(cb.heading_box_fraction, height);

    let grad_h = height.saturating_sub(bottom + top + ticks + heading);
    let grad_w = width.saturating_sub(2 * side);
    let grad_y = height.saturating_sub(grad_h + bottom);

    for i in 0..grad_w {
        let t = if grad_w > 1 {
            i as f64 / (grad_w - 1) as f64
        } else {
            0.0
        };
        let color = colormap.sample(t);
        for y in grad_y..grad_y + grad_h {
            img.put_pixel(side + i, y, color);
        }
    }

    let scale = &config.scale;
    let range = scale.max - scale.min;
    let dividers = cb.dividers.max(1);
    let line_top = heading + ticks + gap;
    let line_bottom = height.saturating_sub(bottom);
    for i in 0..=dividers {
        let coord = (i as u64 * grad_w as u64 / dividers as u64) as u32 + side;
        for x in coord.saturating_sub(1)..=coord.min(width - 1) {
            for y in line_top..line_bottom {
                img.put_pixel(x, y, Rgb(cb.scale_line_color));
            }
        }

        let value = (i as f64 * range / dividers as f64).trunc() as i64 + scale.min.trunc() as i64;
        let label = abbreviate(value);
        let (tw, th) = text.colorbar_ticks.measure(&label);
        let baseline = (heading + ticks) as i32;
        text.colorbar_ticks
            .draw(&mut img, coord as i32 - tw as i32 / 2, baseline - th as i32, &label);
    }

    if heading + 1 < height {
        for x in 0..width {
            img.put_pixel(x, heading + 1, Rgb(cb.separator_color));
        }
    }

    let title = format!("{} in each area", scale.sensor_value_name);
    text.colorbar_heading
        .draw_centered(&mut img, width as i32 / 2, heading as i32 / 2, &title);

    add_border(&img, &config.borders.colorbar)
}

/// Current second, zero-padded to five digits.
pub fn render_readout(
    width: u32,
    height: u32,
    second: i64,
    config: &RenderConfig,
    text: &TextStyles,
) -> RgbImage {
    let mut img = RgbImage::from_pixel(width, height, PANEL_BACKGROUND);
    text.readout.draw_centered(
        &mut img,
        width as i32 / 2,
        height as i32 / 2,
        &format!("{second:05}"),
    );
    add_border(&img, &config.borders.readout)
}

/// Whether `caption` fits on one line of a caption panel `width` wide.
pub fn caption_fits(painter: &TextPainter, width: u32, caption: &str) -> bool {
    painter.measure(caption).0 <= width
}

/// Every active caption centred in the panel, oldest first.
pub fn render_caption(
    width: u32,
    height: u32,
    captions: &[(i64, &str)],
    config: &RenderConfig,
    text: &TextStyles,
) -> RgbImage {
    let mut img = RgbImage::from_pixel(width, height, PANEL_BACKGROUND);
    for (_, caption) in captions {
        text.caption
            .draw_centered(&mut img, width as i32 / 2, height as i32 / 2, caption);
    }
    add_border(&img, &config.borders.caption)
}

/// Live bar chart: one bar per region in its current colour, y axis from
/// `scale.min` to `scale.max`. Missing values draw no bar.
pub fn render_bar_chart(
    width: u32,
    height: u32,
    regions: &[Region],
    values: &[Option<f64>],
    colors: &[Rgb<u8>],
    config: &RenderConfig,
    text: &TextStyles,
) -> RgbImage {
    let mut img = RgbImage::from_pixel(width, height, PANEL_BACKGROUND);
    let painter = &text.bar_chart;
    let scale = &config.scale;

    let title = format!("The {} in the different areas.", scale.sensor_value_name);
    let (_, title_h) = painter.measure(&title);
    let title_band = title_h + 4;
    let label_band = painter.measure("Ag").1 + 4;

    let max_label = abbreviate(scale.max.trunc() as i64);
    let min_label = abbreviate(scale.min.trunc() as i64);
    let axis_band = painter.measure(&max_label).0.max(painter.measure(&min_label).0) + 6;

    painter.draw_centered(&mut img, width as i32 / 2, title_band as i32 / 2, &title);

    let plot_w = width.saturating_sub(axis_band + 4);
    let plot_h = height.saturating_sub(title_band + label_band);
    if plot_w < 2 || plot_h < 2 || regions.is_empty() {
        return add_border(&img, &config.borders.bar_chart);
    }

    let (x0, y0) = (axis_band as f32, title_band as f32);
    let floor_y = y0 + plot_h as f32;
    draw_line_segment_mut(&mut img, (x0, y0), (x0, floor_y), AXIS_COLOR);
    draw_line_segment_mut(&mut img, (x0, floor_y), (x0 + plot_w as f32, floor_y), AXIS_COLOR);

    painter.draw_centered(&mut img, axis_band as i32 / 2, title_band as i32, &max_label);
    painter.draw_centered(&mut img, axis_band as i32 / 2, floor_y as i32, &min_label);

    let span = scale.max - scale.min;
    let slot = plot_w as f64 / regions.len() as f64;
    let bar_w = ((slot * 0.6) as u32).max(1);
    for (i, region) in regions.iter().enumerate() {
        let left = axis_band as f64 + slot * i as f64 + slot * 0.2;
        let centre = (axis_band as f64 + slot * (i as f64 + 0.5)) as i32;
        painter.draw_centered(
            &mut img,
            centre,
            (floor_y as u32 + label_band / 2) as i32,
            &region.name,
        );

        let Some(value) = values.get(i).copied().flatten().filter(|v| v.is_finite()) else {
            continue;
        };
        let frac = if span > 0.0 {
            (value.clamp(scale.min, scale.max) - scale.min) / span
        } else {
            0.0
        };
        let bar_h = (frac * plot_h as f64) as u32;
        if bar_h == 0 {
            continue;
        }
        let color = colors.get(i).copied().unwrap_or(Rgb(scale.missing_color));
        draw_filled_rect_mut(
            &mut img,
            Rect::at(left as i32, floor_y as i32 - bar_h as i32).of_size(bar_w, bar_h),
            color,
        );
    }

    add_border(&img, &config.borders.bar_chart)
}

/// Camera frame scaled to the panel, or the "No Video" placeholder once the
/// source has ended.
pub fn render_camera_panel(
    frame: Option<&RgbImage>,
    width: u32,
    height: u32,
    config: &RenderConfig,
    text: &TextStyles,
) -> RgbImage {
    let inner = match frame {
        Some(frame) if frame.dimensions() == (width, height) => frame.clone(),
        Some(frame) => imageops::resize(frame, width, height, FilterType::Triangle),
        None => {
            let mut img = RgbImage::from_pixel(width, height, PLACEHOLDER_BACKGROUND);
            text.camera
                .draw_centered(&mut img, width as i32 / 2, height as i32 / 2, NO_VIDEO);
            img
        }
    };
    add_border(&inner, &config.borders.camera)
}

#[cfg(test)]
mod tests {
    use super::*;
    use heatreel_processing_core::colormap::ColormapKind;
    use heatreel_scene_model::region::{Point, RegionShape};

    fn styles(config: &RenderConfig) -> TextStyles {
        TextStyles::without_fonts(&config.fonts)
    }

    #[test]
    fn abbreviations_follow_digit_thresholds() {
        assert_eq!(abbreviate(12345), "12.3K");
        assert_eq!(abbreviate(999), "999");
        assert_eq!(abbreviate(5_000_000), "5M");
        assert_eq!(abbreviate(1000), "1K");
        assert_eq!(abbreviate(0), "0");
        assert_eq!(abbreviate(-1500), "-1.5K");
        assert_eq!(abbreviate(2_500_000_000), "2.5B");
        assert_eq!(abbreviate(7_000_000_000_000), "7T");
        assert_eq!(abbreviate(10_000_000_000_000_000), "1e+16");
    }

    #[test]
    fn constant_border_surrounds_content() {
        let inner = RgbImage::from_pixel(4, 3, Rgb([9, 9, 9]));
        let style = BorderStyle {
            width: 2,
            color: [200, 0, 0],
            kind: BorderKind::Constant,
        };
        let out = add_border(&inner, &style);
        assert_eq!(out.dimensions(), (8, 7));
        assert_eq!(*out.get_pixel(0, 0), Rgb([200, 0, 0]));
        assert_eq!(*out.get_pixel(2, 2), Rgb([9, 9, 9]));
        assert_eq!(*out.get_pixel(7, 6), Rgb([200, 0, 0]));
    }

    #[test]
    fn replicate_border_copies_edges() {
        let inner = RgbImage::from_fn(2, 2, |x, _| {
            if x == 0 {
                Rgb([10, 0, 0])
            } else {
                Rgb([0, 10, 0])
            }
        });
        let style = BorderStyle {
            width: 3,
            color: [0, 0, 0],
            kind: BorderKind::Replicate,
        };
        let out = add_border(&inner, &style);
        assert_eq!(*out.get_pixel(0, 0), Rgb([10, 0, 0]));
        assert_eq!(*out.get_pixel(7, 4), Rgb([0, 10, 0]));
    }

    #[test]
    fn colorbar_gradient_spans_the_colormap() {
        let config = RenderConfig::default();
        let colormap = Colormap::new(ColormapKind::Gray);
        let (w, h) = (200, 100);
        let bar = render_colorbar(w, h, &config, &colormap, &styles(&config));
        let b = config.borders.colorbar.width;
        assert_eq!(bar.dimensions(), (w + 2 * b, h + 2 * b));

        // Just above the bottom inner border, clear of the scale lines.
        let side = (w as f64 * config.colorbar.horizontal_border_fraction) as u32;
        let bottom = (h as f64 * config.colorbar.bottom_border_fraction) as u32;
        let y = b + h - bottom - 1;
        let first = *bar.get_pixel(b + side + 2, y);
        let last = *bar.get_pixel(b + w - side - 3, y);
        assert!(first.0[0] < 10, "{first:?}");
        assert!(last.0[0] > 245, "{last:?}");
    }

    #[test]
    fn colorbar_draws_scale_lines() {
        let config = RenderConfig::default();
        let colormap = Colormap::new(ColormapKind::Gray);
        let (w, h) = (200, 100);
        let bar = render_colorbar(w, h, &config, &colormap, &styles(&config));
        let b = config.borders.colorbar.width;
        let side = (w as f64 * config.colorbar.horizontal_border_fraction) as u32;
        let grad_w = w - 2 * side;
        let bottom = (h as f64 * config.colorbar.bottom_border_fraction) as u32;
        let y = b + h - bottom - 1;
        let mid = grad_w / 2 + side;
        assert_eq!(*bar.get_pixel(b + mid, y), Rgb(config.colorbar.scale_line_color));
    }

    #[test]
    fn readout_and_caption_have_bordered_size() {
        let config = RenderConfig::default();
        let text = styles(&config);
        let readout = render_readout(60, 30, 42, &config, &text);
        let b = config.borders.readout.width;
        assert_eq!(readout.dimensions(), (60 + 2 * b, 30 + 2 * b));

        let caption = render_caption(120, 20, &[(3, "door opened")], &config, &text);
        let c = config.borders.caption.width;
        assert_eq!(caption.dimensions(), (120 + 2 * c, 20 + 2 * c));
    }

    #[test]
    fn caption_wider_than_panel_does_not_fit() {
        let painter = TextPainter::new(None, 20.0, Rgb([0, 0, 0]));
        assert!(caption_fits(&painter, 200, "short"));
        assert!(!caption_fits(&painter, 50, "a much longer caption line"));
    }

    #[test]
    fn bar_height_tracks_value() {
        let mut config = RenderConfig::default();
        config.scale.min = 0.0;
        config.scale.max = 100.0;
        let text = styles(&config);
        let regions = vec![
            Region::new(
                0,
                "A",
                RegionShape::Circle {
                    centre: Point::new(5.0, 5.0),
                    radius: 2.0,
                },
            ),
            Region::new(
                1,
                "B",
                RegionShape::Circle {
                    centre: Point::new(9.0, 9.0),
                    radius: 2.0,
                },
            ),
        ];
        let red = Rgb([255, 0, 0]);
        let blue = Rgb([0, 0, 255]);
        let chart = render_bar_chart(
            300,
            300,
            &regions,
            &[Some(100.0), None],
            &[red, blue],
            &config,
            &text,
        );
        assert!(chart.pixels().any(|p| *p == red));
        assert!(!chart.pixels().any(|p| *p == blue));
    }

    #[test]
    fn ended_camera_shows_placeholder() {
        let config = RenderConfig::default();
        let text = styles(&config);
        let panel = render_camera_panel(None, 40, 30, &config, &text);
        let b = config.borders.camera.width;
        assert_eq!(*panel.get_pixel(b + 1, b + 1), PLACEHOLDER_BACKGROUND);

        let frame = RgbImage::from_pixel(80, 60, Rgb([0, 200, 0]));
        let panel = render_camera_panel(Some(&frame), 40, 30, &config, &text);
        assert_eq!(panel.dimensions(), (40 + 2 * b, 30 + 2 * b));
        let px = panel.get_pixel(b + 20, b + 15);
        assert!(px.0[0] < 5 && px.0[1].abs_diff(200) <= 1 && px.0[2] < 5, "{px:?}");
    }
}
