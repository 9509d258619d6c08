//! Frame compositor: combines one timeline row, the region masks, camera
//! frames, and the auxiliary panels into a single output frame.
//!
//! Everything that does not change between frames (masks, layout, colorbar,
//! arrow routes) is built once in [`FrameCompositor::new`].

use std::sync::Arc;

use heatreel_common::error::{HeatreelError, HeatreelResult};
use heatreel_processing_core::colormap::{ColorMapper, Colormap};
use heatreel_processing_core::geometry::{route_arrow, ArrowPath};
use heatreel_processing_core::masks::{create_masks, draw_thick_segment_mut, RegionMasks};
use heatreel_processing_core::timeline::AlignedRow;
use heatreel_scene_model::config::RenderConfig;
use heatreel_scene_model::event::EventAnnotations;
use heatreel_scene_model::region::Region;
use image::imageops;
use image::{Rgb, RgbImage};

use crate::layout::{FrameLayout, PanelRect, SlotContent};
use crate::panels::{
    add_border, caption_fits, render_bar_chart, render_camera_panel, render_caption,
    render_colorbar, render_readout,
};
use crate::text::TextStyles;

/// Per-frame state handed to [`FrameCompositor::compose`].
#[derive(Debug, Clone)]
pub struct FrameContext<'a> {
    pub row: AlignedRow,
    /// Mapped colour of each region for this row.
    pub colors: Vec<Rgb<u8>>,
    /// Captions whose window covers this row, oldest first.
    pub captions: Vec<(i64, &'a str)>,
    /// One entry per camera source; `None` once that source has ended.
    pub camera_frames: Vec<Option<RgbImage>>,
}

pub struct FrameCompositor {
    config: Arc<RenderConfig>,
    layout: FrameLayout,
    background: RgbImage,
    regions: Vec<Region>,
    masks: Vec<RegionMasks>,
    mapper: ColorMapper,
    text: TextStyles,
    colorbar: RgbImage,
    arrows: Vec<ArrowPath>,
    overflowing_captions: Vec<String>,
}

impl FrameCompositor {
    /// Prepare everything static. `background` must already be resized to
    /// the base width; region coordinates are pixels of it.
    pub fn new(
        config: Arc<RenderConfig>,
        background: RgbImage,
        regions: Vec<Region>,
        events: &EventAnnotations,
        cameras: usize,
        text: TextStyles,
    ) -> HeatreelResult<Self> {
        if cameras > regions.len() {
            return Err(HeatreelError::config(
                "cameras",
                format!(
                    "{cameras} camera sources but only {} regions",
                    regions.len()
                ),
            ));
        }

        let colormap: Colormap = config.scale.colormap.parse()?;
        let mapper = ColorMapper::new(
            colormap,
            config.scale.min,
            config.scale.max,
            Rgb(config.scale.missing_color),
        );

        let (width, height) = background.dimensions();
        let layout = FrameLayout::compute(&config, width, height, cameras, !events.is_empty())?;

        let masks: Vec<RegionMasks> = regions
            .iter()
            .map(|r| create_masks(&r.shape, width, height, config.regions.outline_thickness))
            .collect();
        for (region, mask) in regions.iter().zip(&masks) {
            if mask.filled.count() == 0 {
                tracing::warn!(region = %region.name, "Region lies entirely outside the background");
            }
        }

        let (cw, ch) = layout.colorbar.inner_size(config.borders.colorbar.width);
        let colorbar = render_colorbar(cw, ch, &config, &colormap, &text);

        let (dx, dy) = layout.region_offset;
        let arrows = layout
            .camera_anchors
            .iter()
            .zip(&regions)
            .map(|(&anchor, region)| {
                route_arrow(
                    &region.shape.translated(dx as f64, dy as f64),
                    anchor,
                    config.arrows.boundary_samples_per_edge,
                    config.arrows.head_length,
                    config.arrows.head_half_angle,
                )
            })
            .collect();

        let overflowing_captions = match layout.caption {
            Some(rect) => {
                let (inner_w, _) = rect.inner_size(config.borders.caption.width);
                events
                    .iter()
                    .filter(|(_, caption)| !caption_fits(&text.caption, inner_w, caption))
                    .map(|(second, caption)| {
                        tracing::warn!(
                            second,
                            caption,
                            panel_width = inner_w,
                            "Caption is wider than its panel"
                        );
                        caption.to_string()
                    })
                    .collect()
            }
            None => Vec::new(),
        };

        tracing::debug!(
            width = layout.width,
            height = layout.height,
            regions = regions.len(),
            cameras,
            "Frame compositor ready"
        );

        Ok(Self {
            config,
            layout,
            background,
            regions,
            masks,
            mapper,
            text,
            colorbar,
            arrows,
            overflowing_captions,
        })
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    pub fn mapper(&self) -> &ColorMapper {
        &self.mapper
    }

    pub fn frame_size(&self) -> (u32, u32) {
        (self.layout.width, self.layout.height)
    }

    /// Captions that do not fit on one line of the caption panel.
    pub fn overflowing_captions(&self) -> &[String] {
        &self.overflowing_captions
    }

    /// Build the per-frame context for `row`, mapping each region's value.
    pub fn context<'a>(
        &self,
        row: AlignedRow,
        captions: Vec<(i64, &'a str)>,
        camera_frames: Vec<Option<RgbImage>>,
    ) -> FrameContext<'a> {
        let colors = (0..self.regions.len())
            .map(|i| self.mapper.map(row.values.get(i).copied().flatten()))
            .collect();
        FrameContext {
            row,
            colors,
            captions,
            camera_frames,
        }
    }

    /// Compose one output frame.
    pub fn compose(&self, ctx: &FrameContext<'_>) -> RgbImage {
        let config = &self.config;
        let mut frame = RgbImage::from_pixel(self.layout.width, self.layout.height, Rgb([255, 255, 255]));

        let shapes = self.layer_regions(&ctx.colors);
        let mut main = self.blend(&shapes);
        for region in &self.regions {
            let centre = region.centre();
            self.text
                .label
                .draw_centered(&mut main, centre.x as i32, centre.y as i32, &region.name);
        }
        paste(&mut frame, &add_border(&main, &config.borders.main), self.layout.main);

        paste(&mut frame, &self.colorbar, self.layout.colorbar);

        let (rw, rh) = self.layout.readout.inner_size(config.borders.readout.width);
        let readout = render_readout(rw, rh, ctx.row.second, config, &self.text);
        paste(&mut frame, &readout, self.layout.readout);

        if let Some(rect) = self.layout.caption {
            let (w, h) = rect.inner_size(config.borders.caption.width);
            paste(
                &mut frame,
                &render_caption(w, h, &ctx.captions, config, &self.text),
                rect,
            );
        }

        for slot in self.layout.side_slots() {
            let panel = match slot.content {
                SlotContent::Camera(i) => {
                    let (w, h) = slot.rect.inner_size(config.borders.camera.width);
                    let source = ctx.camera_frames.get(i).and_then(Option::as_ref);
                    render_camera_panel(source, w, h, config, &self.text)
                }
                SlotContent::BarChart => {
                    let (w, h) = slot.rect.inner_size(config.borders.bar_chart.width);
                    render_bar_chart(
                        w,
                        h,
                        &self.regions,
                        &ctx.row.values,
                        &ctx.colors,
                        config,
                        &self.text,
                    )
                }
            };
            paste(&mut frame, &panel, slot.rect);
        }

        let arrow_color = Rgb(config.arrows.color);
        for arrow in &self.arrows {
            for (a, b) in arrow.segments() {
                draw_thick_segment_mut(&mut frame, a, b, config.arrows.thickness, arrow_color);
            }
        }

        frame
    }

    /// Overlay every region's recolored mask. Where regions overlap the
    /// colours are averaged pairwise in region order.
    fn layer_regions(&self, colors: &[Rgb<u8>]) -> Vec<Option<[f32; 3]>> {
        let (w, h) = self.background.dimensions();
        let mut canvas: Vec<Option<[f32; 3]>> = vec![None; w as usize * h as usize];
        let outline = Rgb(self.config.regions.outline_color);

        for (masks, color) in self.masks.iter().zip(colors) {
            let merged = masks.recolor(*color, outline).merged();
            for (cell, px) in canvas.iter_mut().zip(merged.pixels()) {
                let Some(px) = px else {
                    continue;
                };
                let value = px.0.map(f32::from);
                *cell = Some(match cell {
                    Some(prev) => [
                        (prev[0] + value[0]) / 2.0,
                        (prev[1] + value[1]) / 2.0,
                        (prev[2] + value[2]) / 2.0,
                    ],
                    None => value,
                });
            }
        }
        canvas
    }

    /// `opacity * (shape or bg) + (1 - opacity) * bg + gamma`, per channel.
    fn blend(&self, shapes: &[Option<[f32; 3]>]) -> RgbImage {
        let opacity = self.config.blend.opacity as f32;
        let gamma = self.config.blend.gamma as f32;
        let mut out = self.background.clone();
        for (px, shape) in out.pixels_mut().zip(shapes) {
            for c in 0..3 {
                let bg = px.0[c] as f32;
                let fg = shape.map_or(bg, |s| s[c]);
                px.0[c] = (opacity * fg + (1.0 - opacity) * bg + gamma)
                    .round()
                    .clamp(0.0, 255.0) as u8;
            }
        }
        out
    }
}

fn paste(frame: &mut RgbImage, panel: &RgbImage, rect: PanelRect) {
    debug_assert_eq!(panel.dimensions(), (rect.width, rect.height));
    imageops::replace(frame, panel, rect.x as i64, rect.y as i64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use heatreel_scene_model::region::{Point, RegionShape};

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> RegionShape {
        RegionShape::Rectangle {
            start: Point::new(x0, y0),
            end: Point::new(x1, y1),
        }
    }

    fn opaque_config() -> RenderConfig {
        let mut config = RenderConfig::default();
        config.blend.opacity = 1.0;
        config.blend.gamma = 0.0;
        config.scale.min = 0.0;
        config.scale.max = 10.0;
        config
    }

    fn compositor(config: RenderConfig, regions: Vec<Region>, cameras: usize) -> FrameCompositor {
        let text = TextStyles::without_fonts(&config.fonts);
        FrameCompositor::new(
            Arc::new(config),
            RgbImage::from_pixel(200, 150, Rgb([40, 40, 40])),
            regions,
            &EventAnnotations::new(),
            cameras,
            text,
        )
        .unwrap()
    }

    fn row(second: i64, values: &[Option<f64>]) -> AlignedRow {
        AlignedRow {
            second,
            values: values.to_vec(),
        }
    }

    fn frame_pixel(c: &FrameCompositor, frame: &RgbImage, x: u32, y: u32) -> Rgb<u8> {
        let (dx, dy) = c.layout().region_offset;
        *frame.get_pixel(x + dx, y + dy)
    }

    #[test]
    fn region_interior_takes_mapped_colour() {
        let regions = vec![
            Region::new(0, "a", rect(10.0, 10.0, 60.0, 60.0)),
            Region::new(1, "b", rect(100.0, 10.0, 150.0, 60.0)),
        ];
        let c = compositor(opaque_config(), regions, 0);
        let ctx = c.context(row(0, &[Some(2.0), None]), Vec::new(), Vec::new());
        let frame = c.compose(&ctx);

        assert_eq!(frame.dimensions(), c.frame_size());
        assert_eq!(frame_pixel(&c, &frame, 20, 20), c.mapper().map(Some(2.0)));
        assert_eq!(frame_pixel(&c, &frame, 110, 20), c.mapper().map(None));
        // Outside every region the background shows through.
        assert_eq!(frame_pixel(&c, &frame, 80, 100), Rgb([40, 40, 40]));
    }

    #[test]
    fn overlap_averages_region_colours() {
        let regions = vec![
            Region::new(0, "a", rect(10.0, 10.0, 80.0, 80.0)),
            Region::new(1, "b", rect(50.0, 50.0, 120.0, 120.0)),
        ];
        let c = compositor(opaque_config(), regions, 0);
        let ctx = c.context(row(0, &[Some(0.0), Some(10.0)]), Vec::new(), Vec::new());
        let frame = c.compose(&ctx);

        let (lo, hi) = (ctx.colors[0], ctx.colors[1]);
        let expected = Rgb([0, 1, 2].map(|i| ((lo.0[i] as f32 + hi.0[i] as f32) / 2.0).round() as u8));
        assert_eq!(frame_pixel(&c, &frame, 65, 65), expected);
    }

    #[test]
    fn blend_applies_opacity_and_gamma() {
        let mut config = opaque_config();
        config.blend.opacity = 0.5;
        config.blend.gamma = 10.0;
        let regions = vec![Region::new(0, "a", rect(10.0, 10.0, 60.0, 60.0))];
        let c = compositor(config, regions, 0);
        let ctx = c.context(row(0, &[None]), Vec::new(), Vec::new());
        let frame = c.compose(&ctx);

        let missing = c.mapper().map(None);
        let expected = Rgb([0, 1, 2].map(|i| (0.5 * missing.0[i] as f32 + 0.5 * 40.0 + 10.0).round() as u8));
        assert_eq!(frame_pixel(&c, &frame, 20, 20), expected);
        assert_eq!(frame_pixel(&c, &frame, 100, 100), Rgb([50, 50, 50]));
    }

    #[test]
    fn more_cameras_than_regions_is_rejected() {
        let config = opaque_config();
        let text = TextStyles::without_fonts(&config.fonts);
        let err = FrameCompositor::new(
            Arc::new(config),
            RgbImage::new(100, 100),
            vec![Region::new(0, "a", rect(1.0, 1.0, 5.0, 5.0))],
            &EventAnnotations::new(),
            2,
            text,
        )
        .err()
        .unwrap();
        assert!(err.is_config());
    }

    #[test]
    fn arrows_are_drawn_towards_cameras() {
        let mut config = opaque_config();
        config.arrows.color = [255, 0, 255];
        let regions = vec![
            Region::new(0, "a", rect(10.0, 10.0, 60.0, 60.0)),
            Region::new(1, "b", rect(100.0, 10.0, 150.0, 60.0)),
        ];
        let c = compositor(config, regions, 2);
        let ctx = c.context(
            row(0, &[Some(1.0), Some(2.0)]),
            Vec::new(),
            vec![None, None],
        );
        let frame = c.compose(&ctx);
        assert!(frame.pixels().any(|p| *p == Rgb([255, 0, 255])));
    }

    #[test]
    fn long_captions_are_reported() {
        let config = opaque_config();
        let text = TextStyles::without_fonts(&config.fonts);
        let mut events = EventAnnotations::new();
        events.insert(1, "ok");
        events.insert(2, "x".repeat(200));
        let c = FrameCompositor::new(
            Arc::new(config),
            RgbImage::new(200, 150),
            vec![Region::new(0, "a", rect(1.0, 1.0, 50.0, 50.0))],
            &events,
            0,
            text,
        )
        .unwrap();
        assert_eq!(c.overflowing_captions().len(), 1);
        assert!(c.layout().caption.is_some());
    }
}
