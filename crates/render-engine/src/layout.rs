//! Output frame geometry.
//!
//! The frame is three columns joined left to right:
//!
//! ```text
//! ┌────────┬──────────────────────────┬────────┐
//! │ cam 0  │ caption panel            │ cam n/2│
//! │        ├──────────────────────────┤        │
//! │ cam 1  │ main shapes image        │  ...   │
//! │        │                          │        │
//! ├────────┤                          │        │
//! │ bars   ├─────────────────┬────────┤        │
//! │        │ colorbar        │ second │        │
//! └────────┴─────────────────┴────────┘────────┘
//! ```
//!
//! All sizes are fixed for a render, so every frame has the same dimensions.

use heatreel_common::error::{HeatreelError, HeatreelResult};
use heatreel_scene_model::config::RenderConfig;
use heatreel_scene_model::region::Point;

/// Axis-aligned pixel rectangle in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PanelRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Size left after removing a border of `border` pixels on every side.
    pub fn inner_size(&self, border: u32) -> (u32, u32) {
        (
            self.width.saturating_sub(2 * border),
            self.height.saturating_sub(2 * border),
        )
    }
}

/// What a side-column slot shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotContent {
    /// Camera source by index (also the index of the region it points at).
    Camera(usize),
    BarChart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SideSlot {
    pub rect: PanelRect,
    pub content: SlotContent,
}

/// Placement of every panel in the output frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameLayout {
    pub width: u32,
    pub height: u32,
    /// Resized background size; region coordinates live in this space.
    pub background: (u32, u32),
    /// Bordered main shapes image.
    pub main: PanelRect,
    /// Present only when the scene has event captions.
    pub caption: Option<PanelRect>,
    pub colorbar: PanelRect,
    pub readout: PanelRect,
    pub left: Vec<SideSlot>,
    pub right: Vec<SideSlot>,
    /// Where background pixel (0, 0) lands in the frame.
    pub region_offset: (u32, u32),
    /// Inner-edge midpoint of each camera panel, indexed by camera.
    pub camera_anchors: Vec<Point>,
}

impl FrameLayout {
    /// Lay out a frame for a `bg_width` x `bg_height` background.
    pub fn compute(
        config: &RenderConfig,
        bg_width: u32,
        bg_height: u32,
        cameras: usize,
        has_captions: bool,
    ) -> HeatreelResult<Self> {
        let layout = &config.layout;
        let borders = &config.borders;

        let main_border = borders.main.width;
        let main_width = bg_width + 2 * main_border;

        let lower_height = (bg_height as f64 * layout.colorbar_height_fraction) as u32;
        let readout_width = (bg_width as f64 * layout.readout_width_fraction) as u32;

        let caption_height = if has_captions {
            let inner =
                (layout.caption_height_fraction * (lower_height + bg_height) as f64) as u32;
            inner + 2 * borders.caption.width
        } else {
            0
        };

        let main_height = bg_height + 2 * main_border;
        let total_height = caption_height + main_height + lower_height;

        let side_width = (bg_width as f64 * layout.side_panel_width_fraction) as u32;
        let (left_slots, right_slots, left_width, right_width) = if cameras > 0 {
            let lhs = cameras / 2;
            let mut left: Vec<SlotContent> = (0..lhs).map(SlotContent::Camera).collect();
            left.push(SlotContent::BarChart);
            let right: Vec<SlotContent> = (lhs..cameras).map(SlotContent::Camera).collect();
            let column = side_width + 2 * borders.camera.width;
            (left, right, column, column)
        } else if config.output.bar_chart_without_cameras {
            let column = side_width + 2 * borders.bar_chart.width;
            (vec![SlotContent::BarChart], Vec::new(), column, 0)
        } else {
            (Vec::new(), Vec::new(), 0, 0)
        };

        let lower_y = caption_height + main_height;
        let colorbar = PanelRect::new(left_width, lower_y, main_width - readout_width, lower_height);
        let readout = PanelRect::new(
            left_width + main_width - readout_width,
            lower_y,
            readout_width,
            lower_height,
        );
        let main = PanelRect::new(left_width, caption_height, main_width, main_height);
        let caption = has_captions.then(|| PanelRect::new(left_width, 0, main_width, caption_height));

        let left = column_slots(&left_slots, 0, left_width, total_height);
        let right = column_slots(&right_slots, left_width + main_width, right_width, total_height);

        let mut camera_anchors = vec![Point::new(0.0, 0.0); cameras];
        for slot in &left {
            if let SlotContent::Camera(i) = slot.content {
                camera_anchors[i] = Point::new(
                    left_width as f64,
                    slot.rect.y as f64 + slot.rect.height as f64 / 2.0,
                );
            }
        }
        for slot in &right {
            if let SlotContent::Camera(i) = slot.content {
                camera_anchors[i] = Point::new(
                    (left_width + main_width) as f64,
                    slot.rect.y as f64 + slot.rect.height as f64 / 2.0,
                );
            }
        }

        let frame = Self {
            width: left_width + main_width + right_width,
            height: total_height,
            background: (bg_width, bg_height),
            main,
            caption,
            colorbar,
            readout,
            left,
            right,
            region_offset: (left_width + main_border, caption_height + main_border),
            camera_anchors,
        };
        frame.check_panels(config)?;
        Ok(frame)
    }

    /// All side slots, left column first.
    pub fn side_slots(&self) -> impl Iterator<Item = &SideSlot> {
        self.left.iter().chain(&self.right)
    }

    fn check_panels(&self, config: &RenderConfig) -> HeatreelResult<()> {
        let borders = &config.borders;
        let mut panels = vec![
            ("layout.colorbar_height_fraction", self.colorbar, borders.colorbar.width),
            ("layout.readout_width_fraction", self.readout, borders.readout.width),
        ];
        if let Some(caption) = self.caption {
            panels.push(("layout.caption_height_fraction", caption, borders.caption.width));
        }
        for slot in self.side_slots() {
            let border = match slot.content {
                SlotContent::Camera(_) => borders.camera.width,
                SlotContent::BarChart => borders.bar_chart.width,
            };
            panels.push(("layout.side_panel_width_fraction", slot.rect, border));
        }

        for (field, rect, border) in panels {
            let (w, h) = rect.inner_size(border);
            if w == 0 || h == 0 {
                return Err(HeatreelError::config(
                    field,
                    format!(
                        "panel of {}x{} leaves no room inside a {border}px border",
                        rect.width, rect.height
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// Split `total_height` between `contents`, top to bottom, with no gaps.
fn column_slots(contents: &[SlotContent], x: u32, width: u32, total_height: u32) -> Vec<SideSlot> {
    let n = contents.len() as u64;
    contents
        .iter()
        .enumerate()
        .map(|(k, &content)| {
            let k = k as u64;
            let top = (k * total_height as u64 / n) as u32;
            let bottom = ((k + 1) * total_height as u64 / n) as u32;
            SideSlot {
                rect: PanelRect::new(x, top, width, bottom - top),
                content,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RenderConfig {
        RenderConfig::default()
    }

    #[test]
    fn no_cameras_puts_bar_chart_on_the_left() {
        let layout = FrameLayout::compute(&config(), 800, 600, 0, false).unwrap();
        assert_eq!(layout.left.len(), 1);
        assert_eq!(layout.left[0].content, SlotContent::BarChart);
        assert!(layout.right.is_empty());
        assert_eq!(layout.left[0].rect.height, layout.height);
        assert!(layout.caption.is_none());
        assert_eq!(layout.main.y, 0);
    }

    #[test]
    fn columns_tile_the_frame() {
        let layout = FrameLayout::compute(&config(), 800, 600, 3, true).unwrap();
        let main_right = layout.main.x + layout.main.width;
        assert_eq!(layout.colorbar.x, layout.main.x);
        assert_eq!(layout.readout.x + layout.readout.width, main_right);
        assert_eq!(layout.colorbar.width + layout.readout.width, layout.main.width);
        assert_eq!(layout.colorbar.y + layout.colorbar.height, layout.height);

        let caption = layout.caption.unwrap();
        assert_eq!(caption.y + caption.height, layout.main.y);

        for column in [&layout.left, &layout.right] {
            let sum: u32 = column.iter().map(|s| s.rect.height).sum();
            assert_eq!(sum, layout.height);
        }
    }

    #[test]
    fn cameras_split_left_then_right() {
        let layout = FrameLayout::compute(&config(), 800, 600, 3, false).unwrap();
        // floor(3 / 2) cameras on the left plus the bar chart.
        let left: Vec<SlotContent> = layout.left.iter().map(|s| s.content).collect();
        assert_eq!(left, vec![SlotContent::Camera(0), SlotContent::BarChart]);
        let right: Vec<SlotContent> = layout.right.iter().map(|s| s.content).collect();
        assert_eq!(right, vec![SlotContent::Camera(1), SlotContent::Camera(2)]);

        let left_width = layout.left[0].rect.width;
        assert_eq!(layout.camera_anchors[0].x, left_width as f64);
        assert_eq!(
            layout.camera_anchors[1].x,
            (left_width + layout.main.width) as f64
        );
        let slot = layout.right[1].rect;
        assert_eq!(
            layout.camera_anchors[2].y,
            slot.y as f64 + slot.height as f64 / 2.0
        );
    }

    #[test]
    fn regions_are_offset_by_side_column_and_border() {
        let cfg = config();
        let layout = FrameLayout::compute(&cfg, 400, 300, 0, true).unwrap();
        let caption = layout.caption.unwrap();
        assert_eq!(
            layout.region_offset,
            (
                layout.main.x + cfg.borders.main.width,
                caption.height + cfg.borders.main.width
            )
        );
    }

    #[test]
    fn panel_without_room_is_a_config_error() {
        let mut cfg = config();
        cfg.layout.readout_width_fraction = 0.001;
        let err = FrameLayout::compute(&cfg, 400, 300, 0, false).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("readout_width_fraction"));
    }
}
