//! Render configuration.
//!
//! One [`RenderConfig`] is built per render and shared read-only by every
//! pipeline stage. Every section defaults independently, so a scene file
//! only needs to spell out what it changes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::sensor::StreamFormat;

/// An 8-bit RGB colour, written as `[r, g, b]`.
pub type ColorRgb = [u8; 3];

/// Complete render configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub scale: ScaleConfig,
    pub blend: BlendConfig,
    pub regions: RegionStyle,
    pub layout: LayoutConfig,
    pub colorbar: ColorbarConfig,
    pub borders: BorderSet,
    pub fonts: FontConfig,
    pub arrows: ArrowConfig,
    pub events: EventConfig,
    pub output: OutputConfig,
    pub input: StreamFormat,
}

/// Value-to-colour scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleConfig {
    /// Colormap name, optionally suffixed with `_r` to reverse it.
    pub colormap: String,

    pub min: f64,
    pub max: f64,

    /// Colour of regions whose stream has no data for the current second.
    pub missing_color: ColorRgb,

    /// Quantity name shown in the colorbar heading and bar chart.
    pub sensor_value_name: String,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            colormap: "viridis".to_string(),
            min: 0.0,
            max: 100.0,
            missing_color: [128, 128, 128],
            sensor_value_name: "Sensor value".to_string(),
        }
    }
}

/// Shape layer blending: `opacity * shapes + (1 - opacity) * background + gamma`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendConfig {
    pub opacity: f64,

    /// Bias added after blending, in 8-bit channel units.
    pub gamma: f64,
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self {
            opacity: 0.6,
            gamma: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionStyle {
    pub outline_color: ColorRgb,
    pub outline_thickness: u32,
}

impl Default for RegionStyle {
    fn default() -> Self {
        Self {
            outline_color: [0, 0, 0],
            outline_thickness: 2,
        }
    }
}

/// Proportional panel sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Width the background is resized to; height keeps the aspect ratio.
    pub base_width: u32,

    /// Colorbar row height as a fraction of the background height.
    pub colorbar_height_fraction: f64,

    /// Second readout width as a fraction of the base width.
    pub readout_width_fraction: f64,

    /// Caption panel height as a fraction of colorbar plus background height.
    pub caption_height_fraction: f64,

    /// Side column width as a fraction of the base width.
    pub side_panel_width_fraction: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            base_width: 800,
            colorbar_height_fraction: 0.2,
            readout_width_fraction: 0.2,
            caption_height_fraction: 0.08,
            side_panel_width_fraction: 0.3,
        }
    }
}

/// Colorbar legend geometry. Fractions are of the colorbar's inner size.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorbarConfig {
    /// Number of scale intervals; `dividers + 1` ticks are drawn.
    pub dividers: u32,

    pub horizontal_border_fraction: f64,
    pub top_border_fraction: f64,
    pub bottom_border_fraction: f64,
    pub tick_box_fraction: f64,
    pub heading_box_fraction: f64,

    /// Gap between tick labels and the start of the scale lines.
    pub tick_line_gap_fraction: f64,

    pub scale_line_color: ColorRgb,
    pub separator_color: ColorRgb,
    pub background_color: ColorRgb,
}

impl Default for ColorbarConfig {
    fn default() -> Self {
        Self {
            dividers: 4,
            horizontal_border_fraction: 0.05,
            top_border_fraction: 0.05,
            bottom_border_fraction: 0.1,
            tick_box_fraction: 0.2,
            heading_box_fraction: 0.25,
            tick_line_gap_fraction: 0.03,
            scale_line_color: [0, 0, 0],
            separator_color: [0, 0, 0],
            background_color: [255, 255, 255],
        }
    }
}

/// How a border is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorderKind {
    /// Solid colour.
    #[default]
    Constant,
    /// Repeat the outermost pixel of the panel.
    Replicate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BorderStyle {
    pub width: u32,
    pub color: ColorRgb,
    pub kind: BorderKind,
}

impl Default for BorderStyle {
    fn default() -> Self {
        Self {
            width: 2,
            color: [0, 0, 0],
            kind: BorderKind::Constant,
        }
    }
}

/// Per-panel borders.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BorderSet {
    pub main: BorderStyle,
    pub colorbar: BorderStyle,
    pub readout: BorderStyle,
    pub caption: BorderStyle,
    pub bar_chart: BorderStyle,
    pub camera: BorderStyle,
}

impl BorderSet {
    fn iter(&self) -> [(&'static str, &BorderStyle); 6] {
        [
            ("main", &self.main),
            ("colorbar", &self.colorbar),
            ("readout", &self.readout),
            ("caption", &self.caption),
            ("bar_chart", &self.bar_chart),
            ("camera", &self.camera),
        ]
    }
}

/// Font and colour for one kind of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    /// TrueType/OpenType file; falls back to `fonts.default_font`.
    pub font: Option<PathBuf>,

    /// Pixel height.
    pub size: f32,

    pub color: ColorRgb,
}

impl TextStyle {
    fn sized(size: f32) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font: None,
            size: 16.0,
            color: [0, 0, 0],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    /// Font used by every style that does not name its own. Without any font
    /// the frame layout is still produced but text is not drawn.
    pub default_font: Option<PathBuf>,

    pub label: TextStyle,
    pub caption: TextStyle,
    pub readout: TextStyle,
    pub colorbar_heading: TextStyle,
    pub colorbar_ticks: TextStyle,
    pub camera: TextStyle,
    pub bar_chart: TextStyle,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            default_font: None,
            label: TextStyle::sized(16.0),
            caption: TextStyle::sized(24.0),
            readout: TextStyle::sized(32.0),
            colorbar_heading: TextStyle::sized(18.0),
            colorbar_ticks: TextStyle::sized(14.0),
            camera: TextStyle {
                color: [255, 255, 255],
                ..TextStyle::sized(24.0)
            },
            bar_chart: TextStyle::sized(14.0),
        }
    }
}

impl FontConfig {
    pub fn styles(&self) -> [(&'static str, &TextStyle); 7] {
        [
            ("label", &self.label),
            ("caption", &self.caption),
            ("readout", &self.readout),
            ("colorbar_heading", &self.colorbar_heading),
            ("colorbar_ticks", &self.colorbar_ticks),
            ("camera", &self.camera),
            ("bar_chart", &self.bar_chart),
        ]
    }
}

/// Arrows linking regions to their camera panels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrowConfig {
    pub color: ColorRgb,
    pub thickness: u32,

    /// Angle between the shaft and each head segment, in radians.
    pub head_half_angle: f64,

    pub head_length: f64,

    /// Samples taken along each slanted polygon edge when searching for the
    /// arrow's boundary endpoint.
    pub boundary_samples_per_edge: u32,
}

impl Default for ArrowConfig {
    fn default() -> Self {
        Self {
            color: [0, 0, 0],
            thickness: 2,
            head_half_angle: std::f64::consts::FRAC_PI_6,
            head_length: 15.0,
            boundary_samples_per_edge: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// A caption is shown this many output seconds either side of its event.
    pub caption_half_window_secs: f64,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            caption_half_window_secs: 1.0,
        }
    }
}

/// Encoder selection for video output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    #[default]
    H264,
    Mpeg4,
}

impl VideoCodec {
    /// ffmpeg encoder name.
    pub fn encoder(self) -> &'static str {
        match self {
            Self::H264 => "libx264",
            Self::Mpeg4 => "mpeg4",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Length of the produced video. The frame rate is the aligned row count
    /// divided by this; unset plays one row per second.
    pub duration_secs: Option<f64>,

    pub codec: VideoCodec,

    /// Draw the live bar chart as a full-height left column when there are no
    /// camera panels.
    pub bar_chart_without_cameras: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            duration_secs: None,
            codec: VideoCodec::H264,
            bar_chart_without_cameras: true,
        }
    }
}

/// A configuration value outside its allowed range.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("`{field}`: {message}")]
pub struct ConfigViolation {
    pub field: String,
    pub message: String,
}

impl ConfigViolation {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

fn check_fraction(field: &str, value: f64, allow_zero: bool) -> Result<(), ConfigViolation> {
    let ok = value.is_finite() && value < 1.0 && (value > 0.0 || (allow_zero && value == 0.0));
    if ok {
        Ok(())
    } else {
        Err(ConfigViolation::new(
            field,
            format!("must be in {}0, 1), got {value}", if allow_zero { "[" } else { "(" }),
        ))
    }
}

impl RenderConfig {
    /// Check every value that does not depend on the scene's inputs.
    /// Returns the first offending field.
    pub fn validate(&self) -> Result<(), ConfigViolation> {
        let scale = &self.scale;
        if !scale.min.is_finite() || !scale.max.is_finite() || scale.min >= scale.max {
            return Err(ConfigViolation::new(
                "scale.min",
                format!(
                    "bounds must satisfy min < max, got min={} max={}",
                    scale.min, scale.max
                ),
            ));
        }
        if scale.colormap.trim().is_empty() {
            return Err(ConfigViolation::new("scale.colormap", "must not be empty"));
        }

        if !(0.0..=1.0).contains(&self.blend.opacity) {
            return Err(ConfigViolation::new(
                "blend.opacity",
                format!("must be in [0, 1], got {}", self.blend.opacity),
            ));
        }
        if !self.blend.gamma.is_finite() {
            return Err(ConfigViolation::new("blend.gamma", "must be finite"));
        }

        if self.regions.outline_thickness == 0 {
            return Err(ConfigViolation::new(
                "regions.outline_thickness",
                "must be at least 1",
            ));
        }

        let layout = &self.layout;
        if layout.base_width < 16 {
            return Err(ConfigViolation::new(
                "layout.base_width",
                format!("must be at least 16 pixels, got {}", layout.base_width),
            ));
        }
        check_fraction(
            "layout.colorbar_height_fraction",
            layout.colorbar_height_fraction,
            false,
        )?;
        check_fraction(
            "layout.readout_width_fraction",
            layout.readout_width_fraction,
            false,
        )?;
        check_fraction(
            "layout.caption_height_fraction",
            layout.caption_height_fraction,
            false,
        )?;
        check_fraction(
            "layout.side_panel_width_fraction",
            layout.side_panel_width_fraction,
            false,
        )?;

        let bar = &self.colorbar;
        if bar.dividers == 0 {
            return Err(ConfigViolation::new("colorbar.dividers", "must be at least 1"));
        }
        let fractions = [
            ("colorbar.horizontal_border_fraction", bar.horizontal_border_fraction),
            ("colorbar.top_border_fraction", bar.top_border_fraction),
            ("colorbar.bottom_border_fraction", bar.bottom_border_fraction),
            ("colorbar.tick_box_fraction", bar.tick_box_fraction),
            ("colorbar.heading_box_fraction", bar.heading_box_fraction),
            ("colorbar.tick_line_gap_fraction", bar.tick_line_gap_fraction),
        ];
        for (field, value) in fractions {
            check_fraction(field, value, true)?;
        }
        let vertical = bar.top_border_fraction
            + bar.bottom_border_fraction
            + bar.tick_box_fraction
            + bar.heading_box_fraction;
        if vertical >= 1.0 {
            return Err(ConfigViolation::new(
                "colorbar.heading_box_fraction",
                format!("vertical colorbar fractions sum to {vertical}, leaving no room for the gradient"),
            ));
        }
        if bar.horizontal_border_fraction >= 0.5 {
            return Err(ConfigViolation::new(
                "colorbar.horizontal_border_fraction",
                "must be below 0.5",
            ));
        }

        for (name, style) in self.fonts.styles() {
            if !(style.size.is_finite() && style.size > 0.0) {
                return Err(ConfigViolation::new(
                    format!("fonts.{name}.size"),
                    format!("must be positive, got {}", style.size),
                ));
            }
        }

        for (name, border) in self.borders.iter() {
            if border.width > 256 {
                return Err(ConfigViolation::new(
                    format!("borders.{name}.width"),
                    format!("{} is unreasonably wide", border.width),
                ));
            }
        }

        let arrows = &self.arrows;
        if arrows.thickness == 0 {
            return Err(ConfigViolation::new("arrows.thickness", "must be at least 1"));
        }
        if arrows.boundary_samples_per_edge == 0 {
            return Err(ConfigViolation::new(
                "arrows.boundary_samples_per_edge",
                "must be at least 1",
            ));
        }
        if !arrows.head_length.is_finite() || arrows.head_length < 0.0 {
            return Err(ConfigViolation::new(
                "arrows.head_length",
                "must be a non-negative number",
            ));
        }
        if !arrows.head_half_angle.is_finite() {
            return Err(ConfigViolation::new("arrows.head_half_angle", "must be finite"));
        }

        let half_window = self.events.caption_half_window_secs;
        if !half_window.is_finite() || half_window < 0.0 {
            return Err(ConfigViolation::new(
                "events.caption_half_window_secs",
                "must be a non-negative number",
            ));
        }

        if let Some(duration) = self.output.duration_secs {
            if !duration.is_finite() || duration <= 0.0 {
                return Err(ConfigViolation::new(
                    "output.duration_secs",
                    format!("must be positive, got {duration}"),
                ));
            }
        }

        Ok(())
    }

    /// Frame rate that fits `rows` aligned rows into the configured duration.
    pub fn frame_rate(&self, rows: usize) -> f64 {
        match self.output.duration_secs {
            Some(duration) if duration > 0.0 => rows as f64 / duration,
            _ => 1.0,
        }
    }

    /// Caption half-window in rows: `floor(fps * caption_half_window_secs)`.
    pub fn caption_half_window_rows(&self, fps: f64) -> i64 {
        (fps * self.events.caption_half_window_secs).floor() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        RenderConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let config: RenderConfig = serde_json::from_str(
            r#"{"scale": {"colormap": "magma_r", "max": 500}, "borders": {"main": {"width": 4}}}"#,
        )
        .unwrap();
        assert_eq!(config.scale.colormap, "magma_r");
        assert_eq!(config.scale.max, 500.0);
        assert_eq!(config.scale.min, 0.0);
        assert_eq!(config.borders.main.width, 4);
        assert_eq!(config.borders.main.kind, BorderKind::Constant);
        assert_eq!(config.colorbar.dividers, 4);
    }

    #[test]
    fn inverted_bounds_name_the_field() {
        let mut config = RenderConfig::default();
        config.scale.min = 10.0;
        config.scale.max = 10.0;
        let err = config.validate().unwrap_err();
        assert_eq!(err.field, "scale.min");
    }

    #[test]
    fn non_positive_duration_is_rejected() {
        let mut config = RenderConfig::default();
        config.output.duration_secs = Some(0.0);
        assert_eq!(config.validate().unwrap_err().field, "output.duration_secs");
    }

    #[test]
    fn crowded_colorbar_is_rejected() {
        let mut config = RenderConfig::default();
        config.colorbar.heading_box_fraction = 0.7;
        assert!(config.validate().is_err());
    }

    #[test]
    fn frame_rate_and_caption_window() {
        let mut config = RenderConfig::default();
        assert_eq!(config.frame_rate(120), 1.0);

        config.output.duration_secs = Some(30.0);
        let fps = config.frame_rate(120);
        assert_eq!(fps, 4.0);

        config.events.caption_half_window_secs = 0.6;
        assert_eq!(config.caption_half_window_rows(fps), 2);
    }

    #[test]
    fn border_kind_parses_lowercase() {
        let style: BorderStyle =
            serde_json::from_str(r#"{"width": 3, "color": [255, 0, 0], "kind": "replicate"}"#)
                .unwrap();
        assert_eq!(style.kind, BorderKind::Replicate);
        assert_eq!(style.color, [255, 0, 0]);
    }
}
