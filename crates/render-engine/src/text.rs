//! Font loading and centred text drawing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ab_glyph::{FontVec, PxScale};
use heatreel_common::error::{HeatreelError, HeatreelResult};
use heatreel_scene_model::config::{FontConfig, TextStyle};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};

/// Fonts tried when the scene names none.
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Loaded fonts, shared between styles that name the same file.
#[derive(Default)]
struct FontBook {
    fonts: HashMap<PathBuf, Arc<FontVec>>,
}

impl FontBook {
    fn load(&mut self, path: &Path, field: &str) -> HeatreelResult<Arc<FontVec>> {
        if let Some(font) = self.fonts.get(path) {
            return Ok(font.clone());
        }
        let bytes = std::fs::read(path).map_err(|e| {
            HeatreelError::config(field, format!("cannot read font {}: {e}", path.display()))
        })?;
        let font = FontVec::try_from_vec(bytes).map_err(|e| {
            HeatreelError::config(field, format!("invalid font {}: {e}", path.display()))
        })?;
        let font = Arc::new(font);
        self.fonts.insert(path.to_path_buf(), font.clone());
        Ok(font)
    }
}

/// Draws one text style. Without a font, text is measured approximately and
/// not drawn.
#[derive(Clone)]
pub struct TextPainter {
    font: Option<Arc<FontVec>>,
    scale: PxScale,
    color: Rgb<u8>,
}

impl std::fmt::Debug for TextPainter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextPainter")
            .field("has_font", &self.font.is_some())
            .field("size", &self.scale.y)
            .field("color", &self.color)
            .finish()
    }
}

impl TextPainter {
    pub fn new(font: Option<Arc<FontVec>>, size: f32, color: Rgb<u8>) -> Self {
        Self {
            font,
            scale: PxScale::from(size),
            color,
        }
    }

    /// Width and height of `text` in pixels.
    pub fn measure(&self, text: &str) -> (u32, u32) {
        match &self.font {
            Some(font) => text_size(self.scale, &**font, text),
            None => (
                (text.chars().count() as f32 * self.scale.x * 3.0 / 5.0).ceil() as u32,
                self.scale.y.ceil() as u32,
            ),
        }
    }

    /// Draw with the top-left corner of the text box at `(x, y)`.
    pub fn draw(&self, canvas: &mut RgbImage, x: i32, y: i32, text: &str) {
        if let Some(font) = &self.font {
            draw_text_mut(canvas, self.color, x, y, self.scale, &**font, text);
        }
    }

    /// Draw with the text box centred on `(cx, cy)`.
    pub fn draw_centered(&self, canvas: &mut RgbImage, cx: i32, cy: i32, text: &str) {
        let (w, h) = self.measure(text);
        self.draw(canvas, cx - w as i32 / 2, cy - h as i32 / 2, text);
    }
}

/// One painter per panel text style.
#[derive(Debug, Clone)]
pub struct TextStyles {
    pub label: TextPainter,
    pub caption: TextPainter,
    pub readout: TextPainter,
    pub colorbar_heading: TextPainter,
    pub colorbar_ticks: TextPainter,
    pub camera: TextPainter,
    pub bar_chart: TextPainter,
}

impl TextStyles {
    /// Load every configured font. Relative font paths resolve against
    /// `root`; a style without a font uses `default_font`, then the first
    /// system font found.
    pub fn load(fonts: &FontConfig, root: &Path) -> HeatreelResult<Self> {
        let mut book = FontBook::default();

        let default = match &fonts.default_font {
            Some(path) => Some(book.load(&root.join(path), "fonts.default_font")?),
            None => system_font(&mut book),
        };
        if default.is_none() {
            tracing::warn!("No font configured or found on the system; text will not be drawn");
        }

        let mut painter = |name: &str, style: &TextStyle| -> HeatreelResult<TextPainter> {
            let font = match &style.font {
                Some(path) => Some(book.load(&root.join(path), &format!("fonts.{name}.font"))?),
                None => default.clone(),
            };
            Ok(TextPainter::new(font, style.size, Rgb(style.color)))
        };

        Ok(Self {
            label: painter("label", &fonts.label)?,
            caption: painter("caption", &fonts.caption)?,
            readout: painter("readout", &fonts.readout)?,
            colorbar_heading: painter("colorbar_heading", &fonts.colorbar_heading)?,
            colorbar_ticks: painter("colorbar_ticks", &fonts.colorbar_ticks)?,
            camera: painter("camera", &fonts.camera)?,
            bar_chart: painter("bar_chart", &fonts.bar_chart)?,
        })
    }

    /// Styles that measure text but never draw it.
    pub fn without_fonts(fonts: &FontConfig) -> Self {
        let painter = |style: &TextStyle| TextPainter::new(None, style.size, Rgb(style.color));
        Self {
            label: painter(&fonts.label),
            caption: painter(&fonts.caption),
            readout: painter(&fonts.readout),
            colorbar_heading: painter(&fonts.colorbar_heading),
            colorbar_ticks: painter(&fonts.colorbar_ticks),
            camera: painter(&fonts.camera),
            bar_chart: painter(&fonts.bar_chart),
        }
    }
}

fn system_font(book: &mut FontBook) -> Option<Arc<FontVec>> {
    SYSTEM_FONT_CANDIDATES
        .iter()
        .map(Path::new)
        .filter(|p| p.is_file())
        .find_map(|p| match book.load(p, "fonts.default_font") {
            Ok(font) => {
                tracing::debug!(path = %p.display(), "Using system font");
                Some(font)
            }
            Err(e) => {
                tracing::debug!(path = %p.display(), error = %e, "Skipping unusable system font");
                None
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fontless_measure_scales_with_length() {
        let painter = TextPainter::new(None, 20.0, Rgb([0, 0, 0]));
        let (short, h) = painter.measure("ab");
        let (long, _) = painter.measure("abcd");
        assert_eq!(h, 20);
        assert_eq!(long, short * 2);
    }

    #[test]
    fn fontless_draw_leaves_canvas_untouched() {
        let painter = TextPainter::new(None, 20.0, Rgb([0, 0, 0]));
        let mut canvas = RgbImage::from_pixel(50, 50, Rgb([255, 255, 255]));
        painter.draw_centered(&mut canvas, 25, 25, "hello");
        assert!(canvas.pixels().all(|p| *p == Rgb([255, 255, 255])));
    }

    #[test]
    fn unreadable_font_names_its_style() {
        let mut fonts = FontConfig::default();
        fonts.caption.font = Some(PathBuf::from("missing-font.ttf"));
        let dir = tempfile::tempdir().unwrap();
        let err = TextStyles::load(&fonts, dir.path()).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("fonts.caption.font"));
    }
}
