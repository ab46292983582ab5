//! [`FontLoader`] backed by `fontdue`.

use fontdue::FontSettings;
use glam::IVec2;

use crate::{
    effect::AlphaBitmap,
    font::{FontLoader, FontSource, GlyphId, LineMetrics, MalformedFont, RasterizedGlyph},
};

/// Loads TrueType and OpenType fonts with `fontdue`.
#[derive(Debug, Default, Copy, Clone)]
pub struct FontdueLoader;

impl FontLoader for FontdueLoader {
    fn load(&self, data: &[u8]) -> Result<Box<dyn FontSource>, MalformedFont> {
        let font = fontdue::Font::from_bytes(data, FontSettings::default()).map_err(|e| {
            log::warn!("Rejected font data: {}", e);
            MalformedFont
        })?;
        Ok(Box::new(FontdueSource { font }))
    }
}

struct FontdueSource {
    font: fontdue::Font,
}

impl FontSource for FontdueSource {
    fn glyph_id(&self, codepoint: char) -> Option<GlyphId> {
        // index 0 is .notdef
        match self.font.lookup_glyph_index(codepoint) {
            0 => None,
            index => Some(GlyphId(index)),
        }
    }

    fn rasterize(&self, glyph: GlyphId, size: f32) -> RasterizedGlyph {
        let (metrics, coverage) = self.font.rasterize_indexed(glyph.0, size);
        let height = metrics.height as i32;
        RasterizedGlyph {
            bitmap: AlphaBitmap::from_raw(metrics.width as u32, metrics.height as u32, coverage),
            // fontdue measures ymin upwards from the baseline
            offset: IVec2::new(metrics.xmin, -(metrics.ymin + height)),
            advance: metrics.advance_width,
        }
    }

    fn kerning(&self, left: GlyphId, right: GlyphId, size: f32) -> f32 {
        self.font
            .horizontal_kern_indexed(left.0, right.0, size)
            .unwrap_or(0.0)
    }

    fn line_metrics(&self, size: f32) -> LineMetrics {
        self.font
            .horizontal_line_metrics(size)
            .map(|m| LineMetrics {
                ascent: m.ascent,
                descent: m.descent,
                line_gap: m.line_gap,
            })
            .unwrap_or_default()
    }
}
