//! Deterministic font sources for unit tests.

use std::{cell::Cell, rc::Rc};

use glam::IVec2;

use crate::{
    effect::AlphaBitmap,
    font::{FontLoader, FontSource, GlyphId, LineMetrics, MalformedFont, RasterizedGlyph},
};

/// Renders every supported character as a solid block half as wide as
/// the font size. Spaces are empty.
pub struct BlockFont {
    chars: Vec<char>,
    kerning: f32,
    rasterized: Rc<Cell<usize>>,
}

impl BlockFont {
    pub fn new(chars: &str) -> Self {
        Self {
            chars: chars.chars().collect(),
            kerning: 0.0,
            rasterized: Rc::new(Cell::new(0)),
        }
    }

    pub fn with_kerning(mut self, kerning: f32) -> Self {
        self.kerning = kerning;
        self
    }

    /// Counts calls to `rasterize`.
    pub fn counter(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.rasterized)
    }
}

impl FontSource for BlockFont {
    fn glyph_id(&self, codepoint: char) -> Option<GlyphId> {
        self.chars
            .iter()
            .position(|&c| c == codepoint)
            .map(|i| GlyphId(i as u16 + 1))
    }

    fn rasterize(&self, glyph: GlyphId, size: f32) -> RasterizedGlyph {
        self.rasterized.set(self.rasterized.get() + 1);
        let width = (size / 2.0).ceil() as u32;
        let height = size.ceil() as u32;
        let c = self.chars[glyph.0 as usize - 1];
        let bitmap = if c == ' ' {
            AlphaBitmap::default()
        } else {
            AlphaBitmap::from_raw(width, height, vec![255; (width * height) as usize])
        };
        RasterizedGlyph {
            bitmap,
            offset: IVec2::new(0, -(height as i32)),
            advance: width as f32 + 1.0,
        }
    }

    fn kerning(&self, _left: GlyphId, _right: GlyphId, _size: f32) -> f32 {
        self.kerning
    }

    fn line_metrics(&self, size: f32) -> LineMetrics {
        LineMetrics {
            ascent: size * 0.75,
            descent: -size * 0.25,
            line_gap: 0.0,
        }
    }
}

/// Loads every byte string as a [`BlockFont`] covering the bytes
/// interpreted as ASCII. Empty data is malformed.
pub struct BlockLoader;

impl FontLoader for BlockLoader {
    fn load(&self, data: &[u8]) -> Result<Box<dyn FontSource>, MalformedFont> {
        if data.is_empty() {
            return Err(MalformedFont);
        }
        let chars: String = data.iter().map(|&b| b as char).collect();
        Ok(Box::new(BlockFont::new(&chars)))
    }
}
