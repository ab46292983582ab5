//! Font sources and codepoint resolution.
//!
//! Parsing and rasterization are provided by a [`FontLoader`] and the
//! [`FontSource`]s it produces. With the `fontdue` feature enabled,
//! [`FontdueLoader`](fontdue_loader::FontdueLoader) is available.

use glam::IVec2;

use crate::effect::AlphaBitmap;

#[cfg(feature = "fontdue")]
pub mod fontdue_loader;

/// Index of a glyph within one font source.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlyphId(pub u16);

/// A glyph bitmap together with its metrics, in pixels at the
/// requested size.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RasterizedGlyph {
    pub bitmap: AlphaBitmap,
    /// Offset from the pen position on the baseline to the
    /// top-left corner of the bitmap. Positive `y` points down.
    pub offset: IVec2,
    pub advance: f32,
}

/// Vertical metrics of a font at some size. `descent` is negative
/// below the baseline.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct LineMetrics {
    pub ascent: f32,
    pub descent: f32,
    pub line_gap: f32,
}

impl LineMetrics {
    pub fn line_height(&self) -> f32 {
        self.ascent - self.descent + self.line_gap
    }
}

/// A parsed font program.
///
/// Implementations must be deterministic: the same inputs always
/// produce the same glyph ids and bitmaps.
pub trait FontSource {
    /// Returns `None` if the font has no glyph for `codepoint`.
    fn glyph_id(&self, codepoint: char) -> Option<GlyphId>;

    fn rasterize(&self, glyph: GlyphId, size: f32) -> RasterizedGlyph;

    /// Horizontal adjustment between two adjacent glyphs.
    fn kerning(&self, _left: GlyphId, _right: GlyphId, _size: f32) -> f32 {
        0.0
    }

    fn line_metrics(&self, size: f32) -> LineMetrics;
}

/// Parses raw font data into [`FontSource`]s.
pub trait FontLoader {
    fn load(&self, data: &[u8]) -> Result<Box<dyn FontSource>, MalformedFont>;
}

#[derive(Debug, thiserror::Error)]
#[error("failed to parse font as TTF/OTF font data")]
pub struct MalformedFont;

/// Identifies a font source by its position in the fallback chain.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FontId(usize);

impl FontId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// The ordered fallback chain of font sources.
///
/// Sources are only ever appended. Earlier sources take
/// precedence for every codepoint they contain.
#[derive(Default)]
pub(crate) struct Fonts {
    sources: Vec<Box<dyn FontSource>>,
}

impl Fonts {
    pub fn add(&mut self, source: Box<dyn FontSource>) -> FontId {
        let id = FontId(self.sources.len());
        self.sources.push(source);
        log::info!("Added font source #{}", id.0);
        id
    }

    pub fn get(&self, id: FontId) -> Option<&dyn FontSource> {
        self.sources.get(id.0).map(|s| s.as_ref())
    }

    /// The source used for line metrics.
    pub fn primary(&self) -> Option<&dyn FontSource> {
        self.sources.first().map(|s| s.as_ref())
    }

    /// Finds the first source containing `codepoint`.
    pub fn resolve(&self, codepoint: char) -> Option<(FontId, GlyphId)> {
        self.sources
            .iter()
            .enumerate()
            .find_map(|(i, source)| source.glyph_id(codepoint).map(|g| (FontId(i), g)))
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn clear(&mut self) {
        self.sources.clear();
    }
}
