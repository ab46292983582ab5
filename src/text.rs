//! Per-size font handles and simple text layout.

use glam::{vec2, Vec2};

use crate::{
    glyph::{Glyph, GlyphCache},
    surface::SurfaceManager,
    system::{FontSystem, GlyphError},
};

/// A glyph positioned for drawing, in logical pixels.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PositionedGlyph {
    pub glyph: Glyph,
    /// Top-left corner of the glyph's atlas region on screen.
    pub pos: Vec2,
    pub size: Vec2,
}

/// A [`FontSystem`] at one pixel size.
///
/// Obtained through [`FontSystem::font`].
pub struct DynamicFont<'a, S> {
    system: &'a mut FontSystem<S>,
    size: u32,
}

impl<'a, S> DynamicFont<'a, S>
where
    S: SurfaceManager,
{
    pub(crate) fn new(system: &'a mut FontSystem<S>, size: u32) -> Self {
        Self { system, size }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn glyph(&mut self, codepoint: char) -> Result<Glyph, GlyphError> {
        self.system.glyph(self.size, codepoint)
    }

    pub fn cache(&self) -> Option<&GlyphCache> {
        self.system.glyph_cache(self.size)
    }

    /// Distance between baselines, excluding the configured line spacing.
    pub fn line_height(&self) -> f32 {
        self.system
            .fonts()
            .primary()
            .map(|f| f.line_metrics(self.raster_size()).line_height() / self.scale())
            .unwrap_or(0.0)
    }

    /// Size of the box enclosing every line of `text`.
    pub fn measure(&mut self, text: &str) -> Result<Vec2, GlyphError> {
        self.walk(text, Vec2::ZERO, |_| {})
    }

    /// Positions the glyphs of `text` with the top-left of the first
    /// line at `origin`. Glyphs without pixels are skipped.
    pub fn layout(&mut self, text: &str, origin: Vec2) -> Result<Vec<PositionedGlyph>, GlyphError> {
        let mut glyphs = Vec::with_capacity(text.len());
        self.walk(text, origin, |g| glyphs.push(g))?;
        Ok(glyphs)
    }

    fn scale(&self) -> f32 {
        self.system.settings().font_resolution_factor
    }

    fn raster_size(&self) -> f32 {
        self.size as f32 * self.scale()
    }

    fn walk(
        &mut self,
        text: &str,
        origin: Vec2,
        mut visit: impl FnMut(PositionedGlyph),
    ) -> Result<Vec2, GlyphError> {
        let scale = self.scale();
        let settings = self.system.settings();
        let character_spacing = settings.character_spacing as f32;
        let line_spacing = settings.line_spacing as f32;
        let use_kerning = settings.use_kerning;

        let ascent = self
            .system
            .fonts()
            .primary()
            .map(|f| f.line_metrics(self.raster_size()).ascent / scale)
            .unwrap_or(0.0);
        let line_height = self.line_height();

        let mut pen = vec2(origin.x, origin.y + ascent);
        let mut width: f32 = 0.0;
        let mut lines = 1;
        let mut previous: Option<Glyph> = None;

        for c in text.chars() {
            match c {
                '\n' => {
                    width = width.max(pen.x - origin.x);
                    pen.x = origin.x;
                    pen.y += line_height + line_spacing;
                    lines += 1;
                    previous = None;
                    continue;
                }
                '\r' => continue,
                _ => {}
            }

            let glyph = self.glyph(c)?;

            if let Some(previous) = previous {
                pen.x += character_spacing;
                if use_kerning && previous.font == glyph.font {
                    if let Some(source) = self.system.font_source(glyph.font) {
                        let kerning = source.kerning(previous.id, glyph.id, self.raster_size());
                        pen.x += kerning / scale;
                    }
                }
            }

            if !glyph.is_empty() {
                visit(PositionedGlyph {
                    glyph,
                    pos: pen + vec2(glyph.offset.x as f32, glyph.offset.y as f32) / scale,
                    size: vec2(glyph.bounds.width as f32, glyph.bounds.height as f32) / scale,
                });
            }

            pen.x += glyph.advance as f32 / scale;
            previous = Some(glyph);
        }

        width = width.max(pen.x - origin.x);
        let height = line_height * lines as f32 + line_spacing * (lines - 1) as f32;
        Ok(vec2(width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        settings::FontSystemSettings,
        surface::MemorySurfaces,
        testing::{BlockFont, BlockLoader},
    };

    fn system(settings: FontSystemSettings, font: BlockFont) -> FontSystem<MemorySurfaces> {
        let mut fonts = FontSystem::new(BlockLoader, MemorySurfaces::new(), &settings).unwrap();
        fonts.add_font_source(Box::new(font));
        fonts
    }

    #[test]
    fn measures_single_line() {
        let mut fonts = system(FontSystemSettings::default(), BlockFont::new("ab "));
        let mut font = fonts.font(20);
        // each glyph is 10 wide and advances 11
        assert_eq!(font.measure("ab a").unwrap(), vec2(44.0, 20.0));
        assert_eq!(font.line_height(), 20.0);
    }

    #[test]
    fn newlines_start_new_lines() {
        let settings = FontSystemSettings::default().line_spacing(4);
        let mut fonts = system(settings, BlockFont::new("ab"));
        let mut font = fonts.font(20);
        assert_eq!(font.measure("aaa\nb").unwrap(), vec2(33.0, 44.0));

        let glyphs = font.layout("a\nb", vec2(5.0, 0.0)).unwrap();
        assert_eq!(glyphs.len(), 2);
        // baseline at ascent 15, glyph top 20 above it
        assert_eq!(glyphs[0].pos, vec2(5.0, -5.0));
        assert_eq!(glyphs[1].pos, vec2(5.0, 19.0));
        assert_eq!(glyphs[1].size, vec2(10.0, 20.0));
    }

    #[test]
    fn spacing_and_kerning_adjust_the_pen() {
        let settings = FontSystemSettings::default().character_spacing(2);
        let mut fonts = system(settings, BlockFont::new("a").with_kerning(-3.0));
        let glyphs = fonts.font(20).layout("aa", Vec2::ZERO).unwrap();
        assert_eq!(glyphs[1].pos.x - glyphs[0].pos.x, 11.0 + 2.0 - 3.0);

        let settings = FontSystemSettings::default().use_kerning(false);
        let mut fonts = system(settings, BlockFont::new("a").with_kerning(-3.0));
        let glyphs = fonts.font(20).layout("aa", Vec2::ZERO).unwrap();
        assert_eq!(glyphs[1].pos.x - glyphs[0].pos.x, 11.0);
    }

    #[test]
    fn resolution_factor_scales_back_to_logical_pixels() {
        let settings = FontSystemSettings::default().font_resolution_factor(2.0);
        let mut fonts = system(settings, BlockFont::new("a"));
        let mut font = fonts.font(10);
        let glyph = font.glyph('a').unwrap();
        // rasterized at 20px
        assert_eq!(glyph.bounds.size(), glam::uvec2(10, 20));

        let glyphs = font.layout("a", Vec2::ZERO).unwrap();
        assert_eq!(glyphs[0].size, vec2(5.0, 10.0));
        assert_eq!(font.measure("aa").unwrap(), vec2(11.0, 10.0));
    }

    #[test]
    fn spaces_advance_without_glyphs() {
        let mut fonts = system(FontSystemSettings::default(), BlockFont::new("a "));
        let glyphs = fonts.font(20).layout("a a", Vec2::ZERO).unwrap();
        assert_eq!(glyphs.len(), 2);
        assert_eq!(glyphs[1].pos.x, 22.0);
    }
}
