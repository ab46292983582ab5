use std::io::{self, Read};

use ahash::AHashMap;
use glam::{uvec2, IVec2, UVec2};

use crate::{
    atlas::{Atlas, AtlasId, RenderOptions, ReservedRegionConflict},
    effect::{DefaultEffects, Effects},
    font::{FontId, FontLoader, FontSource, Fonts, GlyphId, MalformedFont},
    glyph::{Glyph, GlyphCache, GlyphKey},
    rect::AtlasRegion,
    settings::{FontSystemSettings, InvalidSettings},
    surface::SurfaceManager,
    text::DynamicFont,
};

#[derive(Debug, thiserror::Error)]
#[error("a {width}x{height} glyph does not fit into an empty atlas")]
pub struct NotEnoughSpace {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, thiserror::Error)]
#[error("no font source contains {0:?} or the default character")]
pub struct UnrenderableGlyph(pub char);

#[derive(Debug, thiserror::Error)]
pub enum GlyphError {
    #[error(transparent)]
    NotEnoughSpace(#[from] NotEnoughSpace),
    #[error(transparent)]
    ReservedRegion(#[from] ReservedRegionConflict),
    #[error(transparent)]
    Unrenderable(#[from] UnrenderableGlyph),
    #[error(transparent)]
    Settings(#[from] InvalidSettings),
}

#[derive(Debug, thiserror::Error)]
pub enum AddFontError {
    #[error("failed to read font data")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Malformed(#[from] MalformedFont),
}

/// Where a requested codepoint comes from.
enum Resolution {
    Cached(Glyph),
    Source {
        codepoint: char,
        font: FontId,
        glyph: GlyphId,
    },
}

/// Rasterizes glyphs on demand and packs them into atlases.
///
/// Glyphs are cached per font size. When the current atlas runs out
/// of space it is retired and a new one is created; glyphs already
/// placed keep referring to the atlas they were rendered into.
///
/// A `FontSystem` performs no internal locking; all work happens
/// synchronously on the calling thread.
pub struct FontSystem<S> {
    settings: FontSystemSettings,
    loader: Box<dyn FontLoader>,
    effects: Box<dyn Effects>,
    surfaces: S,

    fonts: Fonts,
    caches: AHashMap<u32, GlyphCache>,

    atlases: Vec<Atlas>,
    current_atlas: Option<usize>,

    atlas_full_listeners: Vec<Box<dyn FnMut()>>,
}

impl<S> FontSystem<S>
where
    S: SurfaceManager,
{
    /// Creates a font system. The settings are copied.
    pub fn new(
        loader: impl FontLoader + 'static,
        surfaces: S,
        settings: &FontSystemSettings,
    ) -> Result<Self, InvalidSettings> {
        settings.validate()?;
        if let Some(existing) = &settings.existing_surface {
            let size = surfaces.surface_size(existing.surface);
            if size.x == 0 || size.y == 0 {
                return Err(InvalidSettings::ZeroTextureSize {
                    width: size.x,
                    height: size.y,
                });
            }
        }
        Ok(Self {
            settings: settings.clone(),
            loader: Box::new(loader),
            effects: Box::new(DefaultEffects),
            surfaces,

            fonts: Fonts::default(),
            caches: AHashMap::new(),

            atlases: Vec::new(),
            current_atlas: None,

            atlas_full_listeners: Vec::new(),
        })
    }

    /// Creates a font system that parses fonts with `fontdue`.
    #[cfg(feature = "fontdue")]
    pub fn with_fontdue(surfaces: S, settings: &FontSystemSettings) -> Result<Self, InvalidSettings> {
        Self::new(crate::font::fontdue_loader::FontdueLoader, surfaces, settings)
    }

    /// Replaces the blur, stroke and premultiplication implementation.
    pub fn with_effects(mut self, effects: impl Effects + 'static) -> Self {
        self.effects = Box::new(effects);
        self
    }

    pub fn settings(&self) -> &FontSystemSettings {
        &self.settings
    }

    /// Parses a font and appends it to the fallback chain.
    pub fn add_font(&mut self, data: &[u8]) -> Result<FontId, MalformedFont> {
        let source = self.loader.load(data)?;
        Ok(self.fonts.add(source))
    }

    pub fn add_font_from_reader(&mut self, mut reader: impl Read) -> Result<FontId, AddFontError> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(self.add_font(&data)?)
    }

    /// Appends an already parsed font to the fallback chain.
    pub fn add_font_source(&mut self, source: Box<dyn FontSource>) -> FontId {
        self.fonts.add(source)
    }

    pub fn font_count(&self) -> usize {
        self.fonts.len()
    }

    /// Returns `None` for ids issued before the last
    /// [`clear_fonts`](Self::clear_fonts).
    pub fn font_source(&self, id: FontId) -> Option<&dyn FontSource> {
        self.fonts.get(id)
    }

    /// Releases every font source and performs a full [`reset`](Self::reset).
    ///
    /// Font ids are reissued from zero once fonts are added again, so
    /// glyphs referring to the released sources are dropped as well.
    pub fn clear_fonts(&mut self) {
        self.reset();
        self.fonts.clear();
    }

    /// Gets the font of the given pixel size, creating its glyph cache
    /// if this is the first request for that size.
    ///
    /// # Panics
    /// Panics if `size` is zero.
    pub fn font(&mut self, size: u32) -> DynamicFont<'_, S> {
        assert!(size > 0, "font size cannot be zero");
        self.caches
            .entry(size)
            .or_insert_with(|| GlyphCache::new(size));
        DynamicFont::new(self, size)
    }

    /// Gets the glyph for `codepoint`, rasterizing and packing it
    /// if it has not been requested at this size before.
    ///
    /// Codepoints missing from every font source are replaced by the
    /// configured default character.
    ///
    /// # Panics
    /// Panics if `size` is zero.
    pub fn glyph(&mut self, size: u32, codepoint: char) -> Result<Glyph, GlyphError> {
        assert!(size > 0, "font size cannot be zero");

        let glyph = match self.resolve(size, codepoint)? {
            Resolution::Cached(glyph) => glyph,
            Resolution::Source {
                codepoint: resolved,
                font,
                glyph,
            } => {
                let glyph = self.render(size, resolved, font, glyph)?;
                self.cache_mut(size).insert(resolved, glyph)
            }
        };

        if glyph.codepoint != codepoint {
            self.cache_mut(size).insert(codepoint, glyph);
        }
        Ok(glyph)
    }

    pub fn cached_glyph(&self, key: GlyphKey) -> Option<&Glyph> {
        self.caches.get(&key.size)?.get(key.codepoint)
    }

    pub fn glyph_cache(&self, size: u32) -> Option<&GlyphCache> {
        self.caches.get(&size)
    }

    pub fn cached_glyph_count(&self) -> usize {
        self.caches.values().map(GlyphCache::len).sum()
    }

    /// Removes all atlases and cached glyphs. Font sources are kept.
    ///
    /// Glyphs obtained before the reset must not be used afterwards;
    /// their atlas ids may be reassigned.
    pub fn reset(&mut self) {
        log::info!(
            "Resetting font system ({} atlases, {} glyphs)",
            self.atlases.len(),
            self.cached_glyph_count()
        );
        self.atlases.clear();
        self.current_atlas = None;
        self.caches.clear();
    }

    pub fn atlases(&self) -> &[Atlas] {
        &self.atlases
    }

    pub fn atlas(&self, id: AtlasId) -> Option<&Atlas> {
        self.atlases.get(id.0)
    }

    /// The atlas new glyphs are placed on.
    pub fn current_atlas(&self) -> Option<&Atlas> {
        self.current_atlas.map(|i| &self.atlases[i])
    }

    pub fn surfaces(&self) -> &S {
        &self.surfaces
    }

    pub fn surfaces_mut(&mut self) -> &mut S {
        &mut self.surfaces
    }

    /// Registers a callback invoked each time the current atlas is
    /// retired because a glyph did not fit.
    pub fn on_atlas_full(&mut self, listener: impl FnMut() + 'static) {
        self.atlas_full_listeners.push(Box::new(listener));
    }

    pub(crate) fn fonts(&self) -> &Fonts {
        &self.fonts
    }

    fn cache_mut(&mut self, size: u32) -> &mut GlyphCache {
        self.caches
            .entry(size)
            .or_insert_with(|| GlyphCache::new(size))
    }

    /// Looks `codepoint` up in the cache, then in the font sources,
    /// then retries once with the default character.
    fn resolve(&self, size: u32, codepoint: char) -> Result<Resolution, UnrenderableGlyph> {
        let lookup = |c: char| -> Option<Resolution> {
            if let Some(glyph) = self.cached_glyph(GlyphKey { size, codepoint: c }) {
                return Some(Resolution::Cached(*glyph));
            }
            self.fonts
                .resolve(c)
                .map(|(font, glyph)| Resolution::Source {
                    codepoint: c,
                    font,
                    glyph,
                })
        };

        if let Some(resolution) = lookup(codepoint) {
            return Ok(resolution);
        }

        match self.settings.default_character {
            Some(default) if default != codepoint => {
                log::debug!(
                    "No font contains {:?}, substituting {:?}",
                    codepoint,
                    default
                );
                lookup(default).ok_or(UnrenderableGlyph(codepoint))
            }
            _ => Err(UnrenderableGlyph(codepoint)),
        }
    }

    fn render(
        &mut self,
        size: u32,
        codepoint: char,
        font: FontId,
        id: GlyphId,
    ) -> Result<Glyph, GlyphError> {
        let raster_size = size as f32 * self.settings.font_resolution_factor;
        let source = self.fonts.get(font).ok_or(UnrenderableGlyph(codepoint))?;
        let rasterized = source.rasterize(id, raster_size);
        log::debug!(
            "Rasterized {:?} at {}px: {}x{}",
            codepoint,
            raster_size,
            rasterized.bitmap.width,
            rasterized.bitmap.height
        );

        let margin = self.settings.effect_margin();
        let mut glyph = Glyph {
            codepoint,
            font,
            id,
            size,
            bounds: AtlasRegion::default(),
            offset: rasterized.offset - IVec2::splat(margin as i32),
            advance: rasterized.advance.round() as i32,
            atlas: None,
        };

        if rasterized.bitmap.is_empty() {
            return Ok(glyph);
        }

        let width = rasterized.bitmap.width + margin * 2;
        let height = rasterized.bitmap.height + margin * 2;
        let (index, bounds) = self.place(width, height)?;

        let options = RenderOptions::from_settings(&self.settings);
        let atlas = &mut self.atlases[index];
        atlas.render_glyph(
            &mut self.surfaces,
            self.effects.as_ref(),
            &rasterized.bitmap,
            bounds,
            &options,
        );

        glyph.bounds = bounds;
        glyph.atlas = Some(atlas.id());
        Ok(glyph)
    }

    /// Places a rectangle on the current atlas. If it is full, a new
    /// atlas is created and placement is retried exactly once.
    fn place(&mut self, width: u32, height: u32) -> Result<(usize, AtlasRegion), GlyphError> {
        let index = self.current_atlas_index()?;
        if let Some(bounds) = self.atlases[index].add_rect(width, height) {
            return Ok((index, bounds));
        }

        log::warn!(
            "Atlas {} is full ({:.0}% used), creating a new one",
            index,
            self.atlases[index].utilization() * 100.0
        );
        for listener in &mut self.atlas_full_listeners {
            listener();
        }

        self.current_atlas = None;
        let index = self.current_atlas_index()?;
        match self.atlases[index].add_rect(width, height) {
            Some(bounds) => Ok((index, bounds)),
            None => Err(NotEnoughSpace { width, height }.into()),
        }
    }

    fn current_atlas_index(&mut self) -> Result<usize, GlyphError> {
        if let Some(index) = self.current_atlas {
            return Ok(index);
        }

        // a supplied surface only ever backs the first atlas
        let existing = self
            .settings
            .existing_surface
            .filter(|_| self.atlases.is_empty());
        let size = self.texture_size();
        if size.x == 0 || size.y == 0 {
            return Err(InvalidSettings::ZeroTextureSize {
                width: size.x,
                height: size.y,
            }
            .into());
        }

        let id = AtlasId(self.atlases.len());
        let atlas = Atlas::new(id, size, existing)?;
        log::info!(
            "Created atlas {} ({}x{}{})",
            id.0,
            size.x,
            size.y,
            if existing.is_some() {
                ", existing surface"
            } else {
                ""
            }
        );

        self.atlases.push(atlas);
        self.current_atlas = Some(id.0);
        Ok(id.0)
    }

    /// Atlases match the supplied surface if there is one.
    fn texture_size(&self) -> UVec2 {
        match &self.settings.existing_surface {
            Some(existing) => self.surfaces.surface_size(existing.surface),
            None => uvec2(self.settings.texture_width, self.settings.texture_height),
        }
    }
}
