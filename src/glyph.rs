use std::collections::hash_map::Entry;

use ahash::AHashMap;
use glam::IVec2;

use crate::{
    atlas::AtlasId,
    font::{FontId, GlyphId},
    rect::AtlasRegion,
};

/// Uniquely identifies a cached glyph.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct GlyphKey {
    pub size: u32,
    pub codepoint: char,
}

/// A rasterized glyph and its location on an atlas.
///
/// Metrics are in raster pixels, i.e. scaled by the font
/// resolution factor. Once created, a glyph never moves.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Glyph {
    /// The character that was rendered. Differs from the requested
    /// one when the default character was substituted.
    pub codepoint: char,
    pub font: FontId,
    pub id: GlyphId,
    pub size: u32,
    /// Placement on the atlas, including effect margins.
    pub bounds: AtlasRegion,
    /// Offset from the pen position to the top-left of `bounds`.
    pub offset: IVec2,
    pub advance: i32,
    /// `None` for glyphs without any pixels, such as spaces.
    pub atlas: Option<AtlasId>,
}

impl Glyph {
    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    pub fn is_rendered(&self) -> bool {
        self.atlas.is_some()
    }
}

/// The glyphs of one font size, by codepoint.
#[derive(Debug, Clone)]
pub struct GlyphCache {
    size: u32,
    glyphs: AHashMap<char, Glyph>,
}

impl GlyphCache {
    pub(crate) fn new(size: u32) -> Self {
        Self {
            size,
            glyphs: AHashMap::new(),
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn get(&self, codepoint: char) -> Option<&Glyph> {
        self.glyphs.get(&codepoint)
    }

    /// Caches `glyph` for `codepoint` unless a glyph is already cached,
    /// returning whichever glyph ends up in the cache.
    pub(crate) fn insert(&mut self, codepoint: char, glyph: Glyph) -> Glyph {
        match self.glyphs.entry(codepoint) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => *entry.insert(glyph),
        }
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (char, &Glyph)> + '_ {
        self.glyphs.iter().map(|(c, g)| (*c, g))
    }
}
