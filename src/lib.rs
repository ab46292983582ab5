//! On-demand glyph rasterization and texture atlas packing.
//!
//! A [`FontSystem`] resolves characters across a list of font sources,
//! rasterizes them at a requested pixel size, and packs the resulting
//! bitmaps into a growing set of fixed-size atlases using a skyline packer.
//! Glyphs are cached per size, so each one is rasterized at most once.
//!
//! Rendering surfaces are provided by the host through [`SurfaceManager`];
//! [`MemorySurfaces`] keeps them in CPU memory.

mod atlas;
mod effect;
pub mod font;
mod glyph;
mod rect;
mod settings;
mod surface;
mod system;
mod text;

#[cfg(test)]
mod testing;

pub use atlas::{
    skyline::{LevelConflict, SkylinePacker, SkylineSegment},
    Atlas, AtlasId, RenderOptions, ReservedRegionConflict,
};
pub use effect::{AlphaBitmap, ColorBitmap, DefaultEffects, Effects};
pub use font::{FontId, FontLoader, FontSource, GlyphId, LineMetrics, MalformedFont, RasterizedGlyph};
pub use glyph::{Glyph, GlyphCache, GlyphKey};
pub use rect::AtlasRegion;
pub use settings::{Effect, ExistingSurface, FontSystemSettings, InvalidSettings};
pub use surface::{MemorySurface, MemorySurfaces, SurfaceHandle, SurfaceManager};
pub use system::{AddFontError, FontSystem, GlyphError, NotEnoughSpace, UnrenderableGlyph};
pub use text::{DynamicFont, PositionedGlyph};

#[cfg(feature = "fontdue")]
pub use font::fontdue_loader::FontdueLoader;
