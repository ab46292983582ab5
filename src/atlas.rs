use glam::{uvec2, UVec2};

use crate::{
    effect::{effect_margin, AlphaBitmap, ColorBitmap, Effects},
    rect::AtlasRegion,
    settings::{ExistingSurface, FontSystemSettings},
    surface::{SurfaceHandle, SurfaceManager},
};

use self::skyline::SkylinePacker;

pub mod skyline;

/// Identifies an atlas within its font system.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AtlasId(pub(crate) usize);

impl AtlasId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unable to reserve used space {0:?} on the existing surface")]
pub struct ReservedRegionConflict(pub AtlasRegion);

/// How a glyph bitmap is processed before it lands on the surface.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct RenderOptions {
    pub blur_amount: u32,
    pub stroke_amount: u32,
    pub premultiply_alpha: bool,
    pub kernel: UVec2,
}

impl RenderOptions {
    pub fn from_settings(settings: &FontSystemSettings) -> Self {
        Self {
            blur_amount: settings.blur_amount(),
            stroke_amount: settings.stroke_amount(),
            premultiply_alpha: settings.premultiply_alpha,
            kernel: uvec2(settings.kernel_width, settings.kernel_height),
        }
    }

    fn margin(&self) -> u32 {
        effect_margin(self.blur_amount.max(self.stroke_amount))
    }
}

/// A fixed-size surface shared by many glyphs.
///
/// The surface is allocated the first time a glyph is rendered,
/// unless the atlas wraps a surface supplied by the host.
pub struct Atlas {
    id: AtlasId,
    size: UVec2,
    packer: SkylinePacker,
    surface: Option<SurfaceHandle>,
}

impl Atlas {
    /// Creates an atlas. If `existing` is given, its surface is used and
    /// its used space is reserved before any glyph is placed.
    ///
    /// # Panics
    /// Panics if either dimension of `size` is zero.
    pub fn new(
        id: AtlasId,
        size: UVec2,
        existing: Option<ExistingSurface>,
    ) -> Result<Self, ReservedRegionConflict> {
        let mut packer = SkylinePacker::new(size.x, size.y);
        let mut surface = None;

        if let Some(existing) = existing {
            surface = Some(existing.surface);
            if !existing.used_space.is_empty() {
                packer
                    .add_level(existing.used_space)
                    .map_err(|_| ReservedRegionConflict(existing.used_space))?;
            }
        }

        Ok(Self {
            id,
            size,
            packer,
            surface,
        })
    }

    pub fn id(&self) -> AtlasId {
        self.id
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }

    /// The surface holding this atlas's pixels, if it has been allocated.
    pub fn surface(&self) -> Option<SurfaceHandle> {
        self.surface
    }

    pub fn packer(&self) -> &SkylinePacker {
        &self.packer
    }

    pub fn utilization(&self) -> f32 {
        self.packer.utilization()
    }

    /// Reserves space for a `width`×`height` rectangle.
    pub fn add_rect(&mut self, width: u32, height: u32) -> Option<AtlasRegion> {
        self.packer.add_rect(width, height)
    }

    /// Renders `bitmap` into `bounds`, which must have been returned by
    /// [`add_rect`](Self::add_rect) and be large enough for the bitmap
    /// plus the effect margin on each side.
    ///
    /// Only the texels inside `bounds` are written.
    pub fn render_glyph(
        &mut self,
        surfaces: &mut dyn SurfaceManager,
        effects: &dyn Effects,
        bitmap: &AlphaBitmap,
        bounds: AtlasRegion,
        options: &RenderOptions,
    ) {
        let size = self.size;
        let surface = *self
            .surface
            .get_or_insert_with(|| surfaces.create_surface(size.x, size.y));

        let margin = options.margin();
        let mut coverage = AlphaBitmap::new(bounds.width, bounds.height);
        coverage.blit(bitmap, margin, margin);

        let mut pixels = if options.stroke_amount > 0 {
            effects.stroke(&coverage, options.stroke_amount)
        } else {
            if options.blur_amount > 0 {
                effects.blur(&mut coverage, options.blur_amount, options.kernel);
            }
            ColorBitmap::from_coverage(&coverage)
        };

        if options.premultiply_alpha {
            effects.premultiply(&mut pixels);
        }

        surfaces.write_pixels(surface, bounds, &pixels.pixels);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{effect::DefaultEffects, surface::MemorySurfaces};

    fn block(width: u32, height: u32) -> AlphaBitmap {
        AlphaBitmap::from_raw(width, height, vec![255; (width * height) as usize])
    }

    #[test]
    fn surface_is_created_on_first_render() {
        let mut surfaces = MemorySurfaces::new();
        let mut atlas = Atlas::new(AtlasId(0), uvec2(32, 32), None).unwrap();
        assert_eq!(atlas.surface(), None);

        let bounds = atlas.add_rect(4, 4).unwrap();
        atlas.render_glyph(
            &mut surfaces,
            &DefaultEffects,
            &block(4, 4),
            bounds,
            &RenderOptions::default(),
        );
        let surface = atlas.surface().unwrap();

        let bounds = atlas.add_rect(4, 4).unwrap();
        atlas.render_glyph(
            &mut surfaces,
            &DefaultEffects,
            &block(4, 4),
            bounds,
            &RenderOptions::default(),
        );
        assert_eq!(atlas.surface(), Some(surface));
        assert_eq!(surfaces.len(), 1);
        assert_eq!(surfaces.surface_size(surface), uvec2(32, 32));
    }

    #[test]
    fn render_writes_only_the_placed_rect() {
        let mut surfaces = MemorySurfaces::new();
        let mut atlas = Atlas::new(AtlasId(0), uvec2(16, 16), None).unwrap();
        atlas.add_rect(3, 5).unwrap();
        let bounds = atlas.add_rect(4, 2).unwrap();
        atlas.render_glyph(
            &mut surfaces,
            &DefaultEffects,
            &block(4, 2),
            bounds,
            &RenderOptions {
                premultiply_alpha: false,
                ..Default::default()
            },
        );

        let surface = surfaces.get(atlas.surface().unwrap()).unwrap();
        for y in 0..16 {
            for x in 0..16 {
                let inside = x >= bounds.x && x < bounds.right() && y >= bounds.y && y < bounds.bottom();
                let expected = if inside { [255; 4] } else { [0; 4] };
                assert_eq!(surface.pixel(x, y), expected);
            }
        }
    }

    #[test]
    fn margins_surround_the_bitmap() {
        let mut surfaces = MemorySurfaces::new();
        let mut atlas = Atlas::new(AtlasId(0), uvec2(32, 32), None).unwrap();
        let options = RenderOptions {
            stroke_amount: 1,
            premultiply_alpha: true,
            ..Default::default()
        };
        // 2x2 glyph, margin of 3 on each side
        let bounds = atlas.add_rect(8, 8).unwrap();
        atlas.render_glyph(&mut surfaces, &DefaultEffects, &block(2, 2), bounds, &options);

        let surface = surfaces.get(atlas.surface().unwrap()).unwrap();
        assert_eq!(surface.pixel(3, 3), [255; 4]);
        assert_eq!(surface.pixel(4, 4), [255; 4]);
        // outline is black and opaque once premultiplied
        assert_eq!(surface.pixel(2, 3), [0, 0, 0, 255]);
        assert_eq!(surface.pixel(0, 0), [0; 4]);
    }

    #[test]
    fn existing_surface_is_reused_and_reserved() {
        let mut surfaces = MemorySurfaces::new();
        let handle = surfaces.create_surface(64, 64);
        let used = AtlasRegion::new(0, 0, 64, 20);
        let mut atlas = Atlas::new(
            AtlasId(0),
            uvec2(64, 64),
            Some(ExistingSurface {
                surface: handle,
                used_space: used,
            }),
        )
        .unwrap();

        assert_eq!(atlas.surface(), Some(handle));
        let placed = atlas.add_rect(10, 10).unwrap();
        assert_eq!(placed.y, 20);
    }

    #[test]
    fn invalid_reserved_space_is_rejected() {
        let result = Atlas::new(
            AtlasId(0),
            uvec2(64, 64),
            Some(ExistingSurface {
                surface: SurfaceHandle(0),
                used_space: AtlasRegion::new(32, 0, 64, 8),
            }),
        );
        assert!(matches!(result, Err(ReservedRegionConflict(_))));
    }
}
