//! Rendering surfaces that atlases draw into.

use ahash::AHashMap;
use glam::{uvec2, UVec2};
use serde::{Deserialize, Serialize};

use crate::rect::AtlasRegion;

/// Opaque handle to a surface owned by a [`SurfaceManager`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SurfaceHandle(pub u64);

/// Allocates and updates the textures backing glyph atlases.
///
/// Pixels are 8-bit RGBA, row-major.
pub trait SurfaceManager {
    fn create_surface(&mut self, width: u32, height: u32) -> SurfaceHandle;

    /// Writes `pixels` into `region` of the surface. `pixels` holds
    /// exactly `region.width * region.height` entries.
    fn write_pixels(&mut self, surface: SurfaceHandle, region: AtlasRegion, pixels: &[[u8; 4]]);

    /// Returns the dimensions of a surface, or zero for an unknown handle.
    fn surface_size(&self, surface: SurfaceHandle) -> UVec2;
}

/// A surface stored in CPU memory.
#[derive(Debug, Clone)]
pub struct MemorySurface {
    size: UVec2,
    pixels: Vec<[u8; 4]>,
}

impl MemorySurface {
    fn new(width: u32, height: u32) -> Self {
        Self {
            size: uvec2(width, height),
            pixels: vec![[0; 4]; width as usize * height as usize],
        }
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }

    pub fn pixels(&self) -> &[[u8; 4]] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.pixels[(y * self.size.x + x) as usize]
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    fn write(&mut self, region: AtlasRegion, pixels: &[[u8; 4]]) {
        let width = region.width.min(self.size.x.saturating_sub(region.x)) as usize;
        let rows = region.height.min(self.size.y.saturating_sub(region.y));
        if width < region.width as usize || rows < region.height {
            log::warn!(
                "Clipping write of {:?} to surface of size {}x{}",
                region,
                self.size.x,
                self.size.y
            );
        }

        for row in 0..rows {
            let src_start = (row * region.width) as usize;
            let src = match pixels.get(src_start..src_start + width) {
                Some(src) => src,
                None => break,
            };
            let dst_start = ((region.y + row) * self.size.x + region.x) as usize;
            self.pixels[dst_start..dst_start + width].copy_from_slice(src);
        }
    }
}

/// A [`SurfaceManager`] keeping every surface in CPU memory.
///
/// Useful for software rendering, for uploading atlases to a GPU
/// in a separate step, and for inspecting atlas contents.
#[derive(Debug, Default)]
pub struct MemorySurfaces {
    surfaces: AHashMap<SurfaceHandle, MemorySurface>,
    next_handle: u64,
}

impl MemorySurfaces {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, surface: SurfaceHandle) -> Option<&MemorySurface> {
        self.surfaces.get(&surface)
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    /// Saves a surface as a PNG file.
    #[cfg(feature = "png")]
    pub fn save_png(
        &self,
        surface: SurfaceHandle,
        path: impl AsRef<std::path::Path>,
    ) -> image::ImageResult<()> {
        let surface = match self.get(surface) {
            Some(s) => s,
            None => {
                return Err(image::ImageError::Parameter(
                    image::error::ParameterError::from_kind(
                        image::error::ParameterErrorKind::Generic(format!(
                            "unknown surface {:?}",
                            surface
                        )),
                    ),
                ))
            }
        };
        image::save_buffer(
            path,
            surface.as_bytes(),
            surface.size.x,
            surface.size.y,
            image::ColorType::Rgba8,
        )
    }
}

impl SurfaceManager for MemorySurfaces {
    fn create_surface(&mut self, width: u32, height: u32) -> SurfaceHandle {
        let handle = SurfaceHandle(self.next_handle);
        self.next_handle += 1;
        self.surfaces.insert(handle, MemorySurface::new(width, height));
        handle
    }

    fn write_pixels(&mut self, surface: SurfaceHandle, region: AtlasRegion, pixels: &[[u8; 4]]) {
        match self.surfaces.get_mut(&surface) {
            Some(s) => s.write(region, pixels),
            None => log::warn!("Write to unknown surface {:?} ignored", surface),
        }
    }

    fn surface_size(&self, surface: SurfaceHandle) -> UVec2 {
        self.surfaces
            .get(&surface)
            .map(|s| s.size)
            .unwrap_or(UVec2::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_touches_only_the_region() {
        let mut surfaces = MemorySurfaces::new();
        let handle = surfaces.create_surface(8, 8);
        let region = AtlasRegion::new(2, 3, 2, 2);
        surfaces.write_pixels(handle, region, &[[255; 4]; 4]);

        let surface = surfaces.get(handle).unwrap();
        for y in 0..8 {
            for x in 0..8 {
                let inside = (2..4).contains(&x) && (3..5).contains(&y);
                let expected = if inside { [255; 4] } else { [0; 4] };
                assert_eq!(surface.pixel(x, y), expected, "pixel ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn writes_past_the_edge_are_clipped() {
        let mut surfaces = MemorySurfaces::new();
        let handle = surfaces.create_surface(4, 4);
        surfaces.write_pixels(handle, AtlasRegion::new(3, 3, 2, 2), &[[9; 4]; 4]);
        let surface = surfaces.get(handle).unwrap();
        assert_eq!(surface.pixel(3, 3), [9; 4]);
        assert_eq!(surface.pixels().iter().filter(|p| **p == [9; 4]).count(), 1);
    }

    #[test]
    fn handles_are_distinct() {
        let mut surfaces = MemorySurfaces::new();
        let a = surfaces.create_surface(4, 4);
        let b = surfaces.create_surface(16, 2);
        assert_ne!(a, b);
        assert_eq!(surfaces.surface_size(b), uvec2(16, 2));
        assert_eq!(surfaces.surface_size(SurfaceHandle(99)), UVec2::ZERO);
        assert_eq!(surfaces.get(a).unwrap().as_bytes().len(), 4 * 4 * 4);
    }
}
