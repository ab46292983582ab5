//! Glyph bitmaps and the post-processing applied to them before
//! they are written to an atlas.

use glam::UVec2;

/// An 8-bit coverage bitmap, row-major.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AlphaBitmap {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl AlphaBitmap {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize],
        }
    }

    /// # Panics
    /// Panics if `data` does not hold `width * height` bytes.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Self {
        assert_eq!(
            data.len(),
            width as usize * height as usize,
            "bitmap data does not match its dimensions"
        );
        Self {
            width,
            height,
            data,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.data[(y * self.width + x) as usize]
    }

    /// Copies `src` into this bitmap with its top-left corner at `(x, y)`.
    /// Parts falling outside are dropped.
    pub fn blit(&mut self, src: &AlphaBitmap, x: u32, y: u32) {
        let width = src.width.min(self.width.saturating_sub(x)) as usize;
        let rows = src.height.min(self.height.saturating_sub(y));
        for row in 0..rows {
            let src_start = (row * src.width) as usize;
            let dst_start = ((y + row) * self.width + x) as usize;
            self.data[dst_start..dst_start + width]
                .copy_from_slice(&src.data[src_start..src_start + width]);
        }
    }
}

/// An RGBA8 bitmap, row-major.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColorBitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[u8; 4]>,
}

impl ColorBitmap {
    /// White text whose alpha is the coverage.
    pub fn from_coverage(bitmap: &AlphaBitmap) -> Self {
        Self {
            width: bitmap.width,
            height: bitmap.height,
            pixels: bitmap.data.iter().map(|&a| [255, 255, 255, a]).collect(),
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.pixels[(y * self.width + x) as usize]
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }
}

/// Extra texels reserved on each side of a glyph for an effect of
/// the given strength.
pub fn effect_margin(amount: u32) -> u32 {
    if amount == 0 {
        0
    } else {
        amount + 2
    }
}

/// Post-processing applied to rasterized glyphs.
pub trait Effects {
    /// Blurs `bitmap` in place. A zero `kernel` lets the
    /// implementation derive the blur extent from `amount`.
    fn blur(&self, bitmap: &mut AlphaBitmap, amount: u32, kernel: UVec2);

    /// Draws an outline `amount` texels wide around the glyph.
    fn stroke(&self, bitmap: &AlphaBitmap, amount: u32) -> ColorBitmap;

    fn premultiply(&self, bitmap: &mut ColorBitmap);
}

/// The built-in [`Effects`].
///
/// Blurs with the exponential filter popularized by font-stash style
/// packers, or with a three-pass box filter when a kernel size is given.
/// Strokes are black, under a white fill.
#[derive(Debug, Default, Copy, Clone)]
pub struct DefaultEffects;

const ALPHA_PRECISION: i32 = 16;
const Z_PRECISION: i32 = 7;
const BOX_PASSES: usize = 3;

impl Effects for DefaultEffects {
    fn blur(&self, bitmap: &mut AlphaBitmap, amount: u32, kernel: UVec2) {
        if amount == 0 || bitmap.is_empty() {
            return;
        }

        if kernel.x == 0 && kernel.y == 0 {
            let sigma = amount as f32 * 0.57735;
            let alpha = ((1 << ALPHA_PRECISION) as f32 * (1.0 - (-2.3 / (sigma + 1.0)).exp()))
                as i32;
            exponential_blur_horizontal(bitmap, alpha);
            exponential_blur_vertical(bitmap, alpha);
            exponential_blur_horizontal(bitmap, alpha);
            exponential_blur_vertical(bitmap, alpha);
        } else {
            for _ in 0..BOX_PASSES {
                box_blur_horizontal(bitmap, kernel.x / 2);
                box_blur_vertical(bitmap, kernel.y / 2);
            }
        }
    }

    fn stroke(&self, bitmap: &AlphaBitmap, amount: u32) -> ColorBitmap {
        let radius = amount as i32;
        let radius_sq = radius * radius;
        let (width, height) = (bitmap.width as i32, bitmap.height as i32);

        let mut pixels = Vec::with_capacity(bitmap.data.len());
        for y in 0..height {
            for x in 0..width {
                let fill = bitmap.get(x as u32, y as u32);
                let mut outline = fill;
                for dy in -radius..=radius {
                    for dx in -radius..=radius {
                        let (sx, sy) = (x + dx, y + dy);
                        if dx * dx + dy * dy > radius_sq
                            || sx < 0
                            || sy < 0
                            || sx >= width
                            || sy >= height
                        {
                            continue;
                        }
                        outline = outline.max(bitmap.get(sx as u32, sy as u32));
                    }
                }
                // white fill composited over a black outline
                pixels.push([fill, fill, fill, outline]);
            }
        }

        ColorBitmap {
            width: bitmap.width,
            height: bitmap.height,
            pixels,
        }
    }

    fn premultiply(&self, bitmap: &mut ColorBitmap) {
        for pixel in &mut bitmap.pixels {
            let a = pixel[3] as u32;
            for channel in &mut pixel[..3] {
                *channel = ((*channel as u32 * a + 127) / 255) as u8;
            }
        }
    }
}

fn exponential_blur_horizontal(bitmap: &mut AlphaBitmap, alpha: i32) {
    let width = bitmap.width as usize;
    for row in bitmap.data.chunks_exact_mut(width) {
        let mut z = 0;
        for x in 1..width {
            z += (alpha * (((row[x] as i32) << Z_PRECISION) - z)) >> ALPHA_PRECISION;
            row[x] = (z >> Z_PRECISION) as u8;
        }
        row[width - 1] = 0;
        z = 0;
        for x in (0..width - 1).rev() {
            z += (alpha * (((row[x] as i32) << Z_PRECISION) - z)) >> ALPHA_PRECISION;
            row[x] = (z >> Z_PRECISION) as u8;
        }
        row[0] = 0;
    }
}

fn exponential_blur_vertical(bitmap: &mut AlphaBitmap, alpha: i32) {
    let (width, height) = (bitmap.width as usize, bitmap.height as usize);
    let data = &mut bitmap.data;
    for x in 0..width {
        let mut z = 0;
        for y in 1..height {
            let i = y * width + x;
            z += (alpha * (((data[i] as i32) << Z_PRECISION) - z)) >> ALPHA_PRECISION;
            data[i] = (z >> Z_PRECISION) as u8;
        }
        data[(height - 1) * width + x] = 0;
        z = 0;
        for y in (0..height - 1).rev() {
            let i = y * width + x;
            z += (alpha * (((data[i] as i32) << Z_PRECISION) - z)) >> ALPHA_PRECISION;
            data[i] = (z >> Z_PRECISION) as u8;
        }
        data[x] = 0;
    }
}

/// Averages each texel with its neighbors within `radius`, counting
/// texels outside the bitmap as empty.
fn box_average(line: &[u8], radius: usize, out: &mut [u8]) {
    let window = (radius * 2 + 1) as u32;
    for (i, value) in out.iter_mut().enumerate() {
        let start = i.saturating_sub(radius);
        let end = (i + radius + 1).min(line.len());
        let sum: u32 = line[start..end].iter().map(|&v| v as u32).sum();
        *value = ((sum + window / 2) / window) as u8;
    }
}

fn box_blur_horizontal(bitmap: &mut AlphaBitmap, radius: u32) {
    if radius == 0 {
        return;
    }
    let width = bitmap.width as usize;
    let mut line = vec![0; width];
    for row in bitmap.data.chunks_exact_mut(width) {
        line.copy_from_slice(row);
        box_average(&line, radius as usize, row);
    }
}

fn box_blur_vertical(bitmap: &mut AlphaBitmap, radius: u32) {
    if radius == 0 {
        return;
    }
    let (width, height) = (bitmap.width as usize, bitmap.height as usize);
    let mut column = vec![0; height];
    let mut blurred = vec![0; height];
    for x in 0..width {
        for (y, value) in column.iter_mut().enumerate() {
            *value = bitmap.data[y * width + x];
        }
        box_average(&column, radius as usize, &mut blurred);
        for (y, value) in blurred.iter().enumerate() {
            bitmap.data[y * width + x] = *value;
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::uvec2;

    use super::*;

    fn dot(size: u32) -> AlphaBitmap {
        let mut bitmap = AlphaBitmap::new(size, size);
        let center = size / 2;
        bitmap.data[(center * size + center) as usize] = 255;
        bitmap
    }

    #[test]
    fn margin_only_applies_to_active_effects() {
        assert_eq!(effect_margin(0), 0);
        assert_eq!(effect_margin(3), 5);
    }

    #[test]
    fn blit_places_source_at_offset() {
        let mut dst = AlphaBitmap::new(4, 4);
        dst.blit(&AlphaBitmap::from_raw(2, 1, vec![7, 8]), 1, 2);
        assert_eq!(dst.get(1, 2), 7);
        assert_eq!(dst.get(2, 2), 8);
        assert_eq!(dst.data.iter().filter(|&&v| v != 0).count(), 2);
    }

    #[test]
    fn exponential_blur_spreads_coverage() {
        let mut bitmap = dot(15);
        DefaultEffects.blur(&mut bitmap, 3, UVec2::ZERO);
        assert!(bitmap.get(7, 7) < 255);
        assert!(bitmap.get(8, 7) > 0);
        assert!(bitmap.get(7, 8) > 0);
        // borders are cleared by the filter
        assert_eq!(bitmap.get(0, 7), 0);
    }

    #[test]
    fn box_blur_averages_within_kernel() {
        let mut bitmap = AlphaBitmap::from_raw(3, 1, vec![0, 255, 0]);
        box_blur_horizontal(&mut bitmap, 1);
        assert_eq!(bitmap.data, vec![85, 85, 85]);

        let mut bitmap = dot(9);
        DefaultEffects.blur(&mut bitmap, 1, uvec2(3, 3));
        assert!(bitmap.get(4, 4) > 0);
        assert!(bitmap.get(5, 5) > 0);
        assert_eq!(bitmap.get(0, 0), 0);
    }

    #[test]
    fn zero_amount_blur_is_a_no_op() {
        let mut bitmap = dot(5);
        let before = bitmap.clone();
        DefaultEffects.blur(&mut bitmap, 0, UVec2::ZERO);
        assert_eq!(bitmap, before);
    }

    #[test]
    fn stroke_outlines_in_black() {
        let stroked = DefaultEffects.stroke(&dot(7), 2);
        assert_eq!(stroked.pixel(3, 3), [255, 255, 255, 255]);
        assert_eq!(stroked.pixel(5, 3), [0, 0, 0, 255]);
        // (5, 5) is at distance sqrt(8) > 2
        assert_eq!(stroked.pixel(5, 5), [0, 0, 0, 0]);
    }

    #[test]
    fn premultiply_scales_color_by_alpha() {
        let mut bitmap = ColorBitmap::from_coverage(&AlphaBitmap::from_raw(3, 1, vec![0, 128, 255]));
        DefaultEffects.premultiply(&mut bitmap);
        assert_eq!(bitmap.pixels, vec![[0, 0, 0, 0], [128, 128, 128, 128], [255; 4]]);
        assert_eq!(bitmap.as_bytes().len(), 12);
    }
}
