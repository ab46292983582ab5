//! Skyline rectangle packer.
//!
//! The packer tracks, for every column of the atlas, how much height has
//! already been consumed. That profile is stored as a list of
//! [`SkylineSegment`]s which always partition `0..width` exactly.
//! New rectangles rest on the tallest segment under their footprint,
//! and the packer picks the placement with the lowest resulting `y`.

use crate::rect::AtlasRegion;

/// One run of constant height on the skyline.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SkylineSegment {
    pub x: u32,
    /// Height already consumed over this run (the next free row).
    pub y: u32,
    pub width: u32,
}

impl SkylineSegment {
    pub fn right(&self) -> u32 {
        self.x + self.width
    }
}

#[derive(Debug, thiserror::Error)]
#[error("region {0:?} overlaps space already in use or lies outside the atlas")]
pub struct LevelConflict(pub AtlasRegion);

/// A skyline bin packer for a fixed-size surface.
#[derive(Debug, Clone)]
pub struct SkylinePacker {
    width: u32,
    height: u32,
    skyline: Vec<SkylineSegment>,
}

impl SkylinePacker {
    /// # Panics
    /// Panics if either dimension is zero.
    pub fn new(width: u32, height: u32) -> Self {
        assert!(width > 0 && height > 0, "packer dimensions cannot be zero");
        Self {
            width,
            height,
            skyline: vec![SkylineSegment { x: 0, y: 0, width }],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn segments(&self) -> &[SkylineSegment] {
        &self.skyline
    }

    /// Places a `width`×`height` rectangle and commits it.
    ///
    /// Returns `None`, leaving the packer untouched, if either dimension is zero
    /// or no run of the skyline can hold the rectangle.
    pub fn add_rect(&mut self, width: u32, height: u32) -> Option<AtlasRegion> {
        let (x, y) = self.find_position(width, height)?;
        self.raise(x, width, y + height);
        Some(AtlasRegion::new(x, y, width, height))
    }

    /// Marks `region` as consumed. Used to reserve space that is
    /// already occupied on a reused surface.
    ///
    /// The skyline under the region is raised to its bottom edge, so the
    /// region fills down to the skyline: any free space between the
    /// current skyline and `region.y` in that span is consumed too.
    ///
    /// Fails if the region is empty, exceeds the packer bounds, or reaches
    /// below the skyline anywhere in its horizontal span.
    pub fn add_level(&mut self, region: AtlasRegion) -> Result<(), LevelConflict> {
        if region.is_empty() || region.right() > self.width || region.bottom() > self.height {
            return Err(LevelConflict(region));
        }

        let overlaps = self
            .skyline
            .iter()
            .any(|s| s.x < region.right() && s.right() > region.x && s.y > region.y);
        if overlaps {
            return Err(LevelConflict(region));
        }

        self.raise(region.x, region.width, region.bottom());
        Ok(())
    }

    /// Fraction of the surface area lying under the skyline.
    pub fn utilization(&self) -> f32 {
        let used: u64 = self
            .skyline
            .iter()
            .map(|s| s.y as u64 * s.width as u64)
            .sum();
        used as f32 / (self.width as f32 * self.height as f32)
    }

    fn find_position(&self, width: u32, height: u32) -> Option<(u32, u32)> {
        if width == 0 || height == 0 || width > self.width || height > self.height {
            return None;
        }

        let mut best: Option<(u32, u32)> = None;
        for start in 0..self.skyline.len() {
            if let Some(y) = self.fits(start, width, height) {
                // strict comparison keeps the leftmost of equally low placements
                if best.map_or(true, |(_, best_y)| y < best_y) {
                    best = Some((self.skyline[start].x, y));
                }
            }
        }
        best
    }

    /// Returns the `y` a rectangle would rest at if its left edge
    /// were aligned with segment `start`.
    fn fits(&self, start: usize, width: u32, height: u32) -> Option<u32> {
        let x = self.skyline[start].x;
        if x + width > self.width {
            return None;
        }

        let mut y = 0;
        let mut covered = 0;
        let mut i = start;
        while covered < width {
            let segment = self.skyline.get(i)?;
            y = y.max(segment.y);
            if y + height > self.height {
                return None;
            }
            covered += segment.width;
            i += 1;
        }
        Some(y)
    }

    /// Sets the skyline over `x..x + width` to `top`, splitting the
    /// segments at both edges.
    fn raise(&mut self, x: u32, width: u32, top: u32) {
        let right = x + width;
        let first = self.skyline.iter().position(|s| s.right() > x);
        let last = self.skyline.iter().rposition(|s| s.x < right);
        let (first, last) = match (first, last) {
            (Some(first), Some(last)) => (first, last),
            _ => return,
        };

        let head = self.skyline[first];
        let tail = self.skyline[last];

        let mut replacement = Vec::with_capacity(3);
        if head.x < x {
            replacement.push(SkylineSegment {
                x: head.x,
                y: head.y,
                width: x - head.x,
            });
        }
        replacement.push(SkylineSegment { x, y: top, width });
        if tail.right() > right {
            replacement.push(SkylineSegment {
                x: right,
                y: tail.y,
                width: tail.right() - right,
            });
        }

        self.skyline.splice(first..=last, replacement);
        self.merge();
    }

    fn merge(&mut self) {
        self.skyline.retain(|s| s.width > 0);
        let mut i = 0;
        while i + 1 < self.skyline.len() {
            if self.skyline[i].y == self.skyline[i + 1].y {
                self.skyline[i].width += self.skyline[i + 1].width;
                self.skyline.remove(i + 1);
            } else {
                i += 1;
            }
        }
    }
}
