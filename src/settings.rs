use serde::{Deserialize, Serialize};

use crate::{effect::effect_margin, rect::AtlasRegion, surface::SurfaceHandle};

/// Post-processing applied to every glyph of a font system.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    None,
    Blurry,
    Stroked,
}

impl Default for Effect {
    fn default() -> Self {
        Self::None
    }
}

/// A surface supplied by the host to be used as the first atlas.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingSurface {
    pub surface: SurfaceHandle,
    /// Space on the surface that is already occupied. Glyphs are
    /// never placed here. May be empty.
    pub used_space: AtlasRegion,
}

#[derive(Debug, thiserror::Error)]
pub enum InvalidSettings {
    #[error("atlas dimensions cannot be zero (got {width}x{height})")]
    ZeroTextureSize { width: u32, height: u32 },
    #[error("font resolution factor must be positive and finite (got {0})")]
    ResolutionFactor(f32),
}

/// Configuration of a [`FontSystem`](crate::FontSystem).
///
/// The font system keeps its own copy; changing a settings value
/// after construction has no effect on existing systems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontSystemSettings {
    pub texture_width: u32,
    pub texture_height: u32,
    pub effect: Effect,
    pub effect_amount: u32,
    /// Glyphs are rasterized at `size * font_resolution_factor` and
    /// laid out at `size`.
    pub font_resolution_factor: f32,
    /// Blur kernel size. Zero derives the kernel from `effect_amount`.
    pub kernel_width: u32,
    pub kernel_height: u32,
    pub premultiply_alpha: bool,
    pub existing_surface: Option<ExistingSurface>,
    /// Rendered in place of characters no font source contains.
    pub default_character: Option<char>,
    pub use_kerning: bool,
    pub character_spacing: i32,
    pub line_spacing: i32,
}

impl Default for FontSystemSettings {
    fn default() -> Self {
        Self {
            texture_width: 1024,
            texture_height: 1024,
            effect: Effect::None,
            effect_amount: 0,
            font_resolution_factor: 1.0,
            kernel_width: 0,
            kernel_height: 0,
            premultiply_alpha: true,
            existing_surface: None,
            default_character: Some(' '),
            use_kerning: true,
            character_spacing: 0,
            line_spacing: 0,
        }
    }
}

impl FontSystemSettings {
    pub fn texture_size(mut self, width: u32, height: u32) -> Self {
        self.texture_width = width;
        self.texture_height = height;
        self
    }

    pub fn effect(mut self, effect: Effect, amount: u32) -> Self {
        self.effect = effect;
        self.effect_amount = amount;
        self
    }

    pub fn font_resolution_factor(mut self, factor: f32) -> Self {
        self.font_resolution_factor = factor;
        self
    }

    pub fn kernel(mut self, width: u32, height: u32) -> Self {
        self.kernel_width = width;
        self.kernel_height = height;
        self
    }

    pub fn premultiply_alpha(mut self, premultiply: bool) -> Self {
        self.premultiply_alpha = premultiply;
        self
    }

    pub fn existing_surface(mut self, surface: SurfaceHandle, used_space: AtlasRegion) -> Self {
        self.existing_surface = Some(ExistingSurface {
            surface,
            used_space,
        });
        self
    }

    pub fn default_character(mut self, c: Option<char>) -> Self {
        self.default_character = c;
        self
    }

    pub fn use_kerning(mut self, kerning: bool) -> Self {
        self.use_kerning = kerning;
        self
    }

    pub fn character_spacing(mut self, spacing: i32) -> Self {
        self.character_spacing = spacing;
        self
    }

    pub fn line_spacing(mut self, spacing: i32) -> Self {
        self.line_spacing = spacing;
        self
    }

    pub fn blur_amount(&self) -> u32 {
        match self.effect {
            Effect::Blurry => self.effect_amount,
            _ => 0,
        }
    }

    pub fn stroke_amount(&self) -> u32 {
        match self.effect {
            Effect::Stroked => self.effect_amount,
            _ => 0,
        }
    }

    /// Texels added around each glyph bitmap for the configured effect.
    pub fn effect_margin(&self) -> u32 {
        effect_margin(self.blur_amount().max(self.stroke_amount()))
    }

    pub(crate) fn validate(&self) -> Result<(), InvalidSettings> {
        if self.existing_surface.is_none() && (self.texture_width == 0 || self.texture_height == 0)
        {
            return Err(InvalidSettings::ZeroTextureSize {
                width: self.texture_width,
                height: self.texture_height,
            });
        }
        if !(self.font_resolution_factor.is_finite() && self.font_resolution_factor > 0.0) {
            return Err(InvalidSettings::ResolutionFactor(
                self.font_resolution_factor,
            ));
        }
        Ok(())
    }
}
