//! Hand-off types for the texture uploader.
//!
//! Nothing here talks to a GPU API. The uploader receives one
//! [`FaceLevelImage`] per `(face, level)` pair plus [`SamplerSettings`]
//! derived from whatever the platform reports through
//! [`TextureCapabilities`].

use crate::raster::{CubeFace, MipChain};
use glam::Vec3;
use half::f16;
use serde::Serialize;

/// One face of one mip level, borrowed from a prepared environment.
#[derive(Debug, Clone, Copy)]
pub struct FaceLevelImage<'a> {
    pub face: CubeFace,
    pub level: u32,
    pub size: u32,
    pub pixels: &'a [f32],
}

impl<'a> FaceLevelImage<'a> {
    /// Panics if `(x, y)` lies outside the face.
    pub fn texel(&self, x: u32, y: u32) -> Vec3 {
        let idx = (y as usize * self.size as usize + x as usize) * 3;
        Vec3::new(self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2])
    }

    /// RGBA texels with alpha 1.0.
    pub fn to_rgba_f32(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.pixels.len() / 3 * 4);
        for texel in self.pixels.chunks_exact(3) {
            out.extend_from_slice(&[texel[0], texel[1], texel[2], 1.0]);
        }
        out
    }

    /// RGBA half-float bit patterns with alpha 1.0. Values above `f16::MAX`
    /// saturate instead of becoming infinity.
    pub fn to_rgba_f16_bits(&self) -> Vec<u16> {
        let one = f16::ONE.to_bits();
        let mut out = Vec::with_capacity(self.pixels.len() / 3 * 4);
        for texel in self.pixels.chunks_exact(3) {
            out.extend_from_slice(&[half_bits(texel[0]), half_bits(texel[1]), half_bits(texel[2]), one]);
        }
        out
    }

    /// Texel bytes in `format`, ready for a row-tight upload.
    pub fn encode(&self, format: TexelFormat) -> Vec<u8> {
        match format {
            TexelFormat::Rgba16Float => bytemuck::cast_slice::<u16, u8>(&self.to_rgba_f16_bits()).to_vec(),
            TexelFormat::Rgba32Float => bytemuck::cast_slice::<f32, u8>(&self.to_rgba_f32()).to_vec(),
        }
    }

    pub fn bytes_per_row(&self, format: TexelFormat) -> u32 {
        self.size * format.bytes_per_texel()
    }
}

fn half_bits(value: f32) -> u16 {
    f16::from_f32(value.min(f16::MAX.to_f32())).to_bits()
}

/// Flattens per-face chains into upload order: face-major, then level.
pub fn upload_order(chains: &[MipChain]) -> Vec<FaceLevelImage<'_>> {
    let mut images = Vec::with_capacity(chains.iter().map(MipChain::len).sum());
    for chain in chains {
        for (level, raster) in chain.levels().iter().enumerate() {
            images.push(FaceLevelImage {
                face: chain.face(),
                level: level as u32,
                size: raster.size(),
                pixels: raster.pixels(),
            });
        }
    }
    images
}

/// Platform facts the uploader queries before creating the texture.
pub trait TextureCapabilities {
    /// Linear filtering of 32-bit float textures.
    fn supports_float_linear_filtering(&self) -> bool;
    /// Linear filtering of 16-bit float textures.
    fn supports_half_float_linear_filtering(&self) -> bool;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaticCapabilities {
    pub float_linear: bool,
    pub half_float_linear: bool,
}

impl TextureCapabilities for StaticCapabilities {
    fn supports_float_linear_filtering(&self) -> bool {
        self.float_linear
    }

    fn supports_half_float_linear_filtering(&self) -> bool {
        self.half_float_linear
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TexelFormat {
    Rgba16Float,
    Rgba32Float,
}

impl TexelFormat {
    /// Prefers half floats when they filter linearly, then full floats.
    pub fn select(caps: &dyn TextureCapabilities) -> Self {
        if caps.supports_half_float_linear_filtering() {
            TexelFormat::Rgba16Float
        } else if caps.supports_float_linear_filtering() {
            TexelFormat::Rgba32Float
        } else {
            TexelFormat::Rgba16Float
        }
    }

    pub fn bytes_per_texel(self) -> u32 {
        match self {
            TexelFormat::Rgba16Float => 8,
            TexelFormat::Rgba32Float => 16,
        }
    }

    pub fn is_linear_filterable(self, caps: &dyn TextureCapabilities) -> bool {
        match self {
            TexelFormat::Rgba16Float => caps.supports_half_float_linear_filtering(),
            TexelFormat::Rgba32Float => caps.supports_float_linear_filtering(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressMode {
    ClampToEdge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SamplerSettings {
    pub format: TexelFormat,
    pub address_mode_u: AddressMode,
    pub address_mode_v: AddressMode,
    pub address_mode_w: AddressMode,
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub mipmap_filter: FilterMode,
    pub base_mip_level: u32,
    pub max_mip_level: u32,
}

impl SamplerSettings {
    /// Clamp-to-edge sampling over the whole chain; nearest filtering when the
    /// chosen format cannot be filtered linearly.
    pub fn for_environment(mip_count: u32, caps: &dyn TextureCapabilities) -> Self {
        let format = TexelFormat::select(caps);
        let filter = if format.is_linear_filterable(caps) { FilterMode::Linear } else { FilterMode::Nearest };
        if filter == FilterMode::Nearest {
            tracing::warn!("float texture filtering unavailable; environment falls back to nearest sampling");
        }
        Self {
            format,
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: filter,
            base_mip_level: 0,
            max_mip_level: mip_count.max(1) - 1,
        }
    }
}
