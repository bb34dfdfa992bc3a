//! Material flags that influence distance field baking

use crate::{Error, Result};
use glam::Vec2;
use std::sync::Arc;

/// An 8-bit texture kept on the CPU for alpha testing
///
/// Pixels are tightly packed rows; the last byte of each pixel is alpha.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    width: u32,
    height: u32,
    bytes_per_pixel: u8,
    data: Vec<u8>,
}

impl Texture {
    pub fn new(width: u32, height: u32, bytes_per_pixel: u8, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidParameter(format!(
                "texture dimensions must be non-zero, got {}x{}",
                width, height
            )));
        }
        if bytes_per_pixel == 0 {
            return Err(Error::InvalidParameter(
                "texture must have at least one byte per pixel".into(),
            ));
        }
        let expected = width as usize * height as usize * bytes_per_pixel as usize;
        if data.len() != expected {
            return Err(Error::InvalidParameter(format!(
                "texture data is {} bytes, expected {}",
                data.len(),
                expected
            )));
        }
        Ok(Self {
            width,
            height,
            bytes_per_pixel,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bytes_per_pixel(&self) -> u8 {
        self.bytes_per_pixel
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Alpha of the texel under `uv`, nearest filtering with wrap addressing
    pub fn alpha_at(&self, uv: Vec2) -> u8 {
        let u = uv.x.rem_euclid(1.0);
        let v = uv.y.rem_euclid(1.0);
        let x = ((u * self.width as f32) as u32).min(self.width - 1) as usize;
        let y = ((v * self.height as f32) as u32).min(self.height - 1) as usize;

        let bpp = self.bytes_per_pixel as usize;
        let offset = (y * self.width as usize + x) * bpp;
        self.data[offset + bpp - 1]
    }
}

/// Per-section material state seen by the baker
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Material {
    /// Faces have no meaningful back side for the inside/outside vote
    pub two_sided: bool,
    /// Hits on texels with alpha below `alpha_reference` are ignored
    pub alpha_test: bool,
    pub alpha_reference: u8,
    pub diffuse: Option<Arc<Texture>>,
}

impl Material {
    /// One-sided, no alpha test
    pub fn opaque() -> Self {
        Self::default()
    }

    pub fn with_two_sided(mut self, two_sided: bool) -> Self {
        self.two_sided = two_sided;
        self
    }

    /// Enable alpha testing against `texture`
    pub fn with_alpha_test(mut self, reference: u8, texture: Arc<Texture>) -> Self {
        self.alpha_test = true;
        self.alpha_reference = reference;
        self.diffuse = Some(texture);
        self
    }

    /// Whether a surface point with texture coordinate `uv` blocks rays.
    ///
    /// Alpha-tested materials without a texture block everywhere.
    pub fn is_opaque_at(&self, uv: Vec2) -> bool {
        if !self.alpha_test {
            return true;
        }
        match &self.diffuse {
            Some(texture) => texture.alpha_at(uv) >= self.alpha_reference,
            None => true,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// 2x2 RGBA texture: left column opaque, right column transparent
    fn half_cutout() -> Texture {
        #[rustfmt::skip]
        let data = vec![
            255, 255, 255, 255,   0, 0, 0, 0,
            255, 255, 255, 255,   0, 0, 0, 0,
        ];
        Texture::new(2, 2, 4, data).unwrap()
    }

    #[test]
    fn texture_rejects_wrong_length() {
        assert!(Texture::new(2, 2, 4, vec![0; 15]).is_err());
        assert!(Texture::new(0, 2, 4, Vec::new()).is_err());
        assert!(Texture::new(1, 1, 0, Vec::new()).is_err());
    }

    #[test]
    fn alpha_lookup_wraps() {
        let tex = half_cutout();
        assert_eq!(tex.alpha_at(Vec2::new(0.25, 0.25)), 255);
        assert_eq!(tex.alpha_at(Vec2::new(0.75, 0.25)), 0);
        assert_eq!(tex.alpha_at(Vec2::new(1.25, -0.75)), 255);
        assert_eq!(tex.alpha_at(Vec2::new(1.0, 1.0)), 255);
    }

    #[test]
    fn alpha_test_rejects_transparent_texels() {
        let mat = Material::opaque().with_alpha_test(128, Arc::new(half_cutout()));
        assert!(mat.is_opaque_at(Vec2::new(0.1, 0.5)));
        assert!(!mat.is_opaque_at(Vec2::new(0.9, 0.5)));
    }

    #[test]
    fn non_alpha_tested_is_always_opaque() {
        let mut mat = Material::opaque();
        mat.diffuse = Some(Arc::new(half_cutout()));
        assert!(mat.is_opaque_at(Vec2::new(0.9, 0.5)));

        let no_texture = Material {
            alpha_test: true,
            alpha_reference: 200,
            ..Material::default()
        };
        assert!(no_texture.is_opaque_at(Vec2::ZERO));
    }
}
