use crate::codec::{CodecError, ImageCodec};
use std::path::Path;
use thiserror::Error;

/// Largest width or height accepted from a decoder.
pub const DEFAULT_MAX_DIMENSION: u32 = 50_000;
/// Bound used for the thumbnail pass.
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 100;

#[derive(Debug, Error)]
pub enum StructuralError {
    #[error("open failed: {0}")]
    Open(#[source] CodecError),
    #[error("invalid dimensions: {0}x{1}")]
    InvalidDimensions(u32, u32),
    #[error("excessive dimensions: {0}x{1}")]
    ExcessiveDimensions(u32, u32),
    #[error("{0}")]
    Verify(#[source] CodecError),
    #[error("full decode failed: {0}")]
    Load(#[source] CodecError),
    #[error("corner pixel read failed: {0}")]
    CornerPixel(#[source] CodecError),
    #[error("thumbnail failed: {0}")]
    Thumbnail(#[source] CodecError),
}

/// Decoder-level checks: geometry, structure, and a full decode.
#[derive(Debug, Clone, Copy)]
pub struct StructuralCheck {
    max_dimension: u32,
    thumbnail_size: u32,
}

impl Default for StructuralCheck {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DIMENSION, DEFAULT_THUMBNAIL_SIZE)
    }
}

impl StructuralCheck {
    pub fn new(max_dimension: u32, thumbnail_size: u32) -> Self {
        Self {
            max_dimension,
            thumbnail_size: thumbnail_size.max(1),
        }
    }

    /// Runs every structural step and hands back the fully loaded image so
    /// later stages do not decode it again.
    pub fn run<C: ImageCodec>(&self, codec: &C, path: &Path) -> Result<C::Handle, StructuralError> {
        let probe = codec.open(path).map_err(StructuralError::Open)?;
        let (width, height) = codec.dimensions(&probe);
        if width == 0 || height == 0 {
            return Err(StructuralError::InvalidDimensions(width, height));
        }
        if width > self.max_dimension || height > self.max_dimension {
            return Err(StructuralError::ExcessiveDimensions(width, height));
        }
        codec
            .verify_structure(&probe)
            .map_err(StructuralError::Verify)?;

        let mut image = probe;
        codec.load(&mut image).map_err(StructuralError::Load)?;
        let (width, height) = codec.dimensions(&image);
        if width == 0 || height == 0 {
            return Err(StructuralError::InvalidDimensions(width, height));
        }
        codec
            .read_pixel(&image, 0, 0)
            .and_then(|_| codec.read_pixel(&image, width - 1, height - 1))
            .map_err(StructuralError::CornerPixel)?;
        codec
            .thumbnail(&image, self.thumbnail_size)
            .map_err(StructuralError::Thumbnail)?;
        Ok(image)
    }
}
