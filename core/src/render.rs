//! Simulates how a browser or GPU texture upload would consume an image.
//!
//! Some files decode cleanly but still produce an unusable texture: a short
//! RGBA plane, or a buffer of nothing but zeros. These checks run on the
//! already-loaded image handed over by the structural stage.

use crate::codec::{CodecError, ImageCodec};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

pub const DEFAULT_PIXEL_SAMPLES: u32 = 100;
pub const DEFAULT_SEED: u64 = 0x5EED_1A6E;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("RGBA conversion failed: {0}")]
    Conversion(#[source] CodecError),
    #[error("incomplete RGBA data: got {actual} of {expected}")]
    SizeMismatch { actual: u64, expected: u64 },
    #[error("completely empty image")]
    Blank,
    #[error("pixel read error: {0}")]
    PixelRead(#[source] CodecError),
}

#[derive(Debug, Clone, Copy)]
pub struct RenderSimulation {
    samples: u32,
    seed: u64,
}

impl Default for RenderSimulation {
    fn default() -> Self {
        Self::new(DEFAULT_PIXEL_SAMPLES, DEFAULT_SEED)
    }
}

impl RenderSimulation {
    pub fn new(samples: u32, seed: u64) -> Self {
        Self { samples, seed }
    }

    pub fn run<C: ImageCodec>(&self, codec: &C, image: &C::Handle) -> Result<(), RenderError> {
        let (width, height) = codec.dimensions(image);
        let buffer = codec.to_rgba(image).map_err(RenderError::Conversion)?;

        let expected = u64::from(width) * u64::from(height) * 4;
        let actual = buffer.data.len() as u64;
        if actual != expected {
            return Err(RenderError::SizeMismatch { actual, expected });
        }
        if buffer.is_blank() {
            return Err(RenderError::Blank);
        }

        let pixels = u64::from(width) * u64::from(height);
        let samples = u64::from(self.samples).min(pixels);
        let mut rng = StdRng::seed_from_u64(self.seed);
        for _ in 0..samples {
            let x = rng.random_range(0..width);
            let y = rng.random_range(0..height);
            buffer.pixel(x, y).map_err(RenderError::PixelRead)?;
        }
        Ok(())
    }
}
