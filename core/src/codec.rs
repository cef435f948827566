//! Decode capability used by the structural and render checks.
//!
//! The checks only talk to [`ImageCodec`], so any decoding library that can
//! open, verify, materialize, and sample an image can back a scan.
//! [`ImageCrateCodec`] is the implementation built on the `image` crate.

use image::{DynamicImage, GenericImageView, ImageDecoder, ImageFormat, ImageReader};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    Decode(#[from] image::ImageError),
    #[error("unrecognised image format")]
    UnknownFormat,
    #[error("pixel data has not been loaded")]
    NotLoaded,
    #[error("pixel ({x}, {y}) is outside {width}x{height}")]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    #[error("{0}")]
    Structure(String),
}

/// Flat RGBA8 pixel buffer as a texture upload would receive it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaBuffer {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl RgbaBuffer {
    pub fn expected_len(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height) * 4
    }

    pub fn is_blank(&self) -> bool {
        self.data.iter().all(|&byte| byte == 0)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Result<[u8; 4], CodecError> {
        if x >= self.width || y >= self.height {
            return Err(CodecError::OutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        self.data
            .get(offset..offset + 4)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or(CodecError::OutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            })
    }
}

pub trait ImageCodec: Send + Sync {
    type Handle: Send;

    /// Opens the file and parses enough to know its declared dimensions.
    fn open(&self, path: &Path) -> Result<Self::Handle, CodecError>;

    fn dimensions(&self, handle: &Self::Handle) -> (u32, u32);

    /// Structural self-check that stops short of decoding pixel data.
    fn verify_structure(&self, handle: &Self::Handle) -> Result<(), CodecError>;

    /// Re-opens the file and fully materializes its pixel data.
    fn load(&self, handle: &mut Self::Handle) -> Result<(), CodecError>;

    fn read_pixel(&self, handle: &Self::Handle, x: u32, y: u32) -> Result<[u8; 4], CodecError>;

    /// Downsizes a loaded image so it fits in `max_size` x `max_size`.
    fn thumbnail(&self, handle: &Self::Handle, max_size: u32) -> Result<Self::Handle, CodecError>;

    fn to_rgba(&self, handle: &Self::Handle) -> Result<RgbaBuffer, CodecError>;
}

/// Handle produced by [`ImageCrateCodec`].
#[derive(Debug)]
pub struct ImageHandle {
    path: PathBuf,
    format: ImageFormat,
    declared: (u32, u32),
    image: Option<DynamicImage>,
}

impl ImageHandle {
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn is_loaded(&self) -> bool {
        self.image.is_some()
    }

    fn loaded(&self) -> Result<&DynamicImage, CodecError> {
        self.image.as_ref().ok_or(CodecError::NotLoaded)
    }
}

/// [`ImageCodec`] backed by the `image` crate's format detection and decoders.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateCodec;

impl ImageCrateCodec {
    fn reader(path: &Path) -> Result<ImageReader<io::BufReader<std::fs::File>>, CodecError> {
        Ok(ImageReader::open(path)?.with_guessed_format()?)
    }
}

impl ImageCodec for ImageCrateCodec {
    type Handle = ImageHandle;

    fn open(&self, path: &Path) -> Result<ImageHandle, CodecError> {
        let reader = Self::reader(path)?;
        let format = reader.format().ok_or(CodecError::UnknownFormat)?;
        let declared = reader.into_dimensions()?;
        Ok(ImageHandle {
            path: path.to_path_buf(),
            format,
            declared,
            image: None,
        })
    }

    fn dimensions(&self, handle: &ImageHandle) -> (u32, u32) {
        match &handle.image {
            Some(image) => image.dimensions(),
            None => handle.declared,
        }
    }

    fn verify_structure(&self, handle: &ImageHandle) -> Result<(), CodecError> {
        // Building the format decoder walks the header segments/chunks.
        let decoder = Self::reader(&handle.path)?.into_decoder()?;
        let parsed = decoder.dimensions();
        if parsed != handle.declared {
            return Err(CodecError::Structure(format!(
                "decoder reports {}x{} but header declared {}x{}",
                parsed.0, parsed.1, handle.declared.0, handle.declared.1
            )));
        }
        let (width, height) = parsed;
        let bytes_per_pixel = u64::from(decoder.color_type().bytes_per_pixel());
        let expected = u64::from(width)
            .checked_mul(u64::from(height))
            .and_then(|pixels| pixels.checked_mul(bytes_per_pixel));
        match expected {
            Some(bytes) if bytes == decoder.total_bytes() => Ok(()),
            _ => Err(CodecError::Structure(String::from(
                "decoder buffer size disagrees with declared geometry",
            ))),
        }
    }

    fn load(&self, handle: &mut ImageHandle) -> Result<(), CodecError> {
        let image = Self::reader(&handle.path)?.decode()?;
        handle.image = Some(image);
        Ok(())
    }

    fn read_pixel(&self, handle: &ImageHandle, x: u32, y: u32) -> Result<[u8; 4], CodecError> {
        let image = handle.loaded()?;
        if !image.in_bounds(x, y) {
            let (width, height) = image.dimensions();
            return Err(CodecError::OutOfBounds {
                x,
                y,
                width,
                height,
            });
        }
        Ok(image.get_pixel(x, y).0)
    }

    fn thumbnail(&self, handle: &ImageHandle, max_size: u32) -> Result<ImageHandle, CodecError> {
        let image = handle.loaded()?;
        let thumb = image.thumbnail(max_size, max_size);
        Ok(ImageHandle {
            path: handle.path.clone(),
            format: handle.format,
            declared: thumb.dimensions(),
            image: Some(thumb),
        })
    }

    fn to_rgba(&self, handle: &ImageHandle) -> Result<RgbaBuffer, CodecError> {
        let rgba = handle.loaded()?.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(RgbaBuffer {
            width,
            height,
            data: rgba.into_raw(),
        })
    }
}
