//! Cheap pre-decode rejection based on file size and magic numbers.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use thiserror::Error;

/// Files smaller than this are rejected before any decode.
pub const DEFAULT_MIN_FILE_SIZE: u64 = 100;

const HEADER_LEN: usize = 20;
const JPEG_SOI: &[u8] = &[0xFF, 0xD8, 0xFF];
const JPEG_EOI: &[u8] = &[0xFF, 0xD9];
const PNG_SIGNATURE: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Debug, Error)]
pub enum SniffError {
    #[error("empty file")]
    Empty,
    #[error("file too small")]
    TooSmall(u64),
    #[error("incomplete header")]
    IncompleteHeader,
    #[error("invalid {0} header")]
    BadSignature(&'static str),
    #[error("incomplete JPEG trailer")]
    MissingJpegTrailer,
    /// The file disappeared between discovery and validation.
    #[error("file vanished before validation")]
    Vanished,
    #[error("Error: {0}")]
    Io(#[from] io::Error),
}

/// Magic-number rule for one family of extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureRule {
    Jpeg,
    Png,
    Gif,
    Bmp,
    Webp,
}

impl SignatureRule {
    pub fn for_extension(extension: &str) -> Option<Self> {
        match extension {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "bmp" => Some(Self::Bmp),
            "webp" => Some(Self::Webp),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::Gif => "GIF",
            Self::Bmp => "BMP",
            Self::Webp => "WebP",
        }
    }

    /// Checks the leading bytes of a file against this rule.
    pub fn matches_header(self, header: &[u8]) -> bool {
        match self {
            Self::Jpeg => header.starts_with(JPEG_SOI),
            Self::Png => header.starts_with(PNG_SIGNATURE),
            Self::Gif => header.starts_with(b"GIF87a") || header.starts_with(b"GIF89a"),
            Self::Bmp => header.starts_with(b"BM"),
            Self::Webp => {
                header.len() >= 12 && &header[0..4] == b"RIFF" && &header[8..12] == b"WEBP"
            }
        }
    }
}

/// Size and signature checks for a single file. Never invokes a decoder.
#[derive(Debug, Clone, Copy)]
pub struct FormatSniffer {
    min_file_size: u64,
}

impl Default for FormatSniffer {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_FILE_SIZE)
    }
}

impl FormatSniffer {
    pub fn new(min_file_size: u64) -> Self {
        Self { min_file_size }
    }

    pub fn sniff(&self, path: &Path) -> Result<(), SniffError> {
        let mut file = File::open(path).map_err(vanished_or_io)?;
        let size = file.metadata().map_err(vanished_or_io)?.len();
        if size == 0 {
            return Err(SniffError::Empty);
        }
        if size < self.min_file_size {
            return Err(SniffError::TooSmall(size));
        }

        let header = read_header(&mut file)?;
        if header.len() < 4 {
            return Err(SniffError::IncompleteHeader);
        }

        let rule = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| SignatureRule::for_extension(&ext.to_ascii_lowercase()));
        let Some(rule) = rule else {
            return Ok(());
        };

        if !rule.matches_header(&header) {
            return Err(SniffError::BadSignature(rule.label()));
        }
        if rule == SignatureRule::Jpeg && !has_jpeg_trailer(&mut file)? {
            return Err(SniffError::MissingJpegTrailer);
        }
        Ok(())
    }
}

fn read_header(file: &mut File) -> Result<Vec<u8>, SniffError> {
    let mut header = Vec::with_capacity(HEADER_LEN);
    file.by_ref()
        .take(HEADER_LEN as u64)
        .read_to_end(&mut header)?;
    Ok(header)
}

fn has_jpeg_trailer(file: &mut File) -> Result<bool, SniffError> {
    let mut trailer = [0u8; 2];
    file.seek(SeekFrom::End(-2))?;
    file.read_exact(&mut trailer)?;
    Ok(trailer == JPEG_EOI)
}

fn vanished_or_io(error: io::Error) -> SniffError {
    if error.kind() == io::ErrorKind::NotFound {
        SniffError::Vanished
    } else {
        SniffError::Io(error)
    }
}
