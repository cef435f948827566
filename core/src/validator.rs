use crate::codec::{CodecError, ImageCodec, ImageCrateCodec};
use crate::render::{RenderError, RenderSimulation};
use crate::scanner::ScanConfig;
use crate::sniffer::{FormatSniffer, SniffError};
use crate::structural::{StructuralCheck, StructuralError};
use crate::verdict::{ScanTarget, Verdict};
use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use thiserror::Error;

/// Pipeline stage a file was in when it failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Sniffing,
    Decoding,
    RenderValidating,
    Task,
}

/// Every way validating a single file can end short of `Intact`.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Sniff(#[from] SniffError),
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("Error: {0}")]
    Panicked(String),
}

impl CheckError {
    pub fn stage(&self) -> Stage {
        match self {
            Self::Sniff(SniffError::Io(_)) | Self::Panicked(_) => Stage::Task,
            Self::Sniff(_) => Stage::Sniffing,
            Self::Structural(_) => Stage::Decoding,
            Self::Render(_) => Stage::RenderValidating,
        }
    }

    /// True when the file was deleted after discovery, whichever stage
    /// noticed it.
    pub fn is_vanished(&self) -> bool {
        match self {
            Self::Sniff(SniffError::Vanished) => true,
            Self::Structural(StructuralError::Open(CodecError::Io(error)))
            | Self::Structural(StructuralError::Load(CodecError::Io(error))) => {
                error.kind() == io::ErrorKind::NotFound
            }
            _ => false,
        }
    }

    pub fn into_verdict(self) -> Verdict {
        if self.is_vanished() {
            Verdict::skipped(SniffError::Vanished.to_string())
        } else {
            Verdict::corrupt(self.to_string())
        }
    }
}

/// Runs sniff, structural, and render checks in order, stopping at the
/// first failure.
#[derive(Debug, Clone)]
pub struct Validator<C = ImageCrateCodec> {
    codec: C,
    sniffer: FormatSniffer,
    structural: StructuralCheck,
    render: RenderSimulation,
}

impl Default for Validator<ImageCrateCodec> {
    fn default() -> Self {
        Self::new(ImageCrateCodec)
    }
}

impl<C: ImageCodec> Validator<C> {
    pub fn new(codec: C) -> Self {
        Self {
            codec,
            sniffer: FormatSniffer::default(),
            structural: StructuralCheck::default(),
            render: RenderSimulation::default(),
        }
    }

    pub fn from_config(codec: C, config: &ScanConfig) -> Self {
        Self {
            codec,
            sniffer: FormatSniffer::new(config.min_file_size),
            structural: StructuralCheck::new(config.max_dimension, config.thumbnail_size),
            render: RenderSimulation::new(config.pixel_samples, config.seed),
        }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn check(&self, path: &Path) -> Result<(), CheckError> {
        self.sniffer.sniff(path)?;
        let image = self.structural.run(&self.codec, path)?;
        self.render.run(&self.codec, &image)?;
        Ok(())
    }

    /// Produces the verdict for one target. Panics raised by a decoder are
    /// contained here and reported as a task error.
    pub fn validate(&self, target: &ScanTarget) -> Verdict {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.check(&target.path)))
            .unwrap_or_else(|payload| Err(CheckError::Panicked(panic_message(payload))));
        match outcome {
            Ok(()) => Verdict::Intact,
            Err(error) => {
                tracing::debug!(
                    path = %target.path.display(),
                    stage = ?error.stage(),
                    "check failed: {}", error
                );
                error.into_verdict()
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("decoder panicked")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::RgbaBuffer;
    use image::{Rgba, RgbaImage};
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn validator() -> Validator {
        Validator::default()
    }

    fn target(path: PathBuf) -> ScanTarget {
        let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        ScanTarget::new(path, size, 0)
    }

    fn noisy_png(path: &Path, width: u32, height: u32) {
        let mut state = 0x2545_F491u32;
        RgbaImage::from_fn(width, height, |_, _| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let [r, g, b, _] = state.to_le_bytes();
            Rgba([r, g, b, 255])
        })
        .save(path)
        .unwrap();
    }

    #[test]
    fn empty_png_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.png");
        fs::write(&path, b"").unwrap();
        assert_eq!(
            validator().validate(&target(path)),
            Verdict::corrupt("empty file")
        );
    }

    #[test]
    fn bad_png_signature_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("b.png");
        fs::write(&path, vec![0x42u8; 500]).unwrap();
        assert_eq!(
            validator().validate(&target(path)),
            Verdict::corrupt("invalid PNG header")
        );
    }

    #[test]
    fn small_opaque_png_is_intact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("c.png");
        noisy_png(&path, 10, 10);
        assert!(fs::metadata(&path).unwrap().len() >= 100);
        assert_eq!(validator().validate(&target(path)), Verdict::Intact);
    }

    #[test]
    fn transparent_black_png_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("d.png");
        RgbaImage::from_pixel(512, 512, Rgba([0, 0, 0, 0]))
            .save(&path)
            .unwrap();
        assert_eq!(
            validator().validate(&target(path)),
            Verdict::corrupt("completely empty image")
        );
    }

    #[test]
    fn jpeg_round_trip_is_intact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        image::RgbImage::from_fn(48, 32, |x, y| image::Rgb([x as u8 * 5, y as u8 * 7, 90]))
            .save(&path)
            .unwrap();
        assert_eq!(validator().validate(&target(path)), Verdict::Intact);
    }

    #[test]
    fn vanished_file_is_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone.png");
        let verdict = validator().validate(&ScanTarget::new(path, 500, 0));
        assert_eq!(verdict, Verdict::skipped("file vanished before validation"));
    }

    struct PanickingCodec;

    impl ImageCodec for PanickingCodec {
        type Handle = ();

        fn open(&self, _path: &Path) -> Result<(), CodecError> {
            panic!("decoder exploded")
        }

        fn dimensions(&self, _handle: &()) -> (u32, u32) {
            (1, 1)
        }

        fn verify_structure(&self, _handle: &()) -> Result<(), CodecError> {
            Ok(())
        }

        fn load(&self, _handle: &mut ()) -> Result<(), CodecError> {
            Ok(())
        }

        fn read_pixel(&self, _handle: &(), _x: u32, _y: u32) -> Result<[u8; 4], CodecError> {
            Ok([0; 4])
        }

        fn thumbnail(&self, _handle: &(), _max_size: u32) -> Result<(), CodecError> {
            Ok(())
        }

        fn to_rgba(&self, _handle: &()) -> Result<RgbaBuffer, CodecError> {
            Err(CodecError::NotLoaded)
        }
    }

    /// Behaves as if the file was removed right after the sniff.
    struct VanishingCodec;

    impl ImageCodec for VanishingCodec {
        type Handle = ();

        fn open(&self, _path: &Path) -> Result<(), CodecError> {
            Err(CodecError::Io(io::Error::from(io::ErrorKind::NotFound)))
        }

        fn dimensions(&self, _handle: &()) -> (u32, u32) {
            (1, 1)
        }

        fn verify_structure(&self, _handle: &()) -> Result<(), CodecError> {
            Ok(())
        }

        fn load(&self, _handle: &mut ()) -> Result<(), CodecError> {
            Ok(())
        }

        fn read_pixel(&self, _handle: &(), _x: u32, _y: u32) -> Result<[u8; 4], CodecError> {
            Ok([0; 4])
        }

        fn thumbnail(&self, _handle: &(), _max_size: u32) -> Result<(), CodecError> {
            Ok(())
        }

        fn to_rgba(&self, _handle: &()) -> Result<RgbaBuffer, CodecError> {
            Err(CodecError::NotLoaded)
        }
    }

    #[test]
    fn file_removed_before_decode_is_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("late.png");
        noisy_png(&path, 10, 10);
        let verdict = Validator::new(VanishingCodec).validate(&target(path));
        assert_eq!(verdict, Verdict::skipped("file vanished before validation"));
    }

    #[test]
    fn other_open_failures_stay_corrupt() {
        let error = CheckError::from(StructuralError::Open(CodecError::Io(io::Error::from(
            io::ErrorKind::PermissionDenied,
        ))));
        assert!(!error.is_vanished());
        assert!(error.into_verdict().is_corrupt());
    }

    #[cfg(unix)]
    #[test]
    fn permission_denied_is_a_task_error() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("locked.png");
        noisy_png(&path, 10, 10);
        fs::set_permissions(&path, fs::Permissions::from_mode(0o000)).unwrap();
        // Root can open the file regardless of mode bits.
        let enforced = fs::File::open(&path).is_err();

        let verdict = validator().validate(&target(path.clone()));
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        if !enforced {
            return;
        }
        assert!(verdict.is_corrupt());
        assert!(verdict.reason().unwrap().starts_with("Error: "));
    }

    #[test]
    fn decoder_panic_becomes_task_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("boom.tif");
        fs::write(&path, vec![0x01u8; 200]).unwrap();
        let verdict = Validator::new(PanickingCodec).validate(&target(path));
        assert_eq!(verdict, Verdict::corrupt("Error: decoder exploded"));
    }

    #[test]
    fn stages_are_attributed() {
        assert_eq!(CheckError::from(SniffError::Empty).stage(), Stage::Sniffing);
        assert_eq!(
            CheckError::from(RenderError::Blank).stage(),
            Stage::RenderValidating
        );
        assert_eq!(
            CheckError::from(StructuralError::InvalidDimensions(0, 0)).stage(),
            Stage::Decoding
        );
        assert_eq!(CheckError::Panicked(String::new()).stage(), Stage::Task);
    }
}
