use crate::verdict::ScanTarget;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Extensions recognised as image files, lower-case and without dots.
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp", "ico", "ppm", "pgm", "pbm", "pnm",
];

pub fn default_extensions() -> Vec<String> {
    IMAGE_EXTENSIONS.iter().map(|ext| ext.to_string()).collect()
}

/// Errors that prevent a scan from starting at all.
#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("directory '{}' does not exist", .0.display())]
    RootMissing(PathBuf),
    #[error("'{}' is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("cannot resolve '{}'", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Targets discovered under a root, in deterministic walk order.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    pub root: PathBuf,
    pub targets: Vec<ScanTarget>,
    /// Entries the walk could not read; they are skipped, not fatal.
    pub unreadable: usize,
}

impl Collection {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Resolves `root` to an absolute directory path.
pub fn resolve_root(root: &Path) -> Result<PathBuf, CollectionError> {
    let resolved = fs::canonicalize(root).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => CollectionError::RootMissing(root.to_path_buf()),
        _ => CollectionError::Io {
            path: root.to_path_buf(),
            source,
        },
    })?;
    if !resolved.is_dir() {
        return Err(CollectionError::NotADirectory(resolved));
    }
    Ok(resolved)
}

/// Walks `root` recursively and returns every regular file whose extension
/// is in `extensions`. Siblings are visited in file-name order.
pub fn collect_targets(root: &Path, extensions: &[String]) -> Result<Collection, CollectionError> {
    let root = resolve_root(root)?;
    let mut collection = Collection {
        root: root.clone(),
        ..Collection::default()
    };

    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                warn!(
                    path = ?error.path(),
                    "skipping unreadable entry: {}", error
                );
                collection.unreadable += 1;
                continue;
            }
        };

        let file_type = entry.file_type();
        if file_type.is_dir() || !has_image_extension(entry.path(), extensions) {
            continue;
        }
        if !file_type.is_file() && !file_type.is_symlink() {
            continue;
        }

        // Symlinks are kept when their target is a regular file.
        match fs::metadata(entry.path()) {
            Ok(metadata) if metadata.is_file() => {
                let index = collection.targets.len();
                collection
                    .targets
                    .push(ScanTarget::new(entry.into_path(), metadata.len(), index));
            }
            Ok(_) => debug!(path = %entry.path().display(), "not a regular file"),
            Err(error) => {
                warn!(path = %entry.path().display(), "cannot stat file: {}", error);
                collection.unreadable += 1;
            }
        }
    }

    debug!(
        root = %root.display(),
        found = collection.targets.len(),
        unreadable = collection.unreadable,
        "collection finished"
    );
    Ok(collection)
}

pub fn has_image_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let lower = ext.to_lowercase();
            extensions.iter().any(|candidate| candidate == &lower)
        })
        .unwrap_or(false)
}
