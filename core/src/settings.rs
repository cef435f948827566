//! File-based configuration for scans.
//!
//! Settings are read from TOML so a scan profile can be kept next to an
//! asset tree without repeating flags. Every key is optional.

use crate::collector::default_extensions;
use crate::progress::DEFAULT_PROGRESS_INTERVAL;
use crate::render::{DEFAULT_PIXEL_SAMPLES, DEFAULT_SEED};
use crate::scanner::{ScanConfig, ThreadingMode};
use crate::sniffer::DEFAULT_MIN_FILE_SIZE;
use crate::structural::{DEFAULT_MAX_DIMENSION, DEFAULT_THUMBNAIL_SIZE};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "pixguard.toml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read config {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config TOML in {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Worker pool size; absent or 0 means automatic.
    pub threads: Option<usize>,
    /// Suppress per-file lines in favour of periodic status lines.
    pub quiet: bool,
    /// Path that receives the rendered report text.
    pub output: Option<PathBuf>,
    /// Path that receives the report as JSON.
    pub json_output: Option<PathBuf>,
    pub extensions: Vec<String>,
    pub min_file_size: u64,
    pub max_dimension: u32,
    pub thumbnail_size: u32,
    pub pixel_samples: u32,
    pub progress_interval: usize,
    pub seed: u64,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            threads: None,
            quiet: false,
            output: None,
            json_output: None,
            extensions: default_extensions(),
            min_file_size: DEFAULT_MIN_FILE_SIZE,
            max_dimension: DEFAULT_MAX_DIMENSION,
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
            pixel_samples: DEFAULT_PIXEL_SAMPLES,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            seed: DEFAULT_SEED,
        }
    }
}

impl ScanSettings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Looks in the working directory, then the user config directory.
    /// A file that exists but fails to parse is an error rather than a
    /// silent fallback to defaults.
    pub fn load_or_default() -> Result<Self, SettingsError> {
        for candidate in search_paths() {
            match Self::load(&candidate) {
                Ok(settings) => {
                    tracing::debug!(path = %candidate.display(), "loaded settings");
                    return Ok(settings);
                }
                Err(SettingsError::NotFound(_)) => continue,
                Err(error) => return Err(error),
            }
        }
        Ok(Self::default())
    }

    pub fn scan_config(&self, threading: ThreadingMode) -> ScanConfig {
        let extensions = self
            .extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
            .collect();
        ScanConfig::new(extensions, threading)
            .with_threads(self.threads)
            .with_min_file_size(self.min_file_size)
            .with_max_dimension(self.max_dimension)
            .with_thumbnail_size(self.thumbnail_size)
            .with_pixel_samples(self.pixel_samples)
            .with_seed(self.seed)
            .with_progress_interval(self.progress_interval)
    }
}

fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(DEFAULT_CONFIG_FILE)];
    if let Some(mut dir) = dirs::config_dir() {
        dir.push("pixguard");
        dir.push(DEFAULT_CONFIG_FILE);
        paths.push(dir);
    }
    paths
}
