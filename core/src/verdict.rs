use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// One discovered candidate image, queued for validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanTarget {
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Position in discovery order, used to present results stably.
    pub index: usize,
}

impl ScanTarget {
    pub fn new(path: PathBuf, size_bytes: u64, index: usize) -> Self {
        Self {
            path,
            size_bytes,
            index,
        }
    }

    /// Lower-cased extension without the leading dot, if any.
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
    }
}

/// Classification result for a single target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Verdict {
    Intact,
    Corrupt { reason: String },
    /// The file could not be examined at all (vanished, scan cancelled).
    Skipped { reason: String },
}

impl Verdict {
    pub fn corrupt(reason: impl Into<String>) -> Self {
        Self::Corrupt {
            reason: reason.into(),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    pub fn is_intact(&self) -> bool {
        matches!(self, Self::Intact)
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Intact => None,
            Self::Corrupt { reason } | Self::Skipped { reason } => Some(reason),
        }
    }
}

impl Display for Verdict {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Intact => write!(f, "intact"),
            Self::Corrupt { reason } => write!(f, "corrupt ({})", reason),
            Self::Skipped { reason } => write!(f, "skipped ({})", reason),
        }
    }
}

/// A target paired with the verdict it received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileResult {
    pub target: ScanTarget,
    pub verdict: Verdict,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_lowercased() {
        let target = ScanTarget::new(PathBuf::from("/tmp/Photo.JPG"), 10, 0);
        assert_eq!(target.extension().as_deref(), Some("jpg"));
        let bare = ScanTarget::new(PathBuf::from("/tmp/README"), 10, 1);
        assert_eq!(bare.extension(), None);
    }

    #[test]
    fn reason_is_exposed_for_non_intact_verdicts() {
        assert_eq!(Verdict::Intact.reason(), None);
        assert_eq!(Verdict::corrupt("empty file").reason(), Some("empty file"));
        assert!(Verdict::skipped("gone").is_skipped());
        assert_eq!(
            Verdict::corrupt("invalid PNG header").to_string(),
            "corrupt (invalid PNG header)"
        );
    }
}
