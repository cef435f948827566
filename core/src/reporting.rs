use crate::scanner::ScanOutcome;
use crate::verdict::{FileResult, Verdict};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write as _};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

const HEADER_RULE: usize = 60;
const SECTION_RULE: usize = 40;
/// Exit statuses wrap above this on common platforms.
pub const MAX_EXIT_CODE: i32 = 255;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("io error for {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorruptEntry {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub path: PathBuf,
    pub reason: String,
}

/// A corrupt file handed to downstream re-encoding tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairRequest {
    pub path: PathBuf,
    pub reason: String,
}

/// Aggregated result of one scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub root: PathBuf,
    pub generated_at: String,
    pub total_files: usize,
    pub intact_files: usize,
    pub corrupt: Vec<CorruptEntry>,
    pub skipped: Vec<SkippedEntry>,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
    pub files_per_second: f64,
}

impl ScanReport {
    /// Builds the report from per-file results. Corrupt and skipped entries
    /// keep the order of `results`.
    pub fn from_results(
        root: &Path,
        total_files: usize,
        results: &[FileResult],
        elapsed: Duration,
    ) -> Self {
        let mut corrupt = Vec::new();
        let mut skipped = Vec::new();
        let mut intact_files = 0;
        for FileResult { target, verdict } in results {
            match verdict {
                Verdict::Intact => intact_files += 1,
                Verdict::Corrupt { reason } => corrupt.push(CorruptEntry {
                    path: target.path.clone(),
                    size_bytes: target.size_bytes,
                    reason: reason.clone(),
                }),
                Verdict::Skipped { reason } => skipped.push(SkippedEntry {
                    path: target.path.clone(),
                    reason: reason.clone(),
                }),
            }
        }

        let seconds = elapsed.as_secs_f64();
        let files_per_second = if seconds > 0.0 {
            total_files as f64 / seconds
        } else {
            0.0
        };

        Self {
            root: root.to_path_buf(),
            generated_at: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_else(|_| String::from("unknown")),
            total_files,
            intact_files,
            corrupt,
            skipped,
            elapsed,
            files_per_second,
        }
    }

    pub fn from_outcome(outcome: &ScanOutcome) -> Self {
        Self::from_results(
            &outcome.root,
            outcome.total,
            &outcome.results,
            outcome.elapsed,
        )
    }

    pub fn is_clean(&self) -> bool {
        self.corrupt.is_empty()
    }

    /// Process exit status: the number of corrupt files, saturated.
    pub fn exit_code(&self) -> i32 {
        i32::try_from(self.corrupt.len())
            .unwrap_or(i32::MAX)
            .min(MAX_EXIT_CODE)
    }

    pub fn repair_requests(&self) -> Vec<RepairRequest> {
        self.corrupt
            .iter()
            .map(|entry| RepairRequest {
                path: entry.path.clone(),
                reason: entry.reason.clone(),
            })
            .collect()
    }
}

/// Human-readable byte count using 1024-based units.
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return String::from("0 B");
    }
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{:.1} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1} TB", size)
}

pub fn render_text(report: &ScanReport) -> String {
    let mut text = String::new();
    // Writing into a String cannot fail.
    let _ = write_text(&mut text, report);
    text
}

fn write_text(out: &mut String, report: &ScanReport) -> std::fmt::Result {
    writeln!(out, "IMAGE INTEGRITY REPORT")?;
    writeln!(out, "{}", "=".repeat(HEADER_RULE))?;
    writeln!(out, "Directory: {}", report.root.display())?;
    writeln!(out, "Generated: {}", report.generated_at)?;
    writeln!(out, "Total images: {}", report.total_files)?;
    writeln!(out, "Corrupt images: {}", report.corrupt.len())?;
    writeln!(out, "Skipped images: {}", report.skipped.len())?;
    writeln!(out, "Elapsed: {:.2}s", report.elapsed.as_secs_f64())?;
    writeln!(out, "Throughput: {:.1} img/s", report.files_per_second)?;
    writeln!(out)?;

    if report.corrupt.is_empty() {
        writeln!(out, "No corrupt images found.")?;
    } else {
        writeln!(out, "CORRUPT IMAGES:")?;
        writeln!(out, "{}", "-".repeat(SECTION_RULE))?;
        for (number, entry) in report.corrupt.iter().enumerate() {
            writeln!(out, "{}. {}", number + 1, entry.path.display())?;
            writeln!(out, "   Size: {}", format_size(entry.size_bytes))?;
            writeln!(out, "   Reason: {}", entry.reason)?;
            writeln!(out)?;
        }
    }

    if !report.skipped.is_empty() {
        writeln!(out)?;
        writeln!(out, "SKIPPED FILES:")?;
        writeln!(out, "{}", "-".repeat(SECTION_RULE))?;
        for (number, entry) in report.skipped.iter().enumerate() {
            writeln!(out, "{}. {}", number + 1, entry.path.display())?;
            writeln!(out, "   Reason: {}", entry.reason)?;
        }
    }
    Ok(())
}

/// Persists rendered report text verbatim.
pub fn write_report(text: &str, output_path: &Path) -> Result<(), ReportError> {
    ensure_parent(output_path)?;
    fs::write(output_path, text).map_err(|source| ReportError::Io {
        path: output_path.to_path_buf(),
        source,
    })
}

pub fn write_json(report: &ScanReport, output_path: &Path) -> Result<(), ReportError> {
    ensure_parent(output_path)?;
    let file = File::create(output_path).map_err(|source| ReportError::Io {
        path: output_path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.flush().map_err(|source| ReportError::Io {
        path: output_path.to_path_buf(),
        source,
    })
}

fn ensure_parent(path: &Path) -> Result<(), ReportError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|source| ReportError::Io {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let seconds = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(seconds).map_err(serde::de::Error::custom)
    }
}
