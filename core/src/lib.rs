//! Core image integrity engine for pixguard.
//!
//! A scan walks a directory tree, runs every candidate image through a
//! sniff -> structural decode -> render simulation pipeline on a worker
//! pool, and aggregates the verdicts into a `ScanReport`. Scanning is
//! read-only; corrupt files are reported, never modified.

pub mod codec;
pub mod collector;
pub mod progress;
pub mod render;
pub mod reporting;
pub mod scanner;
pub mod settings;
pub mod sniffer;
pub mod structural;
pub mod validator;
pub mod verdict;

pub use codec::{CodecError, ImageCodec, ImageCrateCodec, RgbaBuffer};
pub use collector::{collect_targets, default_extensions, Collection, CollectionError};
pub use progress::{BarObserver, ConsolePrinter, ScanObserver, Silent, Tally};
pub use render::{RenderError, RenderSimulation};
pub use reporting::{
    format_size, render_text, write_json, write_report, CorruptEntry, RepairRequest, ReportError,
    ScanReport, SkippedEntry,
};
pub use scanner::{
    scan, scan_collection, scan_with_codec, CancelToken, ScanConfig, ScanOutcome, ThreadingMode,
};
pub use settings::{ScanSettings, SettingsError, DEFAULT_CONFIG_FILE};
pub use sniffer::{FormatSniffer, SignatureRule, SniffError};
pub use structural::{StructuralCheck, StructuralError};
pub use validator::{CheckError, Stage, Validator};
pub use verdict::{FileResult, ScanTarget, Verdict};
