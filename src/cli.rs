use clap::Parser;
use pixguard_core::{ScanSettings, ThreadingMode};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "pixguard")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Detects corrupt images using decode and render-simulation checks")]
pub struct Cli {
    /// Directory to scan
    #[arg(short, long, default_value = ".")]
    pub directory: PathBuf,

    /// Print periodic status lines instead of one line per file
    #[arg(short, long)]
    pub quiet: bool,

    /// Write the rendered report to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Worker threads (default: one per CPU)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Validate files one at a time on the main thread
    #[arg(long)]
    pub no_thread: bool,

    /// Also write the report as JSON for repair tooling
    #[arg(long, value_name = "FILE")]
    pub json: Option<PathBuf>,

    /// Settings file (default: ./pixguard.toml, then the user config dir)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Show a progress bar instead of text progress lines
    #[arg(long)]
    pub progress_bar: bool,
}

/// Effective options after merging the settings file with flags.
#[derive(Debug, PartialEq)]
pub struct CliConfig {
    pub root: PathBuf,
    pub threading: ThreadingMode,
    pub quiet: bool,
    pub progress_bar: bool,
    pub output: Option<PathBuf>,
    pub json: Option<PathBuf>,
    pub settings: ScanSettings,
}

impl Cli {
    /// Flags win over values from the settings file.
    pub fn merge(self, mut settings: ScanSettings) -> CliConfig {
        if self.threads.is_some() {
            settings.threads = self.threads;
        }
        if self.quiet {
            settings.quiet = true;
        }
        if self.output.is_some() {
            settings.output = self.output;
        }
        if self.json.is_some() {
            settings.json_output = self.json;
        }
        let threading = if self.no_thread {
            ThreadingMode::Sequential
        } else {
            ThreadingMode::Parallel
        };

        CliConfig {
            root: self.directory,
            threading,
            quiet: settings.quiet,
            progress_bar: self.progress_bar,
            output: settings.output.clone(),
            json: settings.json_output.clone(),
            settings,
        }
    }
}
