use crate::verdict::{ScanTarget, Verdict};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

/// Completion emits a status line this often when running quietly.
pub const DEFAULT_PROGRESS_INTERVAL: usize = 50;

/// Running counters at the moment an event is emitted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    pub processed: usize,
    pub corrupt: usize,
    pub total: usize,
}

impl Tally {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.processed as f64 / self.total as f64 * 100.0
    }
}

/// Receives scan lifecycle events. Called concurrently from worker threads.
pub trait ScanObserver: Send + Sync {
    fn on_start(&self, _total: usize) {}
    fn on_file_started(&self, _target: &ScanTarget) {}
    fn on_file_finished(&self, _target: &ScanTarget, _verdict: &Verdict, _tally: Tally) {}
    fn on_finish(&self, _tally: Tally) {}
}

/// Observer that ignores every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct Silent;

impl ScanObserver for Silent {}

/// Line-oriented progress output.
///
/// Verbose mode prints every file as it is picked up. Quiet mode prints a
/// status line every `interval` completions.
pub struct ConsolePrinter<W: Write + Send = io::Stdout> {
    out: Mutex<W>,
    verbose: bool,
    interval: usize,
}

impl ConsolePrinter<io::Stdout> {
    pub fn stdout(verbose: bool, interval: usize) -> Self {
        Self::new(io::stdout(), verbose, interval)
    }
}

impl<W: Write + Send> ConsolePrinter<W> {
    pub fn new(out: W, verbose: bool, interval: usize) -> Self {
        Self {
            out: Mutex::new(out),
            verbose,
            interval: interval.max(1),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn line(&self, text: &str) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        // Best effort: a closed stdout is not a scan failure.
        let _ = writeln!(out, "{}", text);
    }
}

impl<W: Write + Send> ScanObserver for ConsolePrinter<W> {
    fn on_file_started(&self, target: &ScanTarget) {
        if self.verbose {
            self.line(&format!("Analyzing: {}", target.path.display()));
        }
    }

    fn on_file_finished(&self, _target: &ScanTarget, _verdict: &Verdict, tally: Tally) {
        if !self.verbose && tally.processed % self.interval == 0 {
            self.line(&format!(
                "Progress: {}/{} ({:.1}%)",
                tally.processed,
                tally.total,
                tally.percent()
            ));
        }
    }
}

pub fn default_style() -> ProgressStyle {
    match ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
    {
        Ok(style) => style.progress_chars("##-"),
        Err(_) => ProgressStyle::default_bar(),
    }
}

/// Drives an `indicatif` bar from scan events.
pub struct BarObserver {
    bar: ProgressBar,
}

impl BarObserver {
    pub fn new(bar: ProgressBar) -> Self {
        bar.set_style(default_style());
        Self { bar }
    }

    pub fn bar(&self) -> &ProgressBar {
        &self.bar
    }
}

impl ScanObserver for BarObserver {
    fn on_start(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn on_file_finished(&self, target: &ScanTarget, verdict: &Verdict, _tally: Tally) {
        self.bar.inc(1);
        if verdict.is_corrupt() {
            self.bar
                .set_message(format!("Corrupt: {}", target.path.display()));
        }
    }

    fn on_finish(&self, tally: Tally) {
        self.bar
            .finish_with_message(format!("Scan complete ({} corrupt)", tally.corrupt));
    }
}
