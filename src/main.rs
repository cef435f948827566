mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, CliConfig};
use indicatif::ProgressBar;
use pixguard_core::{
    render_text, scan, write_json, write_report, BarObserver, ConsolePrinter, ScanObserver,
    ScanReport, ScanSettings, ThreadingMode,
};
use std::process;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => process::exit(code),
        Err(error) => {
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: Cli) -> Result<i32> {
    let settings = match cli.config.as_ref() {
        Some(path) => ScanSettings::load(path)?,
        None => ScanSettings::load_or_default()?,
    };
    let config = cli.merge(settings);
    let scan_config = config.settings.scan_config(config.threading);

    print_banner(&config, scan_config.threads);

    let observer: Box<dyn ScanObserver> = if config.progress_bar {
        Box::new(BarObserver::new(ProgressBar::new(0)))
    } else {
        Box::new(ConsolePrinter::stdout(
            !config.quiet,
            scan_config.progress_interval,
        ))
    };

    let outcome =
        scan(&config.root, &scan_config, observer.as_ref()).context("cannot start scan")?;
    if outcome.total == 0 {
        println!("No image files found.");
    }
    if outcome.unreadable > 0 {
        eprintln!(
            "Warning: {} entries could not be read and were skipped",
            outcome.unreadable
        );
    }

    let report = ScanReport::from_outcome(&outcome);
    info!(
        total = report.total_files,
        corrupt = report.corrupt.len(),
        skipped = report.skipped.len(),
        "scan complete"
    );
    let text = render_text(&report);
    print!("{}", text);

    // A failed save does not change the exit status.
    if let Some(path) = config.output.as_ref() {
        match write_report(&text, path) {
            Ok(()) => println!("Report saved: {}", path.display()),
            Err(error) => {
                eprintln!("Error saving report: {:#}", anyhow::Error::from(error));
            }
        }
    }
    if let Some(path) = config.json.as_ref() {
        match write_json(&report, path) {
            Ok(()) => println!("JSON report saved: {}", path.display()),
            Err(error) => {
                eprintln!("Error saving JSON report: {:#}", anyhow::Error::from(error));
            }
        }
    }

    Ok(report.exit_code())
}

fn print_banner(config: &CliConfig, threads: Option<usize>) {
    let root = std::fs::canonicalize(&config.root).unwrap_or_else(|_| config.root.clone());
    println!("Scanning: {}", root.display());
    println!(
        "Mode: {}",
        if config.quiet { "Quiet" } else { "Verbose" }
    );
    match (config.threading, threads) {
        (ThreadingMode::Sequential, _) => println!("Threads: 1 (sequential)"),
        (ThreadingMode::Parallel, Some(threads)) => println!("Threads: {}", threads),
        (ThreadingMode::Parallel, None) => println!("Threads: Auto"),
    }
    println!("{}", "=".repeat(60));
}
