use crate::codec::{ImageCodec, ImageCrateCodec};
use crate::collector::{collect_targets, default_extensions, Collection, CollectionError};
use crate::progress::{ScanObserver, Tally, DEFAULT_PROGRESS_INTERVAL};
use crate::render::{DEFAULT_PIXEL_SAMPLES, DEFAULT_SEED};
use crate::sniffer::DEFAULT_MIN_FILE_SIZE;
use crate::structural::{DEFAULT_MAX_DIMENSION, DEFAULT_THUMBNAIL_SIZE};
use crate::validator::Validator;
use crate::verdict::{FileResult, ScanTarget, Verdict};
use rayon::ThreadPoolBuilder;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadingMode {
    Parallel,
    Sequential,
}

/// Shared flag that stops a scan from starting new files.
///
/// Files already being validated run to completion; files not yet started
/// are recorded as skipped.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Parameters that control how the scanning pipeline behaves.
#[derive(Clone, Debug)]
pub struct ScanConfig {
    pub extensions: Vec<String>,
    pub threading: ThreadingMode,
    /// Worker count; `None` uses the available hardware parallelism.
    pub threads: Option<usize>,
    pub min_file_size: u64,
    pub max_dimension: u32,
    pub thumbnail_size: u32,
    pub pixel_samples: u32,
    pub seed: u64,
    pub progress_interval: usize,
    pub cancel: CancelToken,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new(default_extensions(), ThreadingMode::Parallel)
    }
}

impl ScanConfig {
    pub fn new(extensions: Vec<String>, threading: ThreadingMode) -> Self {
        Self {
            extensions,
            threading,
            threads: None,
            min_file_size: DEFAULT_MIN_FILE_SIZE,
            max_dimension: DEFAULT_MAX_DIMENSION,
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
            pixel_samples: DEFAULT_PIXEL_SAMPLES,
            seed: DEFAULT_SEED,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            cancel: CancelToken::default(),
        }
    }

    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads.filter(|&count| count > 0);
        self
    }

    pub fn with_min_file_size(mut self, bytes: u64) -> Self {
        self.min_file_size = bytes;
        self
    }

    pub fn with_max_dimension(mut self, pixels: u32) -> Self {
        self.max_dimension = pixels;
        self
    }

    pub fn with_thumbnail_size(mut self, pixels: u32) -> Self {
        self.thumbnail_size = pixels;
        self
    }

    pub fn with_pixel_samples(mut self, samples: u32) -> Self {
        self.pixel_samples = samples;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval.max(1);
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }
}

/// Everything a finished scan produced, before report formatting.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub root: PathBuf,
    pub total: usize,
    /// One entry per discovered target, in discovery order.
    pub results: Vec<FileResult>,
    pub elapsed: Duration,
    pub unreadable: usize,
}

impl ScanOutcome {
    pub fn corrupt_count(&self) -> usize {
        self.results.iter().filter(|r| r.verdict.is_corrupt()).count()
    }
}

/// Scans `root` with the default `image`-crate codec.
pub fn scan(
    root: &Path,
    config: &ScanConfig,
    observer: &dyn ScanObserver,
) -> Result<ScanOutcome, CollectionError> {
    scan_with_codec(root, config, ImageCrateCodec, observer)
}

pub fn scan_with_codec<C: ImageCodec>(
    root: &Path,
    config: &ScanConfig,
    codec: C,
    observer: &dyn ScanObserver,
) -> Result<ScanOutcome, CollectionError> {
    let started = Instant::now();
    let collection = collect_targets(root, &config.extensions)?;
    let validator = Validator::from_config(codec, config);
    Ok(scan_collection(collection, &validator, config, observer, started))
}

/// Validates every target of an existing collection.
pub fn scan_collection<C: ImageCodec>(
    collection: Collection,
    validator: &Validator<C>,
    config: &ScanConfig,
    observer: &dyn ScanObserver,
    started: Instant,
) -> ScanOutcome {
    let Collection {
        root,
        targets,
        unreadable,
    } = collection;
    let total = targets.len();
    info!(root = %root.display(), total, "scan started");
    observer.on_start(total);

    let coordinator = Coordinator {
        validator,
        observer,
        cancel: &config.cancel,
        total,
        processed: AtomicUsize::new(0),
        corrupt: AtomicUsize::new(0),
        results: Mutex::new(Vec::with_capacity(total)),
    };

    match config.threading {
        ThreadingMode::Parallel => coordinator.run_parallel(targets, config.threads),
        ThreadingMode::Sequential => coordinator.run_sequential(targets),
    }

    let tally = coordinator.tally();
    let mut results = coordinator
        .results
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner);
    results.sort_by_key(|result| result.target.index);
    observer.on_finish(tally);

    let elapsed = started.elapsed();
    info!(
        processed = tally.processed,
        corrupt = tally.corrupt,
        elapsed_ms = elapsed.as_millis() as u64,
        "scan finished"
    );

    ScanOutcome {
        root,
        total,
        results,
        elapsed,
        unreadable,
    }
}

struct Coordinator<'a, C> {
    validator: &'a Validator<C>,
    observer: &'a dyn ScanObserver,
    cancel: &'a CancelToken,
    total: usize,
    processed: AtomicUsize,
    corrupt: AtomicUsize,
    results: Mutex<Vec<FileResult>>,
}

impl<C: ImageCodec> Coordinator<'_, C> {
    fn run_parallel(&self, targets: Vec<ScanTarget>, threads: Option<usize>) {
        let mut builder =
            ThreadPoolBuilder::new().thread_name(|index| format!("pixguard-worker-{}", index));
        if let Some(threads) = threads {
            builder = builder.num_threads(threads);
        }
        let pool = match builder.build() {
            Ok(pool) => pool,
            Err(error) => {
                warn!("worker pool unavailable, scanning sequentially: {}", error);
                return self.run_sequential(targets);
            }
        };
        debug!(workers = pool.current_num_threads(), "worker pool ready");

        pool.scope(|scope| {
            for target in targets {
                scope.spawn(move |_| self.process(target));
            }
        });
    }

    fn run_sequential(&self, targets: Vec<ScanTarget>) {
        for target in targets {
            self.process(target);
        }
    }

    fn process(&self, target: ScanTarget) {
        let verdict = if self.cancel.is_cancelled() {
            Verdict::skipped("scan cancelled")
        } else {
            self.observer.on_file_started(&target);
            self.validator.validate(&target)
        };

        let processed = self.processed.fetch_add(1, Ordering::SeqCst) + 1;
        let corrupt = if verdict.is_corrupt() {
            self.corrupt.fetch_add(1, Ordering::SeqCst) + 1
        } else {
            self.corrupt.load(Ordering::SeqCst)
        };
        debug!(path = %target.path.display(), %verdict, "file checked");

        self.observer.on_file_finished(
            &target,
            &verdict,
            Tally {
                processed,
                corrupt,
                total: self.total,
            },
        );
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(FileResult { target, verdict });
    }

    fn tally(&self) -> Tally {
        Tally {
            processed: self.processed.load(Ordering::SeqCst),
            corrupt: self.corrupt.load(Ordering::SeqCst),
            total: self.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::Silent;
    use image::{Rgba, RgbaImage};
    use std::fs;
    use tempfile::tempdir;

    fn write_image(path: &Path, seed: u32) {
        let mut state = seed | 1;
        RgbaImage::from_fn(16, 16, |_, _| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let [_, r, g, b] = state.to_le_bytes();
            Rgba([r, g, b, 255])
        })
        .save(path)
        .unwrap();
    }

    fn scan_mixed(mode: ThreadingMode) {
        let dir = tempdir().unwrap();
        write_image(&dir.path().join("a.png"), 1);
        write_image(&dir.path().join("b.png"), 2);
        fs::write(dir.path().join("c.png"), vec![0u8; 300]).unwrap();
        fs::write(dir.path().join("d.gif"), b"").unwrap();
        fs::write(dir.path().join("readme.txt"), b"not an image").unwrap();

        let config = ScanConfig::new(default_extensions(), mode).with_threads(Some(2));
        let outcome = scan(dir.path(), &config, &Silent).unwrap();
        assert_eq!(outcome.total, 4);
        assert_eq!(outcome.results.len(), 4);
        let verdicts: Vec<_> = outcome.results.iter().map(|r| r.verdict.clone()).collect();
        assert_eq!(
            verdicts,
            vec![
                Verdict::Intact,
                Verdict::Intact,
                Verdict::corrupt("invalid PNG header"),
                Verdict::corrupt("empty file"),
            ]
        );
        assert_eq!(outcome.corrupt_count(), 2);
    }

    #[test]
    fn scan_classifies_parallel() {
        scan_mixed(ThreadingMode::Parallel);
    }

    #[test]
    fn scan_classifies_sequential() {
        scan_mixed(ThreadingMode::Sequential);
    }

    #[test]
    fn cancelled_scan_skips_everything_pending() {
        let dir = tempdir().unwrap();
        for index in 0..5 {
            write_image(&dir.path().join(format!("{}.png", index)), index);
        }
        let token = CancelToken::new();
        token.cancel();
        let config = ScanConfig::default().with_cancel_token(token);
        let outcome = scan(dir.path(), &config, &Silent).unwrap();
        assert_eq!(outcome.results.len(), 5);
        assert!(outcome
            .results
            .iter()
            .all(|r| r.verdict == Verdict::skipped("scan cancelled")));
        assert_eq!(outcome.corrupt_count(), 0);
    }

    #[test]
    fn missing_root_aborts_before_scanning() {
        let dir = tempdir().unwrap();
        let result = scan(&dir.path().join("absent"), &ScanConfig::default(), &Silent);
        assert!(matches!(result, Err(CollectionError::RootMissing(_))));
    }

    #[test]
    fn zero_threads_means_automatic() {
        let config = ScanConfig::default().with_threads(Some(0));
        assert_eq!(config.threads, None);
    }
}
