// Engine metrics
//
// Lightweight counters for what the engine did during a session

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Session counters
///
/// Uses atomic operations for thread-safe tracking without locks. The engine
/// owns one instance and logs a summary on shutdown.
#[derive(Debug)]
pub struct Metrics {
    /// Managed files read and parsed
    pub files_read: AtomicUsize,

    /// Managed files serialized and written
    pub files_written: AtomicUsize,

    /// Managed files that could not be read or parsed
    pub file_errors: AtomicUsize,

    /// Options resolved to parameters
    pub options_extracted: AtomicUsize,

    /// Options that failed to resolve
    pub options_failed: AtomicUsize,

    /// Validator runs
    pub validation_runs: AtomicU64,

    pub backups_created: AtomicUsize,

    pub files_restored: AtomicUsize,

    /// Total time spent extracting, in milliseconds
    pub total_extraction_time_ms: AtomicU64,

    pub extraction_runs: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            files_read: AtomicUsize::new(0),
            files_written: AtomicUsize::new(0),
            file_errors: AtomicUsize::new(0),
            options_extracted: AtomicUsize::new(0),
            options_failed: AtomicUsize::new(0),
            validation_runs: AtomicU64::new(0),
            backups_created: AtomicUsize::new(0),
            files_restored: AtomicUsize::new(0),
            total_extraction_time_ms: AtomicU64::new(0),
            extraction_runs: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_files_read(&self, ok: usize, failed: usize) {
        self.files_read.fetch_add(ok, Ordering::Relaxed);
        self.file_errors.fetch_add(failed, Ordering::Relaxed);
    }

    pub fn record_file_written(&self) {
        self.files_written.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one extraction pass
    pub fn record_extraction(&self, extracted: usize, failed: usize, duration: Duration) {
        self.options_extracted.fetch_add(extracted, Ordering::Relaxed);
        self.options_failed.fetch_add(failed, Ordering::Relaxed);
        self.total_extraction_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
        self.extraction_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_validation(&self) {
        self.validation_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backup(&self) {
        self.backups_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_restored(&self, files: usize) {
        self.files_restored.fetch_add(files, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average time per extraction pass in milliseconds
    pub fn avg_extraction_time_ms(&self) -> f64 {
        let total = self.total_extraction_time_ms.load(Ordering::Relaxed);
        let count = self.extraction_runs.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    pub fn log_summary(&self) {
        tracing::info!("=== Engine Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Files: {} read, {} written, {} failed",
            self.files_read.load(Ordering::Relaxed),
            self.files_written.load(Ordering::Relaxed),
            self.file_errors.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Options: {} extracted, {} failed ({} runs, avg {:.2}ms)",
            self.options_extracted.load(Ordering::Relaxed),
            self.options_failed.load(Ordering::Relaxed),
            self.extraction_runs.load(Ordering::Relaxed),
            self.avg_extraction_time_ms()
        );
        tracing::info!(
            "Validation runs: {}, backups: {}, files restored: {}",
            self.validation_runs.load(Ordering::Relaxed),
            self.backups_created.load(Ordering::Relaxed),
            self.files_restored.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new();
        assert_eq!(metrics.files_read.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.options_failed.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_record_extraction() {
        let metrics = Metrics::new();

        metrics.record_extraction(5, 1, Duration::from_millis(100));
        metrics.record_extraction(3, 0, Duration::from_millis(200));

        assert_eq!(metrics.options_extracted.load(Ordering::Relaxed), 8);
        assert_eq!(metrics.options_failed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.avg_extraction_time_ms(), 150.0);
    }

    #[test]
    fn test_avg_extraction_time_without_runs() {
        assert_eq!(Metrics::new().avg_extraction_time_ms(), 0.0);
    }

    #[test]
    fn test_file_and_backup_counters() {
        let metrics = Metrics::new();

        metrics.record_files_read(2, 1);
        metrics.record_file_written();
        metrics.record_backup();
        metrics.record_restored(3);
        metrics.record_validation();

        assert_eq!(metrics.files_read.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.file_errors.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.files_written.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.backups_created.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.files_restored.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.validation_runs.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_uptime() {
        let metrics = Metrics::new();
        thread::sleep(Duration::from_millis(10));
        assert!(metrics.uptime().as_millis() >= 10);
    }
}
