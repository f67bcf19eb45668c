//! Logging setup and the per-cycle reports of the capture loop.
//!
//! `Reporter::init` installs the `env_logger` backend and a panic hook once,
//! at startup. The scheduler gets a `Reporter` handed in and reports every
//! outcome through it, so the counts are available to whoever holds a clone.
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use env_logger::{Env, Target};
use log::*;

use crate::config::ConfigError;
use crate::drivers::DeviceError;
use crate::model::DeviceState;
use crate::remote::UploadOutcome;
use crate::store::{CaptureRecord, RetentionReport, StoreError};

/// Running totals since startup
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub cycles: u64,
    pub polls_unreachable: u64,
    pub state_changes: u64,
    pub capture_failures: u64,
    pub save_failures: u64,
    pub uploads: u64,
    pub uploads_unreachable: u64,
    pub uploads_rejected: u64,
    pub cleanups: u64,
    pub cleanup_failures: u64,
}

#[derive(Debug, Clone)]
pub struct Reporter {
    name: String,
    stats: Arc<Mutex<Stats>>,
}

impl Reporter {
    /// A reporter that logs through whatever logger is already installed
    pub fn new(name: &str) -> Self {
        Reporter {
            name: String::from(name),
            stats: Arc::new(Mutex::new(Stats::default())),
        }
    }

    /// Installs the process logger and the panic hook.
    ///
    /// `RUST_LOG` picks the level (debug for this crate by default). Lines go
    /// to stderr, or are appended to `log_file` when one is given
    /// (see `config::log_destination`).
    pub fn init(name: &str, log_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("prusacam=debug"));

        let printer = String::from(name);
        builder.format(move |buf, record| {
            writeln!(
                buf,
                "{} - {} - {} - {}",
                buf.timestamp_seconds(),
                printer,
                record.level(),
                record.args()
            )
        });

        if let Some(path) = log_file {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| ConfigError::Logging(format!("{}: {e}", path.display())))?;
            builder.target(Target::Pipe(Box::new(file)));
        }

        builder
            .try_init()
            .map_err(|e| ConfigError::Logging(e.to_string()))?;

        let reporter = Self::new(name);
        reporter.install_panic_hook();
        Ok(reporter)
    }

    /// Panics get logged as critical before the default hook prints them
    fn install_panic_hook(&self) {
        let name = self.name.clone();
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            error!("CRITICAL [{name}] Unhandled panic: {info}");
            previous(info);
        }));
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stats(&self) -> Stats {
        *self.lock()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Stats> {
        // A panic elsewhere can't leave the counters half-updated
        self.stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn started(&self) {
        info!("Starting prusacam v{} for {}", env!("CARGO_PKG_VERSION"), self.name);
    }

    pub fn cycle_finished(&self) {
        self.lock().cycles += 1;
    }

    pub fn poll_unreachable(&self, url: &str, kept: &DeviceState) {
        self.lock().polls_unreachable += 1;
        warn!("Printer status unreachable ({url}), keeping state {kept}");
    }

    pub fn state_changed(&self, from: &DeviceState, to: &DeviceState) {
        self.lock().state_changes += 1;
        info!("Printer state changed: {from} -> {to}");
    }

    pub fn capture_failed(&self, camera: &str, e: &DeviceError) {
        self.lock().capture_failures += 1;
        warn!("Unable to capture from {camera}, skipping this upload: {e}");
    }

    pub fn save_failed(&self, e: &StoreError) {
        self.lock().save_failures += 1;
        error!("Couldn't save captured image, skipping this upload: {e}");
    }

    pub fn upload(&self, record: &CaptureRecord, outcome: &UploadOutcome) {
        let mut stats = self.lock();
        match outcome {
            UploadOutcome::Success => {
                stats.uploads += 1;
                debug!("{} uploaded successfully", record.file_name());
            }
            UploadOutcome::Unreachable => {
                stats.uploads_unreachable += 1;
                warn!("Put Image: no response from the server, {} was not uploaded", record.file_name());
            }
            UploadOutcome::Rejected { code, body } => {
                stats.uploads_rejected += 1;
                error!("Put Image: Response Code {code}. Content: {body}");
            }
        }
    }

    pub fn cleanup(&self, result: &Result<RetentionReport, StoreError>) {
        let mut stats = self.lock();
        stats.cleanups += 1;
        match result {
            Ok(report) if report.deleted > 0 => {
                debug!("Deleted {} image(s), {} kept", report.deleted, report.kept)
            }
            Ok(report) => trace!("Nothing to delete, {} kept", report.kept),
            Err(e) => {
                stats.cleanup_failures += 1;
                error!("Image cleanup failed: {e}");
            }
        }
    }

    /// Ctrl-C is a normal way to stop, not an error
    pub fn interrupted(&self) {
        info!("Interrupted, shutting down {}", self.name);
    }

    /// Last words before the process exits with an error
    pub fn critical(&self, e: &dyn std::error::Error) {
        error!("CRITICAL [{}] {e}", self.name);
        let mut source = e.source();
        while let Some(cause) = source {
            error!("  caused by: {cause}");
            source = cause.source();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_are_shared_between_clones() {
        let reporter = Reporter::new("mk4");
        let clone = reporter.clone();

        clone.capture_failed("cam", &DeviceError::NoFrame(String::from("cam")));
        clone.poll_unreachable("http://x/api/v1/status", &DeviceState::default());
        clone.cycle_finished();

        let stats = reporter.stats();
        assert_eq!(stats.capture_failures, 1);
        assert_eq!(stats.polls_unreachable, 1);
        assert_eq!(stats.cycles, 1);
        assert_eq!(reporter.name(), "mk4");
    }

    #[test]
    fn test_cleanup_failures_are_counted() {
        let reporter = Reporter::new("mk4");
        reporter.cleanup(&Ok(RetentionReport { kept: 3, deleted: 2, skipped: 0 }));
        reporter.cleanup(&Err(StoreError::NotADirectory("x".into())));

        let stats = reporter.stats();
        assert_eq!(stats.cleanups, 2);
        assert_eq!(stats.cleanup_failures, 1);
    }
}
