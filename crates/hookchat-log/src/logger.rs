use crate::error::{LogError, LogResult};
use crate::fs::LogFile;
use crate::{LogRecord, LoggerConfig, Severity};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

/// Cloneable logging handle. Clones share one file writer, so rotation and
/// append are serialized across every clone.
#[derive(Clone, Debug)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

#[derive(Debug)]
struct LoggerInner {
    config: LoggerConfig,
    file: Mutex<LogFile>,
}

impl Logger {
    pub fn new(config: LoggerConfig) -> Self {
        let file = LogFile::new(config.log_directory.clone(), config.file_prefix.clone());
        Self {
            inner: Arc::new(LoggerInner {
                config,
                file: Mutex::new(file),
            }),
        }
    }

    /// A logger that drops every record.
    pub fn disabled() -> Self {
        Self::new(LoggerConfig {
            enabled: false,
            console_mirror: false,
            ..LoggerConfig::default()
        })
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.inner.config
    }

    pub fn is_enabled_for(&self, level: Severity) -> bool {
        self.inner.config.enabled && level >= self.inner.config.min_severity
    }

    pub fn record(&self, record: LogRecord) {
        if !self.is_enabled_for(record.level) {
            return;
        }
        if self.inner.config.console_mirror {
            mirror_to_console(&record);
        }
        if let Err(error) = self.write(&record) {
            tracing::error!(target: "hookchat_log", %error, "log write failed");
        }
    }

    pub fn info(&self, source: impl Into<String>, message: impl Into<String>) {
        self.record(LogRecord::new(Severity::Info, source, message));
    }

    pub fn warning(&self, source: impl Into<String>, message: impl Into<String>) {
        self.record(LogRecord::new(Severity::Warning, source, message));
    }

    pub fn error(&self, source: impl Into<String>, message: impl Into<String>) {
        self.record(LogRecord::new(Severity::Error, source, message));
    }

    pub fn critical(&self, source: impl Into<String>, message: impl Into<String>) {
        self.record(LogRecord::new(Severity::Critical, source, message));
    }

    pub fn current_path(&self) -> PathBuf {
        self.lock_file().current_path()
    }

    /// Archived log files, oldest first. Listing failures yield an empty list.
    pub fn archive_paths(&self) -> Vec<PathBuf> {
        match self.lock_file().archives() {
            Ok(archives) => archives,
            Err(error) => {
                tracing::error!(target: "hookchat_log", %error, "listing log archives failed");
                Vec::new()
            }
        }
    }

    fn write(&self, record: &LogRecord) -> LogResult<()> {
        let mut block = serde_json::to_string(record)
            .map_err(|err| LogError::Serialization(err.to_string()))?;
        block.push_str("\n\n");

        let config = &self.inner.config;
        let file = self.lock_file();
        match file.rotate_if_needed(config.max_file_size_bytes) {
            Ok(Some(_)) => prune(&file, config.max_files),
            Ok(None) => {}
            Err(error) => tracing::error!(target: "hookchat_log", %error, "log rotation failed"),
        }
        file.append(&block)
    }

    fn lock_file(&self) -> std::sync::MutexGuard<'_, LogFile> {
        self.inner
            .file
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

// Retention failures never cost the entry being written.
fn prune(file: &LogFile, max_files: usize) {
    match file.prune_archives(max_files) {
        Ok(removed) => {
            for path in removed {
                tracing::debug!(
                    target: "hookchat_log",
                    path = %path.display(),
                    "removed expired log archive"
                );
            }
        }
        Err(error) => tracing::error!(target: "hookchat_log", %error, "log retention failed"),
    }
}

fn mirror_to_console(record: &LogRecord) {
    let line = record.summary();
    match record.level {
        Severity::Info => tracing::info!(target: "hookchat", "{line}"),
        Severity::Warning => tracing::warn!(target: "hookchat", "{line}"),
        Severity::Error | Severity::Critical => tracing::error!(target: "hookchat", "{line}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::subscriber::with_default;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::{Layer, Registry};

    #[derive(Clone, Default)]
    struct CapturedEvents(Arc<Mutex<Vec<(tracing::Level, String)>>>);

    impl CapturedEvents {
        fn take(&self) -> Vec<(tracing::Level, String)> {
            std::mem::take(&mut *self.0.lock().expect("capture mutex should lock"))
        }
    }

    impl<S: tracing::Subscriber> Layer<S> for CapturedEvents {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let metadata = event.metadata();
            self.0
                .lock()
                .expect("capture mutex should lock")
                .push((*metadata.level(), metadata.target().to_string()));
        }
    }

    fn config_in(dir: &std::path::Path) -> LoggerConfig {
        LoggerConfig {
            log_directory: dir.to_path_buf(),
            file_prefix: "unit".to_string(),
            console_mirror: false,
            ..LoggerConfig::default()
        }
    }

    #[test]
    fn record_below_min_severity_expected_no_file_created() {
        let tmp = tempfile::tempdir().expect("tempdir should be created");
        let logger = Logger::new(LoggerConfig {
            min_severity: Severity::Warning,
            ..config_in(tmp.path())
        });

        logger.info("test", "dropped");
        assert!(!logger.current_path().exists());

        logger.warning("test", "kept");
        let contents =
            std::fs::read_to_string(logger.current_path()).expect("log file should exist");
        assert!(contents.contains("kept"));
        assert!(!contents.contains("dropped"));
    }

    #[test]
    fn record_entries_expected_blank_line_separated_json() {
        let tmp = tempfile::tempdir().expect("tempdir should be created");
        let logger = Logger::new(config_in(tmp.path()));

        logger.info("test", "first");
        logger.error("test", "second");

        let contents =
            std::fs::read_to_string(logger.current_path()).expect("log file should exist");
        let blocks: Vec<&str> = contents
            .split("\n\n")
            .filter(|block| !block.trim().is_empty())
            .collect();
        assert_eq!(blocks.len(), 2);
        let second: LogRecord = serde_json::from_str(blocks[1]).expect("block should parse");
        assert_eq!(second.level, Severity::Error);
        assert_eq!(second.message, "second");
    }

    #[test]
    fn disabled_logger_expected_no_output() {
        let tmp = tempfile::tempdir().expect("tempdir should be created");
        let logger = Logger::new(LoggerConfig {
            enabled: false,
            ..config_in(tmp.path())
        });

        logger.critical("test", "ignored");
        assert!(!logger.current_path().exists());
    }

    #[test]
    fn unwritable_directory_expected_swallowed_failure() {
        let tmp = tempfile::tempdir().expect("tempdir should be created");
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, "file").expect("write should succeed");
        let logger = Logger::new(config_in(&blocker));

        logger.error("test", "cannot be written");
        assert!(logger.archive_paths().is_empty());
    }

    #[test]
    fn console_mirror_maps_severity_to_tracing_level() {
        let tmp = tempfile::tempdir().expect("tempdir should be created");
        let logger = Logger::new(LoggerConfig {
            console_mirror: true,
            ..config_in(tmp.path())
        });
        let captured = CapturedEvents::default();
        let subscriber = Registry::default().with(captured.clone());

        with_default(subscriber, || {
            logger.info("test", "i");
            logger.warning("test", "w");
            logger.error("test", "e");
            logger.critical("test", "c");
        });

        let levels: Vec<tracing::Level> = captured
            .take()
            .into_iter()
            .filter(|(_, target)| target == "hookchat")
            .map(|(level, _)| level)
            .collect();
        assert_eq!(
            levels,
            vec![
                tracing::Level::INFO,
                tracing::Level::WARN,
                tracing::Level::ERROR,
                tracing::Level::ERROR,
            ]
        );
    }

    #[test]
    fn write_failure_expected_error_event_and_no_mirror_when_disabled() {
        let tmp = tempfile::tempdir().expect("tempdir should be created");
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, "file").expect("write should succeed");
        let logger = Logger::new(config_in(&blocker));
        let captured = CapturedEvents::default();
        let subscriber = Registry::default().with(captured.clone());

        with_default(subscriber, || logger.info("test", "cannot be written"));

        let events = captured.take();
        assert!(
            events
                .iter()
                .any(|(level, target)| *level == tracing::Level::ERROR && target == "hookchat_log"),
            "events: {events:?}"
        );
        assert!(events.iter().all(|(_, target)| target != "hookchat"));
    }
}
