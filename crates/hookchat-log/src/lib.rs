//! Size-rotated, severity-filtered structured log files with a console mirror.
//!
//! Records are appended as one JSON document per entry, separated by a blank
//! line. Before each write the current file is rotated to a timestamped
//! archive once it grows past the configured threshold, and archives beyond
//! the retention limit are removed oldest first. Every I/O failure is
//! reported through `tracing` and never surfaces to the caller.

pub mod config;
pub mod error;
pub mod fs;
pub mod logger;
pub mod types;

pub use config::LoggerConfig;
pub use error::{LogError, LogResult};
pub use logger::Logger;
pub use types::{CorrelationContext, LogRecord, ParseSeverityError, Severity};
