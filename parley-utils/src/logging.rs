//! Logging setup for parley
//!
//! The chat owns stdout, so the client always logs to a file in the state
//! directory. Verbose mode mirrors the same events to stderr at debug level.

use std::path::{Path, PathBuf};

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{paths, ParleyError, Result};

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "PARLEY_LOG";

/// Log file name inside the log directory
pub const LOG_FILE: &str = "parley.log";

/// Where log lines go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    /// Only the log file
    File,
    /// The log file and stderr
    FileAndStderr,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub output: LogOutput,
    /// `EnvFilter` directives, e.g. `warn` or `parley_client=debug`
    pub filter: String,
    /// Tag each line with its source file and line
    pub file_line: bool,
    /// Log file, created with its directory if missing
    pub path: PathBuf,
}

impl LogConfig {
    /// Quiet file logging for the interactive client
    pub fn client() -> Self {
        Self {
            output: LogOutput::File,
            filter: filter_from_env("warn"),
            file_line: false,
            path: paths::log_dir().join(LOG_FILE),
        }
    }

    /// Debug logging to the file and stderr, for `--verbose`
    pub fn verbose() -> Self {
        Self {
            output: LogOutput::FileAndStderr,
            filter: filter_from_env("debug"),
            file_line: true,
            ..Self::client()
        }
    }
}

fn filter_from_env(default: &str) -> String {
    std::env::var(LOG_ENV).unwrap_or_else(|_| default.into())
}

/// Install the global subscriber described by `config`
///
/// Fails if the filter does not parse, the log file cannot be opened, or a
/// subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| ParleyError::config(format!("Invalid log filter: {}", e)))?;
    let file = open_log_file(&config.path)?;

    // thread names tell the listener apart from the foreground caller
    let file_layer = fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_thread_names(true)
        .with_file(config.file_line)
        .with_line_number(config.file_line);
    let stderr_layer = (config.output == LogOutput::FileAndStderr).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_thread_names(true)
            .with_file(config.file_line)
            .with_line_number(config.file_line)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| ParleyError::internal(format!("Failed to init logging: {}", e)))?;

    tracing::debug!(filter = %config.filter, path = %config.path.display(), "logging initialized");
    Ok(())
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    if let Some(dir) = path.parent() {
        paths::ensure_dir(dir).map_err(|source| ParleyError::FileWrite {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| ParleyError::FileWrite {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_client_and_verbose_configs() {
        let original = env::var(LOG_ENV).ok();

        env::remove_var(LOG_ENV);
        let client = LogConfig::client();
        assert_eq!(client.output, LogOutput::File);
        assert_eq!(client.filter, "warn");
        assert!(!client.file_line);
        assert!(client.path.ends_with(LOG_FILE));

        let verbose = LogConfig::verbose();
        assert_eq!(verbose.output, LogOutput::FileAndStderr);
        assert_eq!(verbose.filter, "debug");
        assert!(verbose.file_line);
        assert_eq!(verbose.path, client.path);

        env::set_var(LOG_ENV, "parley_client=trace");
        assert_eq!(LogConfig::client().filter, "parley_client=trace");
        assert_eq!(LogConfig::verbose().filter, "parley_client=trace");

        match original {
            Some(val) => env::set_var(LOG_ENV, val),
            None => env::remove_var(LOG_ENV),
        }
    }

    #[test]
    fn test_invalid_filter_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            output: LogOutput::File,
            filter: "parley=verbose".into(),
            file_line: false,
            path: dir.path().join(LOG_FILE),
        };
        let err = init_logging(&config).unwrap_err();
        assert!(matches!(err, ParleyError::Config(_)));
    }

    #[test]
    fn test_open_log_file_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(LOG_FILE);

        open_log_file(&path).unwrap();
        assert!(path.exists());
    }
}
