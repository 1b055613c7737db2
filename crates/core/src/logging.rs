//! Logging bootstrap built on the tracing ecosystem.
//!
//! Library code only emits `tracing` events; hosts call [init_logging] once
//! at start-up to install a subscriber.
//!
//! # Environment Variables
//!
//! - `SKILLHOST_LOG`: Filter directive (like `RUST_LOG`), e.g., `skillhost_tools=debug`
//! - `SKILLHOST_LOG_FORMAT`: Output format for stderr: `pretty`, `json`, `compact`
//! - `SKILLHOST_LOG_DIR`: Directory for rotated JSON log files when file logging is on
//!
//! # Example
//!
//! ```no_run
//! use skillhost_core::logging::{self, LogFormat, LoggingConfig};
//!
//! let _guard = logging::init_logging(Some(LoggingConfig::new().with_format(LogFormat::Json)))?;
//! # Ok::<(), skillhost_core::Error>(())
//! ```

use crate::Error;
use std::env;
use std::io;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Log output format for stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Pretty, human-readable output with colors (default for TTY)
    #[default]
    Pretty,
    /// JSON output (one line per event)
    Json,
    /// Compact, single-line output
    Compact,
}

impl LogFormat {
    pub const VALUES: &[LogFormat] = &[LogFormat::Pretty, LogFormat::Json, LogFormat::Compact];

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pretty" => Some(LogFormat::Pretty),
            "json" => Some(LogFormat::Json),
            "compact" => Some(LogFormat::Compact),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
            LogFormat::Compact => "compact",
        }
    }
}

/// Rotated file output settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLoggingConfig {
    /// Directory for log files; `SKILLHOST_LOG_DIR` or `~/.skillhost/logs` when unset
    pub directory: Option<PathBuf>,
    /// File name prefix for the daily rotation
    pub file_name: String,
}

impl Default for FileLoggingConfig {
    fn default() -> Self {
        Self { directory: None, file_name: "skillhost.log".to_string() }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default filter directive when no environment override is set.
    pub level: String,
    /// Explicit stderr format; detected from the terminal when `None`.
    pub format: Option<LogFormat>,
    /// File logging configuration (optional).
    pub file: Option<FileLoggingConfig>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "warn".to_string(), format: None, file: None }
    }
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_file_logging(mut self, config: FileLoggingConfig) -> Self {
        self.file = Some(config);
        self
    }

    /// Build an EnvFilter from this config and environment variables.
    fn build_env_filter(&self) -> EnvFilter {
        let filter = env::var("SKILLHOST_LOG")
            .ok()
            .or_else(|| env::var("RUST_LOG").ok())
            .unwrap_or_else(|| self.level.clone());

        EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new(&self.level))
    }

    /// Determine the appropriate format for stderr output.
    fn detect_format(&self) -> LogFormat {
        if let Ok(fmt_str) = env::var("SKILLHOST_LOG_FORMAT")
            && let Some(fmt) = LogFormat::parse_str(&fmt_str)
        {
            return fmt;
        }
        if let Some(format) = self.format {
            return format;
        }

        if atty::is(atty::Stream::Stderr) { LogFormat::Pretty } else { LogFormat::Compact }
    }

    fn log_dir(file: &FileLoggingConfig) -> Result<PathBuf, Error> {
        if let Ok(custom_dir) = env::var("SKILLHOST_LOG_DIR") {
            return Ok(PathBuf::from(custom_dir));
        }
        if let Some(dir) = &file.directory {
            return Ok(dir.clone());
        }

        dirs::home_dir()
            .map(|home| home.join(".skillhost").join("logs"))
            .ok_or_else(|| Error::Io(io::Error::new(io::ErrorKind::NotFound, "could not determine home directory")))
    }
}

/// Initialize the global tracing subscriber.
///
/// Returns the file writer's guard when file logging is enabled; the host must
/// keep it alive for buffered lines to be flushed.
pub fn init_logging(config: Option<LoggingConfig>) -> Result<Option<WorkerGuard>, Error> {
    let config = config.unwrap_or_default();
    let env_filter = config.build_env_filter();
    let format = config.detect_format();

    let registry = Registry::default().with(env_filter);

    if let Some(file_config) = &config.file {
        let log_dir = LoggingConfig::log_dir(file_config)?;
        std::fs::create_dir_all(&log_dir)?;

        let file_appender = tracing_appender::rolling::daily(log_dir, &file_config.file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        match format {
            LogFormat::Pretty => {
                registry
                    .with(fmt::layer().pretty().with_writer(io::stderr).with_ansi(true))
                    .with(fmt::layer().json().with_writer(non_blocking))
                    .init();
            }
            LogFormat::Json => {
                registry
                    .with(fmt::layer().json().with_writer(io::stderr))
                    .with(fmt::layer().json().with_writer(non_blocking))
                    .init();
            }
            LogFormat::Compact => {
                registry
                    .with(fmt::layer().compact().with_writer(io::stderr))
                    .with(fmt::layer().json().with_writer(non_blocking))
                    .init();
            }
        }
        return Ok(Some(guard));
    }

    match format {
        LogFormat::Pretty => {
            registry
                .with(fmt::layer().pretty().with_writer(io::stderr).with_ansi(true))
                .init();
        }
        LogFormat::Json => {
            registry.with(fmt::layer().json().with_writer(io::stderr)).init();
        }
        LogFormat::Compact => {
            registry.with(fmt::layer().compact().with_writer(io::stderr)).init();
        }
    }

    Ok(None)
}

/// Render a path for logging, abbreviating the home directory to `~`.
pub fn sanitize_path(path: &Path) -> String {
    if let Some(home) = dirs::home_dir()
        && let Ok(stripped) = path.strip_prefix(&home)
    {
        return format!("~/{}", stripped.display());
    }

    path.display().to_string()
}
