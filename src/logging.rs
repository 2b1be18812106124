//! Logging setup for applications embedding chatline.
//!
//! The library only emits `tracing` events. This module is for binaries:
//! it installs a subscriber that writes to a daily rolling file and,
//! optionally, to stderr. `RUST_LOG` overrides the configured level.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// Directory under the platform data dir that holds log files.
const LOG_SUBDIR: &str = "chatline";

/// Logging configuration.
///
/// # Example
///
/// ```rust
/// use chatline::logging::{LogLevel, LoggingConfig};
///
/// let config = LoggingConfig::new()
///     .with_level(LogLevel::Debug)
///     .with_console(true);
/// assert!(config.enabled);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Whether file logging is enabled.
    pub enabled: bool,
    /// Base name of the log file (`{app_name}.log`, rotated daily).
    pub app_name: String,
    /// Custom log directory. Defaults to the platform data dir + `chatline/logs`.
    pub log_dir: Option<PathBuf>,
    /// Level filter when `RUST_LOG` is unset.
    pub level: LogLevel,
    /// Also write human-readable output to stderr.
    #[serde(default)]
    pub console: bool,
}

impl LoggingConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration with file logging turned off.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Sets the log file base name.
    #[must_use]
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Sets a custom log directory.
    #[must_use]
    pub fn with_log_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(path.into());
        self
    }

    /// Sets the level filter.
    #[must_use]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Enables or disables stderr output.
    #[must_use]
    pub fn with_console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }

    /// Returns the directory log files are written to.
    ///
    /// # Errors
    ///
    /// Returns an error if no custom directory is set and the platform data
    /// directory cannot be determined.
    pub fn log_dir(&self) -> Result<PathBuf, LoggingError> {
        if let Some(ref dir) = self.log_dir {
            return Ok(dir.clone());
        }

        dirs::data_local_dir()
            .map(|dir| dir.join(LOG_SUBDIR).join("logs"))
            .ok_or_else(LoggingError::no_data_dir)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            app_name: "chatline".to_string(),
            log_dir: None,
            level: LogLevel::default(),
            console: false,
        }
    }
}

/// Log level filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, includes per-frame parsing.
    Trace,
    /// Per-fragment events.
    Debug,
    /// Lifecycle events.
    #[default]
    Info,
    /// Skipped or degraded paths.
    Warn,
    /// Failures only.
    Error,
}

impl LogLevel {
    /// Converts to a `tracing_subscriber` level filter.
    #[must_use]
    pub fn to_filter(self) -> LevelFilter {
        match self {
            Self::Trace => LevelFilter::TRACE,
            Self::Debug => LevelFilter::DEBUG,
            Self::Info => LevelFilter::INFO,
            Self::Warn => LevelFilter::WARN,
            Self::Error => LevelFilter::ERROR,
        }
    }
}

impl FromStr for LogLevel {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(LoggingError::invalid_level(other)),
        }
    }
}

/// Keeps the background log writer alive. Dropping it flushes pending lines.
pub struct LoggingGuard {
    _guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

impl fmt::Debug for LoggingGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingGuard")
            .field("file", &self._guard.is_some())
            .finish()
    }
}

static LOGGING_GUARD: OnceLock<LoggingGuard> = OnceLock::new();

/// Errors that can occur during logging initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingError {
    /// The specific error that occurred.
    pub kind: LoggingErrorKind,
}

/// Specific logging error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggingErrorKind {
    /// The platform data directory is unknown.
    NoDataDir,
    /// The log directory could not be created.
    CreateDirFailed {
        /// The path that could not be created.
        path: PathBuf,
        /// The reason for failure.
        reason: String,
    },
    /// A level name did not parse.
    InvalidLevel {
        /// The rejected input.
        value: String,
    },
    /// A global subscriber was already installed.
    SubscriberInitFailed {
        /// The reason for failure.
        reason: String,
    },
}

impl LoggingError {
    /// Creates a new LoggingError with the given kind.
    #[must_use]
    pub fn new(kind: LoggingErrorKind) -> Self {
        Self { kind }
    }

    /// Creates an error for a missing data directory.
    #[must_use]
    pub fn no_data_dir() -> Self {
        Self::new(LoggingErrorKind::NoDataDir)
    }

    /// Creates an error for failed directory creation.
    #[must_use]
    pub fn create_dir_failed(path: PathBuf, reason: impl Into<String>) -> Self {
        Self::new(LoggingErrorKind::CreateDirFailed {
            path,
            reason: reason.into(),
        })
    }

    /// Creates an error for an unknown level name.
    #[must_use]
    pub fn invalid_level(value: impl Into<String>) -> Self {
        Self::new(LoggingErrorKind::InvalidLevel {
            value: value.into(),
        })
    }

    /// Creates an error for subscriber initialization failure.
    #[must_use]
    pub fn subscriber_init_failed(reason: impl Into<String>) -> Self {
        Self::new(LoggingErrorKind::SubscriberInitFailed {
            reason: reason.into(),
        })
    }
}

impl fmt::Display for LoggingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            LoggingErrorKind::NoDataDir => {
                write!(
                    f,
                    "could not determine the local data directory; pass a custom log directory"
                )
            }
            LoggingErrorKind::CreateDirFailed { path, reason } => {
                write!(
                    f,
                    "failed to create log directory '{}': {}; check permissions",
                    path.display(),
                    reason
                )
            }
            LoggingErrorKind::InvalidLevel { value } => {
                write!(
                    f,
                    "unknown log level '{}'; expected trace, debug, info, warn or error",
                    value
                )
            }
            LoggingErrorKind::SubscriberInitFailed { reason } => {
                write!(
                    f,
                    "failed to initialize tracing subscriber: {}; a subscriber may already be set",
                    reason
                )
            }
        }
    }
}

impl std::error::Error for LoggingError {}

/// Builds the filter: `RUST_LOG` if set and valid, otherwise the configured level.
fn build_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.to_filter().into())
        .from_env_lossy()
}

/// Installs the global subscriber.
///
/// Returns `Ok(None)` when neither file nor console output is enabled.
/// The returned guard must be held for file output to keep flowing.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already set.
pub fn init_file_logging(config: &LoggingConfig) -> Result<Option<LoggingGuard>, LoggingError> {
    if !config.enabled && !config.console {
        return Ok(None);
    }

    let (file_layer, guard) = if config.enabled {
        let log_dir = config.log_dir()?;
        std::fs::create_dir_all(&log_dir)
            .map_err(|e| LoggingError::create_dir_failed(log_dir.clone(), e.to_string()))?;

        let appender =
            tracing_appender::rolling::daily(&log_dir, format!("{}.log", config.app_name));
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let console_layer = config.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .boxed()
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .with(build_filter(config.level))
        .try_init()
        .map_err(|e| LoggingError::subscriber_init_failed(e.to_string()))?;

    Ok(Some(LoggingGuard { _guard: guard }))
}

/// Installs the global subscriber and keeps its guard for the process lifetime.
///
/// Returns `Ok(false)` if logging is disabled or was already initialized.
///
/// # Errors
///
/// See [`init_file_logging`].
pub fn init_and_store_logging(config: &LoggingConfig) -> Result<bool, LoggingError> {
    if LOGGING_GUARD.get().is_some() {
        return Ok(false);
    }

    match init_file_logging(config)? {
        Some(guard) => {
            // A concurrent caller may have won the race; either guard is fine.
            let _ = LOGGING_GUARD.set(guard);
            Ok(true)
        }
        None => Ok(false),
    }
}
