//! # Logger
//!
//! Installs the global `tracing` subscriber for herald processes.
//!
//! Output goes to the console, to a rolling file through a non-blocking writer, or both.
//! Everything can be driven from a serde-deserializable [`LogSettings`] section
//! (see [`Logger::from_settings`]) or configured in code through [`Logger::builder`].
//! `RUST_LOG` still applies when no explicit filter is set.
//!
//! ## Example
//!
//! ```rust
//! # use herald_logger::{LevelFilter, Logger};
//! let _logger = Logger::builder()
//!     .name("herald-demo")
//!     .console(true)
//!     .level(LevelFilter::DEBUG)
//!     .init()
//!     .unwrap();
//! ```

mod error;

pub use crate::error::{LoggerError, LoggerErrorExt};
pub use tracing::level_filters::LevelFilter;

use private::Sealed;
use serde::{Deserialize, Serialize};
use std::fs;
use std::marker::PhantomData;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const DEFAULT_MAX_FILES: usize = 10;
const LOG_FILE_SUFFIX: &str = "log";
const DEFAULT_NAME: &str = "herald";

/// Minimum severity, as written in configuration files.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => Self::OFF,
            LogLevel::Error => Self::ERROR,
            LogLevel::Warn => Self::WARN,
            LogLevel::Info => Self::INFO,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Trace => Self::TRACE,
        }
    }
}

impl From<LevelFilter> for LogLevel {
    fn from(level: LevelFilter) -> Self {
        [Self::Off, Self::Error, Self::Warn, Self::Info, Self::Debug]
            .into_iter()
            .find(|candidate| LevelFilter::from(*candidate) == level)
            .unwrap_or(Self::Trace)
    }
}

/// How often the log file rolls over.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Minutely,
    Hourly,
    #[default]
    Daily,
    Never,
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Minutely => Self::MINUTELY,
            LogRotation::Hourly => Self::HOURLY,
            LogRotation::Daily => Self::DAILY,
            LogRotation::Never => Self::NEVER,
        }
    }
}

/// The `[log]` section of a herald configuration file.
///
/// Every field has a default, so an empty section yields console-only `info` logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Prefix of rolled log files, e.g. `herald.2026-10-18.log`.
    pub name: String,
    pub level: LogLevel,
    /// Explicit directives such as `herald_event_bus=debug`; overrides `RUST_LOG`.
    pub filter: Option<String>,
    pub console: bool,
    /// Directory for rolling log files. File output is disabled when absent.
    pub directory: Option<PathBuf>,
    pub rotation: LogRotation,
    pub max_files: usize,
    /// Write file output as JSON lines.
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_owned(),
            level: LogLevel::default(),
            filter: None,
            console: true,
            directory: None,
            rotation: LogRotation::default(),
            max_files: DEFAULT_MAX_FILES,
            json: false,
        }
    }
}

#[derive(Debug)]
pub struct NoName;
#[derive(Debug)]
pub struct WithName;

mod private {
    pub trait Sealed {}
}
impl Sealed for NoName {}
impl Sealed for WithName {}

/// A builder for the global tracing subscriber. A name is required before [`init`](Self::init).
#[derive(Debug)]
pub struct LoggerBuilder<N: Sealed = NoName> {
    settings: LogSettings,
    state: PhantomData<N>,
}

impl LoggerBuilder<NoName> {
    /// Sets the logger name, used as the log file prefix.
    pub fn name(self, name: impl Into<String>) -> LoggerBuilder<WithName> {
        let mut settings = self.settings;
        settings.name = name.into();
        LoggerBuilder { settings, state: PhantomData }
    }
}

impl LoggerBuilder<WithName> {
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn level(mut self, level: LevelFilter) -> Self {
        self.settings.level = LogLevel::from(level);
        self
    }

    /// Adds explicit filter directives (e.g., `herald=debug,tokio=warn`).
    ///
    /// Invalid directives make [`init`](Self::init) fail.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn env_filter(mut self, filter: impl Into<String>) -> Self {
        self.settings.filter = Some(filter.into());
        self
    }

    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn console(mut self, enabled: bool) -> Self {
        self.settings.console = enabled;
        self
    }

    /// Enables file output into `directory`.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.settings.directory = Some(directory.into());
        self
    }

    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn rotation(mut self, rotation: LogRotation) -> Self {
        self.settings.rotation = rotation;
        self
    }

    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn max_files(mut self, max: usize) -> Self {
        self.settings.max_files = max;
        self
    }

    /// Writes file output as JSON lines. Console output stays human-readable.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn json(mut self, enabled: bool) -> Self {
        self.settings.json = enabled;
        self
    }

    /// Consumes the builder and installs the global tracing subscriber.
    ///
    /// The returned [`Logger`] owns the file writer's [`WorkerGuard`]; keep it alive until
    /// shutdown so buffered lines are flushed.
    ///
    /// # Errors
    /// * [`LoggerError::InvalidConfiguration`] for a blank name, `max_files == 0`, bad
    ///   filter directives, or when neither console nor file output is enabled.
    /// * [`LoggerError::Directory`] / [`LoggerError::Appender`] when the log directory is unusable.
    /// * [`LoggerError::Subscriber`] if a global subscriber is already installed.
    pub fn init(self) -> Result<Logger, LoggerError> {
        let settings = self.settings;
        validate(&settings)?;
        let filter = env_filter(&settings)?;

        let mut layers = Vec::new();
        if settings.console {
            layers.push(layer().compact().with_ansi(true).boxed());
        }

        let guard = match &settings.directory {
            Some(directory) => {
                fs::create_dir_all(directory)
                    .context(format!("Creating log directory {}", directory.display()))?;

                let appender = RollingFileAppender::builder()
                    .rotation(settings.rotation.into())
                    .filename_prefix(&settings.name)
                    .filename_suffix(LOG_FILE_SUFFIX)
                    .max_log_files(settings.max_files)
                    .build(directory)?;
                let (writer, guard) = tracing_appender::non_blocking(appender);

                let file = layer().with_writer(writer).with_ansi(false);
                layers.push(if settings.json { file.json().boxed() } else { file.boxed() });
                Some(guard)
            },
            None => None,
        };

        tracing_subscriber::registry().with(filter).with(layers).try_init()?;
        tracing::debug!(name = %settings.name, file = guard.is_some(), "Logger initialized");

        Ok(Logger { guard })
    }
}

/// A handle to the initialized logging system.
///
/// Holds the background writer guard, if file output is enabled.
#[must_use = "Dropping this handle stops the background log writer."]
#[derive(Debug)]
pub struct Logger {
    guard: Option<WorkerGuard>,
}

impl Logger {
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder { settings: LogSettings::default(), state: PhantomData }
    }

    /// Installs the global subscriber from a deserialized settings section.
    ///
    /// # Errors
    /// Same as [`LoggerBuilder::init`].
    pub fn from_settings(settings: &LogSettings) -> Result<Self, LoggerError> {
        LoggerBuilder::<WithName> { settings: settings.clone(), state: PhantomData }.init()
    }

    /// Returns `true` when lines are also written to a rolling file.
    #[must_use]
    pub const fn writes_files(&self) -> bool {
        self.guard.is_some()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        if self.guard.is_some() {
            tracing::info!("Logging system shutting down, flushing buffers...");
        }
    }
}

fn validate(settings: &LogSettings) -> Result<(), LoggerError> {
    let reject = |message: &'static str| {
        Err(LoggerError::InvalidConfiguration { message: message.into(), context: None })
    };

    if settings.name.trim().is_empty() {
        return reject("Logger name cannot be empty");
    }
    if settings.max_files == 0 {
        return reject("max_files must be greater than zero");
    }
    if !settings.console && settings.directory.is_none() {
        return reject("No logging output enabled. Enable console or set a log directory.");
    }
    Ok(())
}

fn env_filter(settings: &LogSettings) -> Result<EnvFilter, LoggerError> {
    let builder = EnvFilter::builder().with_default_directive(LevelFilter::from(settings.level).into());
    match &settings.filter {
        Some(directives) => builder.parse(directives).map_err(|e| LoggerError::InvalidConfiguration {
            message: format!("Invalid filter '{directives}': {e}").into(),
            context: None,
        }),
        None => Ok(builder.from_env_lossy()),
    }
}
