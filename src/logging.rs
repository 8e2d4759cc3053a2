//! Logging setup for hosted-injector
//!
//! Structured logging with JSON (production) or pretty (development) output.
//!
//! # Features
//!
//! - `logging` - emit tracing events (default)
//! - `logging-json` - JSON subscriber output
//! - `logging-pretty` - pretty subscriber output
//!
//! `RUST_LOG`, when set, takes precedence over the builder's level and target.
//!
//! # Example
//!
//! ```rust,ignore
//! use hosted_injector::logging;
//!
//! // JSON if logging-json is enabled, pretty otherwise
//! logging::init();
//!
//! // Or configure explicitly
//! logging::builder()
//!     .info()
//!     .crate_only()
//!     .with_thread_names()
//!     .compact()
//!     .init();
//! ```

use tracing::Level;

/// Target used by every event this crate emits
pub const TARGET: &str = "hosted_injector";

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// JSON structured logging (production default)
    #[default]
    Json,
    /// Pretty colorful output (development)
    Pretty,
    /// Compact single-line output
    Compact,
}

/// Builder for logging configuration
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    level: Level,
    format: LogFormat,
    target: Option<&'static str>,
    with_file: bool,
    with_line_number: bool,
    with_thread_ids: bool,
    with_thread_names: bool,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            format: LogFormat::Json,
            target: None,
            with_file: false,
            with_line_number: false,
            with_thread_ids: false,
            with_thread_names: false,
        }
    }
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum log level
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn trace(self) -> Self {
        self.with_level(Level::TRACE)
    }

    pub fn debug(self) -> Self {
        self.with_level(Level::DEBUG)
    }

    pub fn info(self) -> Self {
        self.with_level(Level::INFO)
    }

    pub fn warn(self) -> Self {
        self.with_level(Level::WARN)
    }

    /// Only show events from `target`
    pub fn with_target_filter(mut self, target: &'static str) -> Self {
        self.target = Some(target);
        self
    }

    /// Only show hosted-injector events
    pub fn crate_only(self) -> Self {
        self.with_target_filter(TARGET)
    }

    pub fn with_file(mut self) -> Self {
        self.with_file = true;
        self
    }

    pub fn with_line_number(mut self) -> Self {
        self.with_line_number = true;
        self
    }

    pub fn with_thread_ids(mut self) -> Self {
        self.with_thread_ids = true;
        self
    }

    pub fn with_thread_names(mut self) -> Self {
        self.with_thread_names = true;
        self
    }

    pub fn json(mut self) -> Self {
        self.format = LogFormat::Json;
        self
    }

    pub fn pretty(mut self) -> Self {
        self.format = LogFormat::Pretty;
        self
    }

    pub fn compact(mut self) -> Self {
        self.format = LogFormat::Compact;
        self
    }

    /// Directive string handed to the `EnvFilter` when `RUST_LOG` is unset
    #[cfg_attr(
        not(any(feature = "logging-json", feature = "logging-pretty")),
        allow(dead_code)
    )]
    fn directive(&self) -> String {
        match self.target {
            Some(target) => format!("{}={}", target, self.level),
            None => self.level.to_string(),
        }
    }

    /// Install the subscriber, failing if one is already installed.
    #[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
    pub fn try_init(self) -> Result<(), tracing_subscriber::util::TryInitError> {
        use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.directive()));

        let layer = match self.format {
            #[cfg(feature = "logging-json")]
            LogFormat::Json => fmt::layer()
                .json()
                .with_file(self.with_file)
                .with_line_number(self.with_line_number)
                .with_thread_ids(self.with_thread_ids)
                .with_thread_names(self.with_thread_names)
                .with_target(true)
                .boxed(),
            #[cfg(not(feature = "logging-json"))]
            LogFormat::Json => fmt::layer()
                .with_file(self.with_file)
                .with_line_number(self.with_line_number)
                .with_thread_ids(self.with_thread_ids)
                .with_thread_names(self.with_thread_names)
                .with_target(true)
                .boxed(),
            LogFormat::Pretty => fmt::layer()
                .pretty()
                .with_file(self.with_file)
                .with_line_number(self.with_line_number)
                .with_thread_ids(self.with_thread_ids)
                .with_thread_names(self.with_thread_names)
                .with_target(true)
                .boxed(),
            LogFormat::Compact => fmt::layer()
                .compact()
                .with_file(self.with_file)
                .with_line_number(self.with_line_number)
                .with_thread_ids(self.with_thread_ids)
                .with_thread_names(self.with_thread_names)
                .with_target(true)
                .boxed(),
        };

        tracing_subscriber::registry().with(filter).with(layer).try_init()
    }

    /// Install the subscriber; does nothing if one is already installed.
    #[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
    pub fn init(self) {
        let _ = self.try_init();
    }

    /// No-op: requires `logging-json` or `logging-pretty`
    #[cfg(not(any(feature = "logging-json", feature = "logging-pretty")))]
    pub fn init(self) {}
}

pub fn builder() -> LoggingBuilder {
    LoggingBuilder::new()
}

/// Initialize with defaults: JSON when `logging-json` is enabled, pretty otherwise.
pub fn init() {
    #[cfg(feature = "logging-json")]
    init_json();
    #[cfg(not(feature = "logging-json"))]
    init_pretty();
}

/// JSON structured logging at debug level.
///
/// # Example output
/// ```json
/// {"timestamp":"2026-01-01T00:00:00.000Z","level":"INFO","target":"hosted_injector","fields":{"message":"Application started","services":4}}
/// ```
pub fn init_json() {
    builder().json().debug().init();
}

/// Pretty logging at debug level.
///
/// # Example output
/// ```text
///   2026-01-01T00:00:00.000Z  INFO hosted_injector: Application started, services: 4
/// ```
pub fn init_pretty() {
    builder().pretty().debug().init();
}

/// Only this crate's events, at debug level
pub fn init_crate_only() {
    builder().crate_only().debug().init();
}
