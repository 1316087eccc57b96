#![deny(missing_docs)]
//! Shared logging utilities for the SurfScan workspace.
//!
//! This crate provides the `scan_*` logging macros used across the codebase,
//! a per-thread component label that prefixes every message, the logger setup
//! used by the relay host and a minimal test initializer.

use std::cell::Cell;
use std::fs::File;
use std::path::Path;

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

#[doc(hidden)]
pub use log as __log;

thread_local! {
    /// Component that owns the current thread (coordinator, engine, stdin reader...).
    static COMPONENT: Cell<&'static str> = const { Cell::new("main") };
}

/// Labels log output produced on the current thread.
/// Call once at the top of every long-lived thread.
pub fn set_component(name: &'static str) {
    COMPONENT.with(|v| v.set(name));
}

/// Returns the component label of the current thread, `"main"` if unset.
pub fn component() -> &'static str {
    COMPONENT.with(|v| v.get())
}

/// Logs a trace-level message prefixed with the thread's component.
#[macro_export]
macro_rules! scan_trace {
    ($($arg:tt)*) => {{
        $crate::__log::trace!("[{}] {}", $crate::component(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message prefixed with the thread's component.
#[macro_export]
macro_rules! scan_debug {
    ($($arg:tt)*) => {{
        $crate::__log::debug!("[{}] {}", $crate::component(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message prefixed with the thread's component.
#[macro_export]
macro_rules! scan_info {
    ($($arg:tt)*) => {{
        $crate::__log::info!("[{}] {}", $crate::component(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message prefixed with the thread's component.
#[macro_export]
macro_rules! scan_warn {
    ($($arg:tt)*) => {{
        $crate::__log::warn!("[{}] {}", $crate::component(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message prefixed with the thread's component.
#[macro_export]
macro_rules! scan_error {
    ($($arg:tt)*) => {{
        $crate::__log::error!("[{}] {}", $crate::component(), format_args!($($arg)*));
    }};
}

/// Destination for log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogDestination {
    /// Write to the given log file only.
    File,
    /// Write to the terminal (stderr; stdout is reserved for the relay protocol).
    #[default]
    Terminal,
    /// Write to both file and terminal.
    Both,
}

/// Initialize the global logger.
///
/// For `LogDestination::File` or `Both`, `log_path` is truncated and written.
/// If the file cannot be created the terminal logger is still installed for
/// `Both`; for `File` nothing is installed.
pub fn initialize(destination: LogDestination, level: LevelFilter, log_path: &Path) {
    let config = build_config();

    let loggers: Vec<Box<dyn SharedLogger>> = match destination {
        LogDestination::File => match create_file_logger(level, config, log_path) {
            Some(file_logger) => vec![file_logger],
            None => return,
        },
        LogDestination::Terminal => vec![stderr_logger(level, config)],
        LogDestination::Both => {
            let mut loggers = vec![stderr_logger(level, config.clone())];
            if let Some(file_logger) = create_file_logger(level, config, log_path) {
                loggers.push(file_logger);
            }
            loggers
        }
    };

    // A second initialization keeps the first logger.
    let _ = CombinedLogger::init(loggers);
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let _ = CombinedLogger::init(vec![stderr_logger(level, Config::default())]);
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build()
}

fn stderr_logger(level: LevelFilter, config: Config) -> Box<dyn SharedLogger> {
    TermLogger::new(level, config, TerminalMode::Stderr, ColorChoice::Auto)
}

fn create_file_logger(
    level: LevelFilter,
    config: Config,
    log_path: &Path,
) -> Option<Box<dyn SharedLogger>> {
    match File::create(log_path) {
        Ok(file) => Some(WriteLogger::new(level, config, file)),
        Err(err) => {
            eprintln!("Warning: Could not create log file at {:?}: {}", log_path, err);
            None
        }
    }
}
