//! ABOUTME: Concrete LogSink implementations shipped alongside the engine
//! ABOUTME: TracingLogSink is the default; NullLogSink backs a Context built without one

use provisio_core::{LogLevel, LogSink};
use tracing::{debug, error, info, warn};

/// Forwards every message to the `tracing` crate at the matching level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => debug!("{message}"),
            LogLevel::Info => info!("{message}"),
            LogLevel::Warning => warn!("{message}"),
            LogLevel::Error => error!("{message}"),
        }
    }
}

/// Discards every message. Used as the `Context` builder's default so callers
/// who don't care about logging don't have to wire anything up.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogSink;

impl LogSink for NullLogSink {
    fn log(&self, _level: LogLevel, _message: &str) {}
}
