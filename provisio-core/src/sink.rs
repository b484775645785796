//! ABOUTME: Logger and progress sink traits consumed by the workflow engine
//! ABOUTME: These are the only two external abstractions the engine depends on

use crate::error::LogLevel;
use std::fmt;

/// A structured logging sink.
///
/// Implementations must not panic or block indefinitely; the engine treats
/// logging as best-effort and never lets a sink failure affect a workflow
/// outcome.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);

    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    fn warning(&self, message: &str) {
        self.log(LogLevel::Warning, message);
    }

    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

/// A single progress update, published by the engine's cursor or by the
/// currently executing step via sub-step reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub step_number: usize,
    pub total_steps: usize,
    pub current_step_name: String,
    pub sub_step_description: Option<String>,
    pub percent_complete: u8,
}

impl Progress {
    /// `((step_number - 1) * 100 + percent_complete) / total_steps`, or 0
    /// when there are no steps at all.
    #[must_use]
    pub fn overall_percent(&self) -> u8 {
        if self.total_steps == 0 {
            return 0;
        }
        let step_number = self.step_number.saturating_sub(1) as u64;
        let numerator = step_number * 100 + u64::from(self.percent_complete);
        let overall = numerator / self.total_steps as u64;
        overall.min(100) as u8
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}/{}] {} ({}%)",
            self.step_number,
            self.total_steps,
            self.current_step_name,
            self.overall_percent()
        )
    }
}

/// An optional consumer of [`Progress`] values. Publication is best-effort;
/// a sink must not panic.
pub trait ProgressSink: Send + Sync {
    fn publish(&self, progress: Progress);
}

/// A progress sink that discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn publish(&self, _progress: Progress) {}
}
