//! ABOUTME: Error taxonomy and sink traits shared by provisio's workflow engine
//! ABOUTME: Deliberately thin — the engine and its concrete steps live in provisio-workflows

pub mod error;
pub mod sink;

pub use error::{LogLevel, ProvisioError, Result};
pub use sink::{LogSink, NullProgressSink, Progress, ProgressSink};
