//! ABOUTME: Concrete Step implementations shipped with the engine

pub mod file_replace;

pub use file_replace::AtomicFileReplace;
