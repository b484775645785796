//! ABOUTME: Per-run shared execution context passed to every step lifecycle call
//! ABOUTME: Single-writer in practice: the engine writes the cursor, the active step writes its own properties

use parking_lot::RwLock;
use provisio_core::{LogSink, ProgressSink, Progress, ProvisioError};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The engine-owned cursor, updated between steps and read by `reportStepProgress`.
#[derive(Debug, Clone, Default)]
struct Cursor {
    step_number: usize,
    total_steps: usize,
    current_step_name: String,
}

/// Per-run shared state passed to every lifecycle call.
///
/// Cheap to clone: everything inside is `Arc`-backed, so a clone observes the
/// same underlying properties, cursor, and cancellation signal.
#[derive(Clone)]
pub struct Context {
    properties: Arc<RwLock<HashMap<String, Value>>>,
    logger: Arc<dyn LogSink>,
    progress: Option<Arc<dyn ProgressSink>>,
    cancellation: CancellationToken,
    installation_path: Option<PathBuf>,
    is_uninstall: bool,
    cursor: Arc<RwLock<Cursor>>,
}

impl Context {
    #[must_use]
    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    #[must_use]
    pub fn logger(&self) -> &Arc<dyn LogSink> {
        &self.logger
    }

    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    #[must_use]
    pub fn installation_path(&self) -> Option<&PathBuf> {
        self.installation_path.as_ref()
    }

    #[must_use]
    pub const fn is_uninstall(&self) -> bool {
        self.is_uninstall
    }

    /// Engine-only: flips `is_uninstall` for the duration of a reverse walk.
    /// Not exposed outside the crate.
    pub(crate) fn set_is_uninstall(&mut self, is_uninstall: bool) {
        self.is_uninstall = is_uninstall;
    }

    #[must_use]
    pub fn get_property(&self, key: &str) -> Option<Value> {
        self.properties.read().get(key).cloned()
    }

    pub fn set_property(&self, key: impl Into<String>, value: Value) {
        self.properties.write().insert(key.into(), value);
    }

    #[must_use]
    pub fn current_step_number(&self) -> usize {
        self.cursor.read().step_number
    }

    #[must_use]
    pub fn total_steps(&self) -> usize {
        self.cursor.read().total_steps
    }

    #[must_use]
    pub fn current_step_name(&self) -> String {
        self.cursor.read().current_step_name.clone()
    }

    /// Engine-only cursor update between steps.
    pub(crate) fn set_current_step(&self, step_number: usize, total_steps: usize, name: &str) {
        let mut cursor = self.cursor.write();
        cursor.step_number = step_number;
        cursor.total_steps = total_steps;
        cursor.current_step_name = name.to_string();
    }

    /// Publishes a [`Progress`] value derived from the cursor plus a
    /// step-supplied sub-step description and percentage.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisioError::CallerError`] if `percent` is outside `0..=100`.
    pub fn report_step_progress(
        &self,
        sub_step_description: Option<String>,
        percent: u8,
    ) -> Result<(), ProvisioError> {
        if percent > 100 {
            return Err(ProvisioError::CallerError(format!(
                "percent_complete must be within 0..=100, got {percent}"
            )));
        }
        let cursor = self.cursor.read().clone();
        if let Some(sink) = &self.progress {
            sink.publish(Progress {
                step_number: cursor.step_number,
                total_steps: cursor.total_steps,
                current_step_name: cursor.current_step_name,
                sub_step_description,
                percent_complete: percent,
            });
        }
        Ok(())
    }
}

/// Builds a [`Context`]. `logger` defaults to a sink that discards every
/// message; `progress` defaults to [`provisio_core::NullProgressSink`].
pub struct ContextBuilder {
    properties: HashMap<String, Value>,
    logger: Option<Arc<dyn LogSink>>,
    progress: Option<Arc<dyn ProgressSink>>,
    cancellation: CancellationToken,
    installation_path: Option<PathBuf>,
    is_uninstall: bool,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self {
            properties: HashMap::new(),
            logger: None,
            progress: None,
            cancellation: CancellationToken::new(),
            installation_path: None,
            is_uninstall: false,
        }
    }
}

impl ContextBuilder {
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn LogSink>) -> Self {
        self.logger = Some(logger);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(progress);
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    #[must_use]
    pub fn with_installation_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.installation_path = Some(path.into());
        self
    }

    #[must_use]
    pub const fn with_is_uninstall(mut self, is_uninstall: bool) -> Self {
        self.is_uninstall = is_uninstall;
        self
    }

    #[must_use]
    pub fn build(self) -> Context {
        Context {
            properties: Arc::new(RwLock::new(self.properties)),
            logger: self
                .logger
                .unwrap_or_else(|| Arc::new(crate::sinks::NullLogSink)),
            progress: self.progress,
            cancellation: self.cancellation,
            installation_path: self.installation_path,
            is_uninstall: self.is_uninstall,
            cursor: Arc::new(RwLock::new(Cursor::default())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_bag_round_trips() {
        let context = Context::builder().build();
        context.set_property("answer", Value::from(42));
        assert_eq!(context.get_property("answer"), Some(Value::from(42)));
        assert_eq!(context.get_property("missing"), None);
    }

    #[test]
    fn cursor_defaults_to_zero() {
        let context = Context::builder().build();
        assert_eq!(context.current_step_number(), 0);
        assert_eq!(context.total_steps(), 0);
        assert_eq!(context.current_step_name(), "");
    }

    #[test]
    fn set_current_step_updates_cursor() {
        let context = Context::builder().build();
        context.set_current_step(2, 5, "copy-file");
        assert_eq!(context.current_step_number(), 2);
        assert_eq!(context.total_steps(), 5);
        assert_eq!(context.current_step_name(), "copy-file");
    }

    #[test]
    fn report_step_progress_rejects_out_of_range_percent() {
        let context = Context::builder().build();
        let err = context.report_step_progress(None, 101).unwrap_err();
        assert!(matches!(err, ProvisioError::CallerError(_)));
    }

    #[test]
    fn report_step_progress_accepts_boundary_values() {
        let context = Context::builder().build();
        assert!(context.report_step_progress(None, 0).is_ok());
        assert!(context.report_step_progress(None, 100).is_ok());
    }

    #[test]
    fn cloned_context_shares_cursor_and_properties() {
        let context = Context::builder().build();
        let clone = context.clone();
        context.set_property("shared", Value::from(true));
        clone.set_current_step(1, 1, "only-step");

        assert_eq!(clone.get_property("shared"), Some(Value::from(true)));
        assert_eq!(context.current_step_name(), "only-step");
    }
}
