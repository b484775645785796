//! ABOUTME: The step lifecycle contract and its per-step configuration
//! ABOUTME: Steps are the polymorphic unit of work the engine drives through validate/execute/rollback/dispose

use crate::context::Context;
use async_trait::async_trait;
use provisio_core::ProvisioError;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of one lifecycle call. Immutable once produced.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub success: bool,
    pub message: String,
    pub error: Option<Arc<ProvisioError>>,
    pub data: HashMap<String, Value>,
}

impl StepResult {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error: None,
            data: HashMap::new(),
        }
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error: None,
            data: HashMap::new(),
        }
    }

    #[must_use]
    pub fn failure_with_error(message: impl Into<String>, error: ProvisioError) -> Self {
        Self {
            success: false,
            message: message.into(),
            error: Some(Arc::new(error)),
            data: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }
}

impl fmt::Display for StepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}",
            if self.success { "ok" } else { "failed" },
            self.message
        )
    }
}

/// The lifecycle contract every step obeys.
///
/// A step instance is single-use per workflow run: it may hold state between
/// `execute` and its matching `rollback`/`dispose`, so the same instance must
/// never be shared across concurrent workflows.
#[async_trait]
pub trait Step: Send + Sync {
    /// Stable identity, used for repair targeting and keying results.
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Read-only prerequisite check. Must not mutate the system. May
    /// allocate temporary probe resources but must clean them up before
    /// returning on every path.
    async fn validate(&mut self, context: &Context) -> StepResult;

    /// Performs the mutation. Invoked at most once per workflow run. Must be
    /// safe to abort at any point provided `rollback` and `dispose` are
    /// subsequently called.
    async fn execute(&mut self, context: &Context) -> StepResult;

    /// Best-effort compensation. Must tolerate being called after any
    /// partial `execute`. Must never panic; internal failure becomes a
    /// non-successful result.
    async fn rollback(&mut self, context: &Context) -> StepResult;

    /// Idempotent resource release. Must be safe to call more than once and
    /// must never panic.
    async fn dispose(&mut self) -> StepResult;
}

/// Per-step configuration attached at assembly time. Immutable once built.
#[derive(Clone)]
pub struct StepPolicy {
    pub name_override: Option<String>,
    pub description_override: Option<String>,
    pub continue_on_error: bool,
    pub skip_if: Option<Arc<dyn Fn(&Context) -> bool + Send + Sync>>,
    pub timeout: Option<Duration>,
    pub retries: u32,
}

impl fmt::Debug for StepPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepPolicy")
            .field("name_override", &self.name_override)
            .field("description_override", &self.description_override)
            .field("continue_on_error", &self.continue_on_error)
            .field("skip_if", &self.skip_if.is_some())
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .finish()
    }
}

impl Default for StepPolicy {
    fn default() -> Self {
        Self {
            name_override: None,
            description_override: None,
            continue_on_error: false,
            skip_if: None,
            timeout: None,
            retries: 0,
        }
    }
}

impl StepPolicy {
    #[must_use]
    pub fn with_name_override(mut self, name: impl Into<String>) -> Self {
        self.name_override = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_description_override(mut self, description: impl Into<String>) -> Self {
        self.description_override = Some(description.into());
        self
    }

    #[must_use]
    pub const fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    #[must_use]
    pub fn with_skip_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.skip_if = Some(Arc::new(predicate));
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub const fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    fn should_skip(&self, context: &Context) -> bool {
        self.skip_if.as_ref().is_some_and(|predicate| predicate(context))
    }
}

/// A step paired with its policy. Carries no runtime state of its own.
pub struct ConfiguredStep {
    pub step: Box<dyn Step>,
    pub policy: StepPolicy,
}

impl ConfiguredStep {
    #[must_use]
    pub fn new(step: impl Step + 'static, policy: StepPolicy) -> Self {
        Self {
            step: Box::new(step),
            policy,
        }
    }

    #[must_use]
    pub fn boxed(step: Box<dyn Step>, policy: StepPolicy) -> Self {
        Self { step, policy }
    }

    /// `policy.name_override ?? step.name`.
    #[must_use]
    pub fn effective_name(&self) -> &str {
        self.policy
            .name_override
            .as_deref()
            .unwrap_or_else(|| self.step.name())
    }

    #[must_use]
    pub fn effective_description(&self) -> &str {
        self.policy
            .description_override
            .as_deref()
            .unwrap_or_else(|| self.step.description())
    }

    #[must_use]
    pub fn should_skip(&self, context: &Context) -> bool {
        self.policy.should_skip(context)
    }
}

impl fmt::Debug for ConfiguredStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfiguredStep")
            .field("name", &self.effective_name())
            .field("policy", &self.policy)
            .finish()
    }
}
