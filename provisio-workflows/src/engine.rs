//! ABOUTME: WorkflowEngine drives a step list through validate/execute/compensate/dispose
//! ABOUTME: install runs the full forward algorithm; uninstall and repair are restricted variants

use crate::context::Context;
use crate::executor::{executor_chain, StepExecutor};
use crate::step::{ConfiguredStep, StepResult};
use indexmap::IndexMap;
use provisio_core::{LogSink, ProvisioError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Run-wide knobs that apply above the per-step [`StepPolicy`](crate::step::StepPolicy).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowOptions {
    pub rollback_on_failure: bool,
    pub validate_first: bool,
    pub deadline: Duration,
    pub require_administrator: bool,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            rollback_on_failure: true,
            validate_first: true,
            deadline: Duration::from_secs(30 * 60),
            require_administrator: false,
        }
    }
}

impl WorkflowOptions {
    #[must_use]
    pub const fn with_rollback_on_failure(mut self, rollback_on_failure: bool) -> Self {
        self.rollback_on_failure = rollback_on_failure;
        self
    }

    #[must_use]
    pub const fn with_validate_first(mut self, validate_first: bool) -> Self {
        self.validate_first = validate_first;
        self
    }

    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    #[must_use]
    pub const fn with_require_administrator(mut self, require_administrator: bool) -> Self {
        self.require_administrator = require_administrator;
        self
    }
}

/// The outcome of a full engine run.
#[derive(Debug, Clone)]
pub struct WorkflowSummary {
    pub success: bool,
    pub message: String,
    pub error: Option<Arc<ProvisioError>>,
    /// Keyed by effective name, in execution order.
    pub step_results: IndexMap<String, StepResult>,
    pub duration: Duration,
    /// Count of results with `success = true`, regardless of rollback outcome.
    pub completed_steps: usize,
    /// Effective name of the first non-continue-on-error failure, if any.
    pub failed_step: Option<String>,
}

impl WorkflowSummary {
    fn empty(success: bool, message: impl Into<String>, error: Option<ProvisioError>, started_at: Instant) -> Self {
        Self {
            success,
            message: message.into(),
            error: error.map(Arc::new),
            step_results: IndexMap::new(),
            duration: started_at.elapsed(),
            completed_steps: 0,
            failed_step: None,
        }
    }

    fn from_results(
        success: bool,
        message: impl Into<String>,
        error: Option<Arc<ProvisioError>>,
        step_results: IndexMap<String, StepResult>,
        failed_step: Option<String>,
        started_at: Instant,
    ) -> Self {
        let completed_steps = step_results.values().filter(|result| result.success).count();
        Self {
            success,
            message: message.into(),
            error,
            step_results,
            duration: started_at.elapsed(),
            completed_steps,
            failed_step,
        }
    }
}

/// Result of racing a single step's executor chain against cancellation and
/// the workflow-wide deadline. Only `Completed` corresponds to a step that
/// actually ran `execute`.
enum StepOutcome {
    Completed(StepResult),
    DeadlineExceeded,
    Cancelled,
}

/// Why the execution-phase loop stopped.
enum LoopExit {
    Completed,
    Cancelled,
    DeadlineExceeded,
    Failed(String, StepResult),
}

/// Drives a fixed list of [`ConfiguredStep`]s through their lifecycle.
///
/// One engine instance is built per run: steps are consumed by value and the
/// engine owns them for the duration of `install`/`uninstall`/`repair`.
pub struct WorkflowEngine {
    steps: Vec<ConfiguredStep>,
    options: WorkflowOptions,
    executor: Arc<dyn StepExecutor>,
}

impl WorkflowEngine {
    #[must_use]
    pub fn new(steps: Vec<ConfiguredStep>, options: WorkflowOptions) -> Self {
        Self {
            steps,
            options,
            executor: executor_chain(),
        }
    }

    /// Runs the full forward algorithm: privilege gate, validation phase,
    /// execution phase under a deadline, compensation on failure, and an
    /// unconditional disposal sweep.
    ///
    /// Returns `Err(ProvisioError::Cancelled)` with no summary if the
    /// caller's cancellation token fires mid-run; every other outcome,
    /// including a deadline expiry, is an `Ok` summary.
    pub async fn install(mut self, context: &Context) -> Result<WorkflowSummary, ProvisioError> {
        let started_at = Instant::now();

        if self.options.require_administrator && !crate::privilege::current_process_is_elevated() {
            return Ok(WorkflowSummary::empty(
                false,
                "administrator privileges required",
                Some(ProvisioError::PrivilegeDenied),
                started_at,
            ));
        }

        let total = self.steps.len();
        if self.options.validate_first {
            for (index, configured) in self.steps.iter_mut().enumerate() {
                if configured.should_skip(context) {
                    continue;
                }
                context.set_current_step(index + 1, total, configured.effective_name());
                let result = configured.step.validate(context).await;
                if !result.success && !configured.policy.continue_on_error {
                    let name = configured.effective_name().to_string();
                    context
                        .logger()
                        .error(&format!("validation failed for step '{name}': {}", result.message));
                    let error = result
                        .error
                        .clone()
                        .unwrap_or_else(|| Arc::new(ProvisioError::validation(&name, &result.message)));
                    return Ok(WorkflowSummary::from_results(
                        false,
                        format!("validation failed for step '{name}'"),
                        Some(error),
                        IndexMap::new(),
                        Some(name),
                        started_at,
                    ));
                }
            }
        }

        let deadline = tokio::time::sleep(self.options.deadline);
        tokio::pin!(deadline);

        let mut step_results = IndexMap::new();
        let mut executed_journal = Vec::new();
        let mut exit = LoopExit::Completed;

        for (index, configured) in self.steps.iter_mut().enumerate() {
            if configured.should_skip(context) {
                context
                    .logger()
                    .info(&format!("skipping step '{}'", configured.effective_name()));
                continue;
            }

            context.set_current_step(index + 1, total, configured.effective_name());
            let name = configured.effective_name().to_string();

            // biased: a cancellation or deadline already signalled before this
            // step's turn must win over the executor branch, so the step
            // never starts and never enters the journal.
            let step_outcome = tokio::select! {
                biased;
                () = context.cancellation().cancelled() => StepOutcome::Cancelled,
                () = &mut deadline => StepOutcome::DeadlineExceeded,
                result = self.executor.run(configured, context) => StepOutcome::Completed(result),
            };

            let result = match step_outcome {
                StepOutcome::Cancelled => {
                    exit = LoopExit::Cancelled;
                    break;
                }
                StepOutcome::DeadlineExceeded => {
                    exit = LoopExit::DeadlineExceeded;
                    break;
                }
                StepOutcome::Completed(result) => result,
            };

            let succeeded = result.success;
            executed_journal.push(name.clone());
            step_results.insert(name.clone(), result.clone());

            if succeeded {
                continue;
            }

            if configured.policy.continue_on_error {
                context.logger().warning(&format!(
                    "step '{name}' failed but continue_on_error is set: {}",
                    result.message
                ));
                continue;
            }

            exit = LoopExit::Failed(name, result);
            break;
        }

        match exit {
            LoopExit::Cancelled => {
                context
                    .logger()
                    .warning("workflow cancelled before the next step executed");
                if self.options.rollback_on_failure {
                    self.compensate(context, &executed_journal).await;
                }
                self.dispose_all(context, &executed_journal).await;
                Err(ProvisioError::Cancelled)
            }
            LoopExit::DeadlineExceeded => {
                let message = format!("workflow timed out after {:?}", self.options.deadline);
                context.logger().warning(&message);
                if self.options.rollback_on_failure {
                    self.compensate(context, &executed_journal).await;
                }
                self.dispose_all(context, &executed_journal).await;
                let mut summary = WorkflowSummary::from_results(
                    false,
                    message.clone(),
                    Some(Arc::new(ProvisioError::timeout(message, self.options.deadline))),
                    step_results,
                    None,
                    started_at,
                );
                summary.duration = started_at.elapsed();
                Ok(summary)
            }
            LoopExit::Completed => {
                self.dispose_all(context, &executed_journal).await;
                let mut summary = WorkflowSummary::from_results(
                    true,
                    "workflow completed",
                    None,
                    step_results,
                    None,
                    started_at,
                );
                summary.duration = started_at.elapsed();
                Ok(summary)
            }
            LoopExit::Failed(failed_name, result) => {
                if self.options.rollback_on_failure {
                    self.compensate(context, &executed_journal).await;
                }
                self.dispose_all(context, &executed_journal).await;
                let error = result
                    .error
                    .clone()
                    .unwrap_or_else(|| Arc::new(ProvisioError::execution(&failed_name, &result.message)));
                let mut summary = WorkflowSummary::from_results(
                    false,
                    format!("workflow failed at step '{failed_name}': {}", result.message),
                    Some(error),
                    step_results,
                    Some(failed_name),
                    started_at,
                );
                summary.duration = started_at.elapsed();
                Ok(summary)
            }
        }
    }

    /// Reverse-order rollback-only walk over every configured step, followed
    /// by an unconditional disposal sweep. No validation, retries, or
    /// timeouts apply.
    pub async fn uninstall(mut self, context: &Context) -> Result<WorkflowSummary, ProvisioError> {
        let started_at = Instant::now();
        let names: Vec<String> = self
            .steps
            .iter()
            .map(|configured| configured.effective_name().to_string())
            .collect();

        let mut uninstall_context = context.clone();
        uninstall_context.set_is_uninstall(true);

        self.compensate(&uninstall_context, &names).await;
        self.dispose_all(&uninstall_context, &names).await;

        Ok(WorkflowSummary::empty(true, "uninstall completed", None, started_at))
    }

    /// Runs the full forward algorithm restricted to the subset of steps
    /// whose effective name case-insensitively matches `names`. An empty
    /// `names` runs every step, matching `install`. A `names` list with no
    /// matching step returns a failure summary without touching any step.
    pub async fn repair(
        mut self,
        context: &Context,
        names: &[String],
    ) -> Result<WorkflowSummary, ProvisioError> {
        let started_at = Instant::now();

        if !names.is_empty() {
            let wanted: Vec<String> = names.iter().map(|name| name.to_lowercase()).collect();
            self.steps
                .retain(|configured| wanted.contains(&configured.effective_name().to_lowercase()));

            if self.steps.is_empty() {
                return Ok(WorkflowSummary::empty(
                    false,
                    "no steps matched the requested repair targets",
                    Some(ProvisioError::CallerError(
                        "no steps matched the requested repair targets".into(),
                    )),
                    started_at,
                ));
            }
        }

        self.install(context).await
    }

    /// Reverse-order, best-effort rollback over `names`. Never retries,
    /// never times out, never honors cancellation: every listed step gets a
    /// rollback attempt regardless of prior failures.
    async fn compensate(&mut self, context: &Context, names: &[String]) {
        let total = names.len();
        for (offset, name) in names.iter().enumerate().rev() {
            let Some(configured) = self
                .steps
                .iter_mut()
                .find(|configured| configured.effective_name() == name)
            else {
                continue;
            };
            context.set_current_step(offset + 1, total, name);
            let result = configured.step.rollback(context).await;
            if result.success {
                context
                    .logger()
                    .info(&format!("rollback completed for step '{name}' (best-effort)"));
            } else {
                context.logger().warning(&format!(
                    "rollback for step '{name}' did not complete cleanly (best-effort): {}",
                    result.message
                ));
            }
        }
    }

    /// Best-effort `dispose()` over `names`, the journal of steps that
    /// actually executed. A step absent from `names` never ran `execute`
    /// and must not receive `dispose` either. Failures are logged at
    /// warning level and never fail the run.
    async fn dispose_all(&mut self, context: &Context, names: &[String]) {
        for name in names {
            let Some(configured) = self
                .steps
                .iter_mut()
                .find(|configured| configured.effective_name() == name)
            else {
                continue;
            };
            let result = configured.step.dispose().await;
            if !result.success {
                context
                    .logger()
                    .warning(&format!("dispose leaked resources for step '{name}': {}", result.message));
            }
        }
    }
}
