//! ABOUTME: The retry(timeout(base)) decorator chain wrapping a single step invocation
//! ABOUTME: Retries wrap timeouts so each attempt gets a fresh deadline

use crate::context::Context;
use crate::step::{ConfiguredStep, StepResult};
use async_trait::async_trait;
use futures::FutureExt;
use provisio_core::ProvisioError;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// A single layer (or the whole stack) of the executor chain. Consumes a
/// configured step, a context, and returns a [`StepResult`].
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn run(&self, configured: &mut ConfiguredStep, context: &Context) -> StepResult;
}

/// Builds the canonical `retry(timeout(base))` chain.
#[must_use]
pub fn executor_chain() -> Arc<dyn StepExecutor> {
    Arc::new(RetryExecutor::new(Arc::new(TimeoutExecutor::new(Arc::new(
        BaseExecutor,
    )))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "step panicked with a non-string payload".to_string()
    }
}

/// Observes cancellation, then calls `step.execute(context)` and returns its
/// result verbatim. A panic inside the step is caught and folded into an
/// `ExecutionFailed` result rather than unwinding across the engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct BaseExecutor;

#[async_trait]
impl StepExecutor for BaseExecutor {
    async fn run(&self, configured: &mut ConfiguredStep, context: &Context) -> StepResult {
        if context.cancellation().is_cancelled() {
            return StepResult::failure_with_error("execution cancelled", ProvisioError::Cancelled);
        }

        let name = configured.effective_name().to_string();
        match AssertUnwindSafe(configured.step.execute(context))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(&*payload);
                StepResult::failure_with_error(
                    format!("step '{name}' panicked: {message}"),
                    ProvisioError::execution(name, message),
                )
            }
        }
    }
}

/// If `policy.timeout` is set, races the inner executor against that
/// duration (and against the shared cancellation token). If the timer wins
/// and the outer cancellation did not, returns a distinguishable timeout
/// failure; if the outer cancellation wins, that propagates out as a
/// `Cancelled` result.
pub struct TimeoutExecutor {
    inner: Arc<dyn StepExecutor>,
}

impl TimeoutExecutor {
    #[must_use]
    pub fn new(inner: Arc<dyn StepExecutor>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl StepExecutor for TimeoutExecutor {
    async fn run(&self, configured: &mut ConfiguredStep, context: &Context) -> StepResult {
        let Some(duration) = configured.policy.timeout else {
            return self.inner.run(configured, context).await;
        };

        tokio::select! {
            biased;
            () = context.cancellation().cancelled() => {
                StepResult::failure_with_error("execution cancelled", ProvisioError::Cancelled)
            }
            () = tokio::time::sleep(duration) => {
                let name = configured.effective_name().to_string();
                StepResult::failure_with_error(
                    format!("Step timed out after {duration:?}"),
                    ProvisioError::timeout(format!("step '{name}' timed out"), duration),
                )
            }
            result = self.inner.run(configured, context) => result,
        }
    }
}

/// If `policy.retries == 0`, passes through. Otherwise attempts up to
/// `retries + 1` times, logging a warning and retrying between attempts.
/// Cancellation is never retried — it propagates immediately.
pub struct RetryExecutor {
    inner: Arc<dyn StepExecutor>,
}

impl RetryExecutor {
    #[must_use]
    pub fn new(inner: Arc<dyn StepExecutor>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl StepExecutor for RetryExecutor {
    async fn run(&self, configured: &mut ConfiguredStep, context: &Context) -> StepResult {
        let retries = configured.policy.retries;
        if retries == 0 {
            return self.inner.run(configured, context).await;
        }

        let mut last = StepResult::failure("retry loop produced no attempts");
        for attempt in 0..=retries {
            let result = self.inner.run(configured, context).await;
            let cancelled = matches!(result.error.as_deref(), Some(ProvisioError::Cancelled));
            if result.success || cancelled || attempt == retries {
                return result;
            }

            context.logger().warning(&format!(
                "retrying step '{}' (attempt {}/{}): {}",
                configured.effective_name(),
                attempt + 1,
                retries + 1,
                result.message
            ));
            last = result;
        }
        last
    }
}
