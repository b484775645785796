//! ABOUTME: Transactional installation workflow engine
//! ABOUTME: Step contract, the retry(timeout(base)) executor chain, and the WorkflowEngine that drives both

pub mod context;
pub mod engine;
pub mod executor;
mod privilege;
pub mod sinks;
pub mod step;
pub mod steps;

pub use context::{Context, ContextBuilder};
pub use engine::{WorkflowEngine, WorkflowOptions, WorkflowSummary};
pub use executor::{executor_chain, BaseExecutor, RetryExecutor, StepExecutor, TimeoutExecutor};
pub use sinks::{NullLogSink, TracingLogSink};
pub use step::{ConfiguredStep, Step, StepPolicy, StepResult};
