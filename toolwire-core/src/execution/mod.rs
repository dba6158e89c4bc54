//! Execution control for multi-step tasks
//!
//! [`ExecutionParameters`] is the policy: how many steps a task may take, how
//! long each may run and when it may stop early. [`StepLoop`] applies that
//! policy to a caller-supplied step function.

mod params;
mod step_loop;

pub use params::{
    DEFAULT_SETUP_BUFFER, ExecutionMode, ExecutionParameters, ExecutionParamsError,
    MIN_STEP_TIMEOUT_SECONDS,
};
pub use step_loop::{StepContext, StepLoop, StepOutcome, StopReason, TaskReport};
