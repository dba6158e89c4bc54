//! A caller-driven loop of steps governed by [`ExecutionParameters`]
//!
//! Cancellation is checked before each step starts. A step already in
//! flight is never interrupted by cancellation; it either completes or is
//! cut off by the step timeout. The loop as a whole is bounded by the total
//! budget.

use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;

use super::params::{ExecutionParameters, ExecutionParamsError};

/// What a step is told about where it sits in the task
#[derive(Debug, Clone)]
pub struct StepContext {
    /// 1-based index of this step
    pub step: u32,

    pub max_steps: u32,

    /// Time this step is allowed to take
    pub step_timeout: Duration,

    /// Confidence reported by the previous step
    pub previous_confidence: Option<f64>,

    /// Screenshot capture requested for each step
    pub capture_screenshot: bool,

    /// The task's cancellation token
    pub cancellation: CancellationToken,
}

/// What a step reports back
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    /// Completion certainty in [0, 1]
    pub confidence: f64,

    /// The caller considers the task done
    pub finished: bool,

    pub output: Option<Value>,
}

impl StepOutcome {
    /// Outcome with the given confidence
    pub fn new(confidence: f64) -> Self {
        Self {
            confidence,
            finished: false,
            output: None,
        }
    }

    /// Mark the task as finished
    pub fn finished(mut self) -> Self {
        self.finished = true;
        self
    }

    pub fn with_output(mut self, output: Value) -> Self {
        self.output = Some(output);
        self
    }
}

/// Why the loop ended
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    /// The step ceiling was reached
    MaxSteps,
    /// AUTO mode reached the confidence threshold
    Confident { confidence: f64 },
    /// A step reported the task finished
    CallerFinished,
    /// Cancelled before the next step started
    Cancelled,
    /// A step exceeded its timeout
    StepTimedOut { step: u32, timeout: Duration },
    /// The total budget ran out
    TotalTimeout { budget: Duration },
    /// A step returned an error
    StepFailed { step: u32, message: String },
}

impl StopReason {
    /// Whether the task ended on its own terms
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            StopReason::MaxSteps | StopReason::Confident { .. } | StopReason::CallerFinished
        )
    }
}

/// Summary of a finished loop
#[derive(Debug, Clone)]
pub struct TaskReport {
    /// Steps started, including one that failed or timed out
    pub steps_executed: u32,
    pub stop_reason: StopReason,
    /// Outcomes of the steps that completed
    pub outcomes: Vec<StepOutcome>,
    pub elapsed: Duration,
}

/// Runs steps until the policy says stop
#[derive(Debug, Clone)]
pub struct StepLoop {
    params: ExecutionParameters,
    cancellation: CancellationToken,
}

impl StepLoop {
    /// Create a loop; the parameters are validated once here
    pub fn new(params: ExecutionParameters) -> Result<Self, ExecutionParamsError> {
        params.validate()?;
        Ok(Self {
            params,
            cancellation: CancellationToken::new(),
        })
    }

    /// Use an existing cancellation token
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Token that cancels the loop before its next step
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn params(&self) -> &ExecutionParameters {
        &self.params
    }

    /// Drive `step` until the policy, the caller, a failure or the budget
    /// ends the task
    pub async fn run<F, Fut>(&self, mut step: F) -> TaskReport
    where
        F: FnMut(StepContext) -> Fut,
        Fut: Future<Output = anyhow::Result<StepOutcome>>,
    {
        let params = &self.params;
        let started = Instant::now();
        let budget = params.total_timeout();
        let deadline = started + budget;
        let step_timeout = params.step_timeout();

        let mut outcomes: Vec<StepOutcome> = Vec::new();
        let mut current: u32 = 0;

        let stop_reason = loop {
            if self.cancellation.is_cancelled() {
                tracing::info!(completed = current, "Task cancelled before next step");
                break StopReason::Cancelled;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break StopReason::TotalTimeout { budget };
            }

            current += 1;
            let allowed = step_timeout.min(remaining);
            let ctx = StepContext {
                step: current,
                max_steps: params.max_steps,
                step_timeout: allowed,
                previous_confidence: outcomes.last().map(|o| o.confidence),
                capture_screenshot: params.capture_step_screenshots,
                cancellation: self.cancellation.clone(),
            };

            tracing::debug!(step = current, max_steps = params.max_steps, "Starting step");

            let outcome = match timeout(allowed, step(ctx)).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(error)) => {
                    tracing::warn!(step = current, error = ?error, "Step failed");
                    break StopReason::StepFailed {
                        step: current,
                        message: error.to_string(),
                    };
                }
                Err(_) if allowed < step_timeout => {
                    tracing::warn!(step = current, budget_ms = budget.as_millis() as u64, "Task budget exhausted");
                    break StopReason::TotalTimeout { budget };
                }
                Err(_) => {
                    tracing::warn!(step = current, timeout_ms = allowed.as_millis() as u64, "Step timed out");
                    break StopReason::StepTimedOut {
                        step: current,
                        timeout: allowed,
                    };
                }
            };

            let confidence = if outcome.confidence.is_nan() {
                0.0
            } else {
                outcome.confidence.clamp(0.0, 1.0)
            };
            let finished = outcome.finished;
            outcomes.push(outcome);

            if params.should_stop_early(current, confidence) {
                if current >= params.max_steps {
                    break StopReason::MaxSteps;
                }
                break StopReason::Confident { confidence };
            }
            if finished && params.allow_early_completion {
                break StopReason::CallerFinished;
            }
        };

        let elapsed = started.elapsed();
        tracing::info!(
            steps = current,
            reason = ?stop_reason,
            elapsed_ms = elapsed.as_millis() as u64,
            "Task loop finished"
        );

        TaskReport {
            steps_executed: current,
            stop_reason,
            outcomes,
            elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_auto_stops_on_confidence() {
        let looper = StepLoop::new(ExecutionParameters::auto(10, 0.8)).unwrap();
        let report = looper
            .run(|ctx| async move {
                let confidence = if ctx.step >= 4 { 0.85 } else { 0.2 * ctx.step as f64 };
                Ok(StepOutcome::new(confidence))
            })
            .await;

        assert_eq!(report.steps_executed, 4);
        assert_eq!(report.stop_reason, StopReason::Confident { confidence: 0.85 });
        assert_eq!(report.outcomes.len(), 4);
    }

    #[tokio::test]
    async fn test_ceiling_reached() {
        let looper = StepLoop::new(ExecutionParameters::multi_step(3)).unwrap();
        let report = looper.run(|_| async { Ok(StepOutcome::new(1.0)) }).await;
        assert_eq!(report.steps_executed, 3);
        assert_eq!(report.stop_reason, StopReason::MaxSteps);
        assert!(report.stop_reason.is_success());
    }

    #[tokio::test]
    async fn test_one_shot_runs_once() {
        let looper = StepLoop::new(ExecutionParameters::one_shot()).unwrap();
        let report = looper.run(|_| async { Ok(StepOutcome::new(0.0)) }).await;
        assert_eq!(report.steps_executed, 1);
        assert_eq!(report.stop_reason, StopReason::MaxSteps);
    }

    #[tokio::test]
    async fn test_caller_finished() {
        let looper = StepLoop::new(ExecutionParameters::multi_step(10)).unwrap();
        let report = looper
            .run(|ctx| async move {
                let outcome = StepOutcome::new(0.1).with_output(serde_json::json!({"step": ctx.step}));
                Ok(if ctx.step == 2 { outcome.finished() } else { outcome })
            })
            .await;
        assert_eq!(report.steps_executed, 2);
        assert_eq!(report.stop_reason, StopReason::CallerFinished);

        let strict = StepLoop::new(ExecutionParameters::multi_step(3).with_early_completion(false)).unwrap();
        let report = strict
            .run(|_| async { Ok(StepOutcome::new(0.1).finished()) })
            .await;
        assert_eq!(report.steps_executed, 3);
    }

    #[tokio::test]
    async fn test_cancellation_between_steps() {
        let looper = StepLoop::new(ExecutionParameters::multi_step(10)).unwrap();
        let token = looper.cancellation_token();
        let runs = Arc::new(AtomicU32::new(0));

        let report = looper
            .run(|ctx| {
                let runs = Arc::clone(&runs);
                let token = token.clone();
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    if ctx.step == 2 {
                        token.cancel();
                    }
                    Ok(StepOutcome::new(0.0))
                }
            })
            .await;

        // The step that requested cancellation still completes
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.stop_reason, StopReason::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_timeout_cuts_off() {
        let looper = StepLoop::new(ExecutionParameters::multi_step(5).with_step_timeout_seconds(5)).unwrap();
        let report = looper
            .run(|ctx| async move {
                if ctx.step == 2 {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                Ok(StepOutcome::new(0.0))
            })
            .await;

        assert_eq!(report.steps_executed, 2);
        assert_eq!(
            report.stop_reason,
            StopReason::StepTimedOut {
                step: 2,
                timeout: Duration::from_secs(5)
            }
        );
        assert!(!report.stop_reason.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_budget() {
        let params = ExecutionParameters::multi_step(3)
            .with_step_timeout_seconds(10)
            .with_setup_buffer(Duration::ZERO);
        let looper = StepLoop::new(params).unwrap();

        // Steps running just under their own timeout still fit the budget
        let report = looper
            .run(|_| async {
                tokio::time::sleep(Duration::from_millis(9_999)).await;
                Ok(StepOutcome::new(0.0))
            })
            .await;
        assert_eq!(report.stop_reason, StopReason::MaxSteps);
        assert_eq!(report.steps_executed, 3);
    }

    #[tokio::test]
    async fn test_step_failure() {
        let looper = StepLoop::new(ExecutionParameters::multi_step(5)).unwrap();
        let report = looper
            .run(|ctx| async move {
                if ctx.step == 3 {
                    anyhow::bail!("element not found");
                }
                Ok(StepOutcome::new(0.0))
            })
            .await;
        assert_eq!(
            report.stop_reason,
            StopReason::StepFailed {
                step: 3,
                message: "element not found".to_string()
            }
        );
        assert_eq!(report.outcomes.len(), 2);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let err = StepLoop::new(ExecutionParameters::auto(5, 2.0)).unwrap_err();
        assert!(matches!(err, ExecutionParamsError::ThresholdOutOfRange(_)));
    }
}
