//! Execution parameters for multi-step tasks

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Smallest accepted per-step timeout
pub const MIN_STEP_TIMEOUT_SECONDS: u64 = 5;

/// Fixed allowance added to the step budget for task setup
pub const DEFAULT_SETUP_BUFFER: Duration = Duration::from_secs(30);

/// How a task loop is driven
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionMode {
    /// Exactly one step
    OneShot,
    /// Bounded loop; the caller decides when it is done
    MultiStep,
    /// Bounded loop that may stop early once confident
    Auto,
}

/// Validation failures for [`ExecutionParameters`]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionParamsError {
    #[error("maxSteps must be at least 1")]
    ZeroSteps,

    #[error("ONE_SHOT execution requires maxSteps = 1, got {0}")]
    OneShotWithMultipleSteps(u32),

    #[error("earlyCompletionThreshold must be within [0, 1], got {0}")]
    ThresholdOutOfRange(f64),

    #[error("stepTimeoutSeconds must be at least {min}, got {0}", min = MIN_STEP_TIMEOUT_SECONDS)]
    StepTimeoutTooShort(u64),
}

/// Policy bounding how many steps and how long a task loop may run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionParameters {
    pub max_steps: u32,
    pub execution_mode: ExecutionMode,
    pub allow_early_completion: bool,
    pub step_timeout_seconds: u64,
    pub capture_step_screenshots: bool,
    pub early_completion_threshold: f64,

    #[serde(skip, default = "default_setup_buffer")]
    pub setup_buffer: Duration,
}

fn default_setup_buffer() -> Duration {
    DEFAULT_SETUP_BUFFER
}

impl Default for ExecutionParameters {
    fn default() -> Self {
        Self::multi_step(10)
    }
}

impl ExecutionParameters {
    fn base(max_steps: u32, execution_mode: ExecutionMode, allow_early_completion: bool) -> Self {
        Self {
            max_steps,
            execution_mode,
            allow_early_completion,
            step_timeout_seconds: 30,
            capture_step_screenshots: false,
            early_completion_threshold: 0.8,
            setup_buffer: DEFAULT_SETUP_BUFFER,
        }
    }

    /// A single step, never completing early
    pub fn one_shot() -> Self {
        Self::base(1, ExecutionMode::OneShot, false)
    }

    /// Up to `max_steps` steps; a step may report that the task is finished
    pub fn multi_step(max_steps: u32) -> Self {
        Self::base(max_steps, ExecutionMode::MultiStep, true)
    }

    /// Up to `max_steps` steps, stopping once confidence reaches `threshold`
    pub fn auto(max_steps: u32, threshold: f64) -> Self {
        let mut params = Self::base(max_steps, ExecutionMode::Auto, true);
        params.early_completion_threshold = threshold;
        params
    }

    pub fn with_step_timeout_seconds(mut self, seconds: u64) -> Self {
        self.step_timeout_seconds = seconds;
        self
    }

    pub fn with_early_completion(mut self, allow: bool) -> Self {
        self.allow_early_completion = allow;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.early_completion_threshold = threshold;
        self
    }

    pub fn with_step_screenshots(mut self, capture: bool) -> Self {
        self.capture_step_screenshots = capture;
        self
    }

    pub fn with_setup_buffer(mut self, setup_buffer: Duration) -> Self {
        self.setup_buffer = setup_buffer;
        self
    }

    /// Check the invariants
    pub fn validate(&self) -> Result<(), ExecutionParamsError> {
        if self.max_steps < 1 {
            return Err(ExecutionParamsError::ZeroSteps);
        }
        if self.execution_mode == ExecutionMode::OneShot && self.max_steps > 1 {
            return Err(ExecutionParamsError::OneShotWithMultipleSteps(self.max_steps));
        }
        if !(0.0..=1.0).contains(&self.early_completion_threshold) {
            return Err(ExecutionParamsError::ThresholdOutOfRange(
                self.early_completion_threshold,
            ));
        }
        if self.step_timeout_seconds < MIN_STEP_TIMEOUT_SECONDS {
            return Err(ExecutionParamsError::StepTimeoutTooShort(self.step_timeout_seconds));
        }
        Ok(())
    }

    /// Whether the loop should stop after `current_step` completed steps.
    ///
    /// The step ceiling always wins. Below it, only AUTO mode with early
    /// completion allowed stops, and only once `confidence` reaches the
    /// threshold.
    pub fn should_stop_early(&self, current_step: u32, confidence: f64) -> bool {
        if current_step >= self.max_steps {
            return true;
        }
        if !self.allow_early_completion {
            return false;
        }
        self.execution_mode == ExecutionMode::Auto && confidence >= self.early_completion_threshold
    }

    /// Timeout for a single step
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_seconds)
    }

    /// Wall-clock budget for the whole task
    pub fn total_timeout(&self) -> Duration {
        self.step_timeout()
            .saturating_mul(self.max_steps)
            .saturating_add(self.setup_buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_shot_factory() {
        let params = ExecutionParameters::one_shot();
        assert_eq!(params.max_steps, 1);
        assert!(!params.allow_early_completion);
        assert_eq!(params.execution_mode, ExecutionMode::OneShot);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_validation_rejections() {
        let mut params = ExecutionParameters::multi_step(0);
        assert_eq!(params.validate(), Err(ExecutionParamsError::ZeroSteps));

        params = ExecutionParameters::one_shot();
        params.max_steps = 3;
        assert_eq!(
            params.validate(),
            Err(ExecutionParamsError::OneShotWithMultipleSteps(3))
        );

        for threshold in [-0.1, 1.01, f64::NAN] {
            let params = ExecutionParameters::auto(5, threshold);
            assert!(matches!(
                params.validate(),
                Err(ExecutionParamsError::ThresholdOutOfRange(_))
            ));
        }

        let params = ExecutionParameters::multi_step(3).with_step_timeout_seconds(4);
        assert_eq!(params.validate(), Err(ExecutionParamsError::StepTimeoutTooShort(4)));
        assert_eq!(
            ExecutionParamsError::StepTimeoutTooShort(4).to_string(),
            "stepTimeoutSeconds must be at least 5, got 4"
        );

        assert!(ExecutionParameters::auto(5, 0.0).validate().is_ok());
        assert!(ExecutionParameters::auto(5, 1.0).validate().is_ok());
    }

    #[test]
    fn test_ceiling_always_wins() {
        let params = ExecutionParameters::multi_step(3).with_early_completion(false);
        for confidence in [0.0, 0.5, 1.0] {
            assert!(params.should_stop_early(3, confidence));
            assert!(params.should_stop_early(4, confidence));
        }
        assert!(ExecutionParameters::one_shot().should_stop_early(1, 0.0));
    }

    #[test]
    fn test_no_early_completion_below_ceiling() {
        let params = ExecutionParameters::auto(10, 0.5).with_early_completion(false);
        for step in 0..10 {
            assert!(!params.should_stop_early(step, 1.0));
        }
    }

    #[test]
    fn test_auto_confidence_threshold() {
        let params = ExecutionParameters::auto(10, 0.8);
        assert!(!params.should_stop_early(3, 0.79));
        assert!(params.should_stop_early(4, 0.8));
        assert!(params.should_stop_early(4, 0.85));

        let multi = ExecutionParameters::multi_step(10);
        assert!(!multi.should_stop_early(4, 0.99));
    }

    #[test]
    fn test_total_timeout() {
        let params = ExecutionParameters::multi_step(4).with_step_timeout_seconds(10);
        assert_eq!(params.total_timeout(), Duration::from_secs(70));

        let params = params.with_setup_buffer(Duration::from_secs(5));
        assert_eq!(params.total_timeout(), Duration::from_secs(45));
    }

    #[test]
    fn test_serialization_shape() {
        let params = ExecutionParameters::auto(10, 0.8);
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["executionMode"], "AUTO");
        assert_eq!(json["maxSteps"], 10);
        assert_eq!(json["stepTimeoutSeconds"], 30);
        assert_eq!(json["earlyCompletionThreshold"], 0.8);
        assert!(json.get("setupBuffer").is_none());

        let parsed: ExecutionParameters = serde_json::from_value(serde_json::json!({
            "maxSteps": 1,
            "executionMode": "ONE_SHOT",
            "allowEarlyCompletion": false,
            "stepTimeoutSeconds": 15,
            "captureStepScreenshots": true,
            "earlyCompletionThreshold": 0.5
        }))
        .unwrap();
        assert_eq!(parsed.execution_mode, ExecutionMode::OneShot);
        assert_eq!(parsed.setup_buffer, DEFAULT_SETUP_BUFFER);
    }
}
