//! # Pipeline Budget
//!
//! Wall-clock budget for a full pipeline run. Exceeding the budget is the
//! only error class that aborts a run; every other stage failure degrades
//! into a warning.

use std::time::{Duration, Instant};

use thiserror::Error;

/// Default wall-clock allowance for one pipeline run.
pub const DEFAULT_BUDGET_SECS: u64 = 120;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("budget exceeded before {step}: {elapsed_secs}s elapsed, {allowed_secs}s allowed")]
    BudgetExceeded {
        step: String,
        elapsed_secs: u64,
        allowed_secs: u64,
    },
}

/// Started clock checked before each pipeline step.
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    started: Instant,
    allowed: Duration,
}

impl Budget {
    pub fn start(allowed: Duration) -> Self {
        Self {
            started: Instant::now(),
            allowed,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Fail if the clock has already run out before `step` begins.
    pub fn check(&self, step: &str) -> Result<(), PipelineError> {
        let elapsed = self.started.elapsed();
        if elapsed > self.allowed {
            return Err(PipelineError::BudgetExceeded {
                step: step.to_string(),
                elapsed_secs: elapsed.as_secs(),
                allowed_secs: self.allowed.as_secs(),
            });
        }
        Ok(())
    }
}

impl Default for Budget {
    fn default() -> Self {
        Self::start(Duration::from_secs(DEFAULT_BUDGET_SECS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_budget_passes() {
        let budget = Budget::start(Duration::from_secs(60));
        assert!(budget.check("router").is_ok());
    }

    #[test]
    fn test_exhausted_budget_names_step() {
        let budget = Budget::start(Duration::ZERO);
        std::thread::sleep(Duration::from_millis(5));
        let err = budget.check("builder").unwrap_err();
        assert!(err.to_string().contains("builder"));
    }
}
