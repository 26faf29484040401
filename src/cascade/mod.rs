//! Action cascades: ordered alternative ways of reaching one goal.
//!
//! A [`Cascade`] pairs a list of [`Strategy`] values with a single
//! [`SuccessOracle`]. The [`CascadeExecutor`] runs each strategy once, in
//! order, under its own timeout, and after every attempt (whether it returned,
//! failed or timed out) re-derives success from the oracle. A strategy's own
//! result is never taken as evidence that the goal was reached.

pub mod oracle;
pub mod strategy;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, warn};

use crate::surface::Surface;

pub use oracle::SuccessOracle;
pub use strategy::Strategy;

/// Timeouts applied by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CascadeTiming {
    pub strategy_timeout: Duration,
    pub oracle_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for CascadeTiming {
    fn default() -> Self {
        Self {
            strategy_timeout: Duration::from_secs(5),
            oracle_timeout: Duration::from_secs(8),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// One goal with its ordered strategies and the oracle that confirms it.
pub struct Cascade {
    pub goal: String,
    strategies: Vec<Box<dyn Strategy>>,
    oracle: Box<dyn SuccessOracle>,
    oracle_timeout: Option<Duration>,
}

impl Cascade {
    pub fn new(goal: impl Into<String>, oracle: impl SuccessOracle + 'static) -> Self {
        Self {
            goal: goal.into(),
            strategies: Vec::new(),
            oracle: Box::new(oracle),
            oracle_timeout: None,
        }
    }

    /// Appends a strategy after the existing ones.
    pub fn then(mut self, strategy: impl Strategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Overrides the executor's oracle timeout for this goal.
    pub fn confirm_within(mut self, limit: Duration) -> Self {
        self.oracle_timeout = Some(limit);
        self
    }

    pub fn oracle(&self) -> &dyn SuccessOracle {
        self.oracle.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptResult {
    Completed,
    Failed(String),
    TimedOut,
}

/// Record of one strategy invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub strategy: String,
    pub result: AttemptResult,
    pub confirmed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CascadeOutcome {
    Confirmed { strategy: String, attempts: Vec<Attempt> },
    Exhausted { attempts: Vec<Attempt> },
}

impl CascadeOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, CascadeOutcome::Confirmed { .. })
    }

    pub fn attempts(&self) -> &[Attempt] {
        match self {
            CascadeOutcome::Confirmed { attempts, .. } | CascadeOutcome::Exhausted { attempts } => {
                attempts
            }
        }
    }

    /// One-line summary of every attempt, for error messages.
    pub fn summary(&self) -> String {
        self.attempts()
            .iter()
            .map(|a| match &a.result {
                AttemptResult::Completed => format!("{}: no effect", a.strategy),
                AttemptResult::Failed(e) => format!("{}: {e}", a.strategy),
                AttemptResult::TimedOut => format!("{}: timed out", a.strategy),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Runs cascades against a surface.
#[derive(Debug, Clone, Default)]
pub struct CascadeExecutor {
    pub timing: CascadeTiming,
}

impl CascadeExecutor {
    pub fn new(timing: CascadeTiming) -> Self {
        Self { timing }
    }

    pub async fn execute(&self, surface: &dyn Surface, cascade: &Cascade) -> CascadeOutcome {
        let oracle_limit = cascade.oracle_timeout.unwrap_or(self.timing.oracle_timeout);
        let mut attempts = Vec::with_capacity(cascade.strategies.len());

        for strategy in &cascade.strategies {
            let name = strategy.name();
            debug!(goal = %cascade.goal, strategy = %name, "trying strategy");

            let limit = strategy.time_limit().unwrap_or(self.timing.strategy_timeout);
            let result = match timeout(limit, strategy.attempt(surface)).await {
                Ok(Ok(())) => AttemptResult::Completed,
                Ok(Err(e)) => AttemptResult::Failed(e.to_string()),
                Err(_) => AttemptResult::TimedOut,
            };
            if result != AttemptResult::Completed {
                debug!(goal = %cascade.goal, strategy = %name, ?result, "strategy did not complete");
            }

            let confirmed = self.confirm(surface, cascade.oracle(), oracle_limit).await;
            attempts.push(Attempt {
                strategy: name.clone(),
                result,
                confirmed,
            });

            if confirmed {
                info!(goal = %cascade.goal, strategy = %name, "goal confirmed");
                return CascadeOutcome::Confirmed {
                    strategy: name,
                    attempts,
                };
            }
        }

        warn!(
            goal = %cascade.goal,
            oracle = %cascade.oracle().describe(),
            tried = attempts.len(),
            "all strategies exhausted"
        );
        CascadeOutcome::Exhausted { attempts }
    }

    /// Polls the oracle until it confirms or `limit` elapses.
    pub async fn confirm(
        &self,
        surface: &dyn Surface,
        oracle: &dyn SuccessOracle,
        limit: Duration,
    ) -> bool {
        let deadline = Instant::now() + limit;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match timeout(remaining.max(Duration::from_millis(1)), oracle.check(surface)).await {
                Ok(Ok(true)) => return true,
                Ok(Ok(false)) => {}
                Ok(Err(e)) => debug!(oracle = %oracle.describe(), error = %e, "oracle check failed"),
                Err(_) => return false,
            }
            if Instant::now() + self.timing.poll_interval > deadline {
                return false;
            }
            sleep(self.timing.poll_interval).await;
        }
    }
}
