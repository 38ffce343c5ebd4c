//! Bounded Server-Side Mining
//!
//! Used when the server solves a challenge on a caller's behalf. The
//! search runs on the blocking pool, capped by attempts and wall clock.

use crate::application::config::MiningBudget;
use crate::domain::services::{MineOutcome, mine};
use crate::domain::value_objects::Difficulty;
use crate::error::{PowError, PowResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// A nonce found within budget
#[derive(Debug, Clone)]
pub struct MinedSolution {
    pub nonce: String,
    pub attempts: u64,
    pub elapsed: Duration,
}

/// Mine Solution Use Case
#[derive(Debug, Clone, Copy)]
pub struct MineSolutionUseCase {
    budget: MiningBudget,
}

impl MineSolutionUseCase {
    pub fn new(budget: MiningBudget) -> Self {
        Self { budget }
    }

    pub async fn execute(&self, prefix: &str, difficulty: Difficulty) -> PowResult<MinedSolution> {
        let started = Instant::now();
        let cancel = Arc::new(AtomicBool::new(false));
        let worker_cancel = cancel.clone();
        let prefix = prefix.to_string();
        let max_attempts = self.budget.max_attempts;

        let mut handle = tokio::task::spawn_blocking(move || {
            mine(&prefix, difficulty, max_attempts, &worker_cancel)
        });

        let joined = match tokio::time::timeout(self.budget.time_budget, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                // The worker checks the flag every few thousand hashes
                cancel.store(true, Ordering::Relaxed);
                tracing::warn!(
                    difficulty = difficulty.digits(),
                    budget_ms = self.budget.time_budget.as_millis() as u64,
                    "Mining deadline reached, cancelling"
                );
                handle.await
            }
        };
        let outcome = joined.map_err(|e| PowError::Internal(format!("miner task failed: {e}")))?;

        match outcome {
            MineOutcome::Found { nonce, attempts } => {
                let elapsed = started.elapsed();
                tracing::info!(
                    difficulty = difficulty.digits(),
                    attempts = attempts,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Mined challenge"
                );
                Ok(MinedSolution {
                    nonce,
                    attempts,
                    elapsed,
                })
            }
            MineOutcome::Exhausted { attempts } | MineOutcome::Cancelled { attempts } => {
                Err(PowError::MiningTimedOut { attempts })
            }
        }
    }
}
