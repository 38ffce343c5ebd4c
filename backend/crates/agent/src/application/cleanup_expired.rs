//! Cleanup Expired Use Case
//!
//! Physical deletion of dead rows. Correctness never depends on this:
//! every read compares timestamps instead of relying on absence.

use std::sync::Arc;

use pow::{ChallengeRepository, PowConfig};

use crate::application::config::AgentConfig;
use crate::domain::repository::{RateLimitRepository, ReceiptRepository};
use crate::error::AgentResult;

/// Rows removed by one cleanup run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub challenges: u64,
    pub receipts: u64,
    pub rate_windows: u64,
}

/// Cleanup expired use case
pub struct CleanupExpiredUseCase<C, L, P>
where
    C: ChallengeRepository,
    L: RateLimitRepository,
    P: ReceiptRepository,
{
    challenge_repo: Arc<C>,
    limit_repo: Arc<L>,
    receipt_repo: Arc<P>,
    pow_config: Arc<PowConfig>,
    config: Arc<AgentConfig>,
}

impl<C, L, P> CleanupExpiredUseCase<C, L, P>
where
    C: ChallengeRepository,
    L: RateLimitRepository,
    P: ReceiptRepository,
{
    pub fn new(
        challenge_repo: Arc<C>,
        limit_repo: Arc<L>,
        receipt_repo: Arc<P>,
        pow_config: Arc<PowConfig>,
        config: Arc<AgentConfig>,
    ) -> Self {
        Self {
            challenge_repo,
            limit_repo,
            receipt_repo,
            pow_config,
            config,
        }
    }

    pub async fn execute(&self) -> AgentResult<CleanupReport> {
        let now_ms = self.config.now_ms();
        let window_cutoff_ms = now_ms - self.config.longest_window().as_millis() as i64;

        let report = CleanupReport {
            challenges: self
                .challenge_repo
                .purge_expired(self.pow_config.now_ms())
                .await?,
            receipts: self.receipt_repo.purge_expired(now_ms).await?,
            rate_windows: self.limit_repo.purge_windows_before(window_cutoff_ms).await?,
        };

        tracing::info!(
            challenges = report.challenges,
            receipts = report.receipts,
            rate_windows = report.rate_windows,
            "Expired agent records purged"
        );

        Ok(report)
    }
}
