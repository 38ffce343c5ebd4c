//! Rate Limiter
//!
//! Fixed-window ceilings per `(agent key, action kind)`. The window
//! arithmetic comes from `platform::rate_limit`; the counter itself is
//! incremented by a single conditional write in the repository.

use crate::application::config::AgentConfig;
use crate::domain::repository::RateLimitRepository;
use crate::error::{AgentError, AgentResult};
use kernel::ActionKind;
use kernel::id::AgentKeyId;
use platform::rate_limit::RateLimitSnapshot;
use std::sync::Arc;

/// Outcome of `check_and_increment`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Slot taken; snapshot includes it
    Allowed(RateLimitSnapshot),
    /// Ceiling already reached; nothing was written
    Denied(RateLimitSnapshot),
}

pub struct RateLimiter<L>
where
    L: RateLimitRepository,
{
    repo: Arc<L>,
    config: Arc<AgentConfig>,
}

impl<L> RateLimiter<L>
where
    L: RateLimitRepository,
{
    pub fn new(repo: Arc<L>, config: Arc<AgentConfig>) -> Self {
        Self { repo, config }
    }

    /// Take one slot in the current window if the ceiling allows it
    pub async fn check_and_increment(
        &self,
        agent_key_id: AgentKeyId,
        kind: ActionKind,
    ) -> AgentResult<RateDecision> {
        let limit = self.config.rate_limit(kind);
        let window = limit.window_at(self.config.now_ms());

        let counted = if limit.max_requests == 0 {
            None
        } else {
            self.repo
                .check_and_increment(agent_key_id, kind, window.start_ms, limit.max_requests)
                .await?
        };

        match counted {
            Some(used) => Ok(RateDecision::Allowed(RateLimitSnapshot {
                used,
                ceiling: limit.max_requests,
                reset_at_ms: window.end_ms,
            })),
            None => {
                tracing::warn!(
                    agent_key_id = %agent_key_id,
                    action_kind = %kind,
                    ceiling = limit.max_requests,
                    "Rate limit ceiling reached"
                );
                Ok(RateDecision::Denied(RateLimitSnapshot {
                    used: limit.max_requests,
                    ceiling: limit.max_requests,
                    reset_at_ms: window.end_ms,
                }))
            }
        }
    }

    /// Return the slot recorded in `snapshot` to its window
    pub async fn release(
        &self,
        agent_key_id: AgentKeyId,
        kind: ActionKind,
        snapshot: &RateLimitSnapshot,
    ) -> AgentResult<()> {
        let window_start_ms = snapshot.reset_at_ms - self.config.rate_limit(kind).window_ms();
        self.repo.release(agent_key_id, kind, window_start_ms).await
    }

    /// Read-only view of the current window
    pub async fn peek(
        &self,
        agent_key_id: AgentKeyId,
        kind: ActionKind,
    ) -> AgentResult<RateLimitSnapshot> {
        let limit = self.config.rate_limit(kind);
        let window = limit.window_at(self.config.now_ms());
        let used = self
            .repo
            .current_count(agent_key_id, kind, window.start_ms)
            .await?;

        Ok(RateLimitSnapshot {
            used,
            ceiling: limit.max_requests,
            reset_at_ms: window.end_ms,
        })
    }

    /// Fail fast when the window is already full
    pub async fn ensure_available(
        &self,
        agent_key_id: AgentKeyId,
        kind: ActionKind,
    ) -> AgentResult<RateLimitSnapshot> {
        let snapshot = self.peek(agent_key_id, kind).await?;
        if snapshot.is_exhausted() {
            return Err(self.exceeded(&snapshot));
        }
        Ok(snapshot)
    }

    pub fn exceeded(&self, snapshot: &RateLimitSnapshot) -> AgentError {
        AgentError::RateLimitExceeded {
            retry_after_secs: snapshot.retry_after_secs(self.config.now_ms()),
        }
    }
}
