//! Request Action Challenge Use Case
//!
//! First half of the action flow: hand out an action-scoped challenge,
//! but only to an active key that still has budget in its window.

use std::sync::Arc;

use kernel::ActionKind;
use pow::{
    ChallengeRepository, ChallengeScope, IssueChallengeInput, IssueChallengeOutput,
    IssueChallengeUseCase, PowConfig,
};

use crate::application::config::AgentConfig;
use crate::application::rate_limiter::RateLimiter;
use crate::application::resolve_agent::{AgentCredential, ResolveAgentUseCase};
use crate::domain::repository::{AgentKeyRepository, RateLimitRepository};
use crate::error::AgentResult;

/// Request action challenge input
#[derive(Debug)]
pub struct RequestActionChallengeInput {
    pub credential: AgentCredential,
    pub action_kind: ActionKind,
}

/// Request action challenge use case
pub struct RequestActionChallengeUseCase<C, K, L>
where
    C: ChallengeRepository,
    K: AgentKeyRepository,
    L: RateLimitRepository,
{
    challenge_repo: Arc<C>,
    key_repo: Arc<K>,
    limit_repo: Arc<L>,
    pow_config: Arc<PowConfig>,
    config: Arc<AgentConfig>,
}

impl<C, K, L> RequestActionChallengeUseCase<C, K, L>
where
    C: ChallengeRepository,
    K: AgentKeyRepository,
    L: RateLimitRepository,
{
    pub fn new(
        challenge_repo: Arc<C>,
        key_repo: Arc<K>,
        limit_repo: Arc<L>,
        pow_config: Arc<PowConfig>,
        config: Arc<AgentConfig>,
    ) -> Self {
        Self {
            challenge_repo,
            key_repo,
            limit_repo,
            pow_config,
            config,
        }
    }

    pub async fn execute(
        &self,
        input: RequestActionChallengeInput,
    ) -> AgentResult<IssueChallengeOutput> {
        let key = ResolveAgentUseCase::new(self.key_repo.clone())
            .require_active(&input.credential)
            .await?;

        // No point making the agent mine for a slot it cannot get
        RateLimiter::new(self.limit_repo.clone(), self.config.clone())
            .ensure_available(key.id, input.action_kind)
            .await?;

        let issue = IssueChallengeUseCase::new(self.challenge_repo.clone(), self.pow_config.clone());
        let output = issue
            .execute(IssueChallengeInput::for_scope(ChallengeScope::action(
                key.id,
                input.action_kind,
            )))
            .await?;

        tracing::debug!(
            agent_key_id = %key.id,
            action_kind = %input.action_kind,
            challenge_id = %output.challenge_id,
            "Action challenge issued"
        );

        Ok(output)
    }
}
