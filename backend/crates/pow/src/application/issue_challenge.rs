//! Issue Challenge Use Case

use crate::application::config::PowConfig;
use crate::domain::entities::Challenge;
use crate::domain::repository::ChallengeRepository;
use crate::domain::value_objects::{ChallengeScope, Difficulty, Prefix};
use crate::error::PowResult;
use chrono::{DateTime, Utc};
use kernel::id::ChallengeId;
use std::sync::Arc;

/// Input DTO for issue challenge
#[derive(Debug, Clone)]
pub struct IssueChallengeInput {
    pub scope: ChallengeScope,
    /// Server-side override (managed provisioning); never caller-supplied
    pub difficulty: Option<Difficulty>,
}

impl IssueChallengeInput {
    pub fn registration() -> Self {
        Self {
            scope: ChallengeScope::Registration,
            difficulty: None,
        }
    }

    pub fn for_scope(scope: ChallengeScope) -> Self {
        Self {
            scope,
            difficulty: None,
        }
    }
}

/// Output DTO for issue challenge
#[derive(Debug, Clone)]
pub struct IssueChallengeOutput {
    pub challenge_id: ChallengeId,
    pub scope: ChallengeScope,
    pub prefix: String,
    pub difficulty: Difficulty,
    pub expires_at: DateTime<Utc>,
    pub expires_at_ms: i64,
}

/// Issue Challenge Use Case
pub struct IssueChallengeUseCase<C>
where
    C: ChallengeRepository,
{
    challenge_repo: Arc<C>,
    config: Arc<PowConfig>,
}

impl<C> IssueChallengeUseCase<C>
where
    C: ChallengeRepository,
{
    pub fn new(challenge_repo: Arc<C>, config: Arc<PowConfig>) -> Self {
        Self {
            challenge_repo,
            config,
        }
    }

    pub async fn execute(&self, input: IssueChallengeInput) -> PowResult<IssueChallengeOutput> {
        let policy = self.config.policy(input.scope.kind());
        let difficulty = input.difficulty.unwrap_or(policy.difficulty);

        let challenge = Challenge::new(
            input.scope,
            Prefix::generate(self.config.prefix_bytes),
            difficulty,
            self.config.now_ms(),
            policy.ttl_ms(),
        );

        self.challenge_repo.put(&challenge).await?;

        tracing::info!(
            challenge_id = %challenge.id,
            kind = %challenge.scope.kind(),
            difficulty = difficulty.digits(),
            expires_at_ms = challenge.expires_at_ms,
            "Issued challenge"
        );

        Ok(IssueChallengeOutput {
            challenge_id: challenge.id,
            scope: challenge.scope,
            expires_at: challenge.expires_at(),
            expires_at_ms: challenge.expires_at_ms,
            prefix: challenge.prefix.as_str().to_string(),
            difficulty,
        })
    }
}
