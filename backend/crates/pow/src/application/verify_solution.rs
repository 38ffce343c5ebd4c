//! Verify Solution Use Case

use crate::application::config::PowConfig;
use crate::domain::entities::Challenge;
use crate::domain::repository::{ChallengeRepository, ConsumeOutcome};
use crate::domain::services::verify_pow;
use crate::domain::value_objects::{ChallengeScope, Nonce};
use crate::error::{PowError, PowResult};
use kernel::id::ChallengeId;
use std::sync::Arc;

/// Input DTO for verify solution
#[derive(Debug, Clone)]
pub struct VerifySolutionInput {
    pub challenge_id: ChallengeId,
    pub nonce: String,
    /// Scope the caller claims; must equal the stored one
    pub expected: ChallengeScope,
}

/// Verify Solution Use Case
///
/// Order of checks: existence, expiry, scope, hash, then the atomic
/// consume. Only the consume step mutates state, so a rejected proof
/// leaves the challenge solvable until it expires.
pub struct VerifySolutionUseCase<C>
where
    C: ChallengeRepository,
{
    challenge_repo: Arc<C>,
    config: Arc<PowConfig>,
}

impl<C> VerifySolutionUseCase<C>
where
    C: ChallengeRepository,
{
    pub fn new(challenge_repo: Arc<C>, config: Arc<PowConfig>) -> Self {
        Self {
            challenge_repo,
            config,
        }
    }

    /// Returns the challenge as it was at consumption time
    pub async fn execute(&self, input: VerifySolutionInput) -> PowResult<Challenge> {
        let nonce = Nonce::parse(&input.nonce)?;

        let mut challenge = self
            .challenge_repo
            .get(input.challenge_id)
            .await?
            .ok_or(PowError::ChallengeNotFound)?;

        if challenge.is_expired_at(self.config.now_ms()) {
            tracing::warn!(challenge_id = %challenge.id, "Challenge expired");
            return Err(PowError::ChallengeExpired);
        }

        if challenge.scope != input.expected {
            tracing::warn!(
                challenge_id = %challenge.id,
                issued_for = ?challenge.scope,
                claimed = ?input.expected,
                "Challenge scope mismatch"
            );
            return Err(PowError::ActionMismatch);
        }

        // Difficulty always comes from the stored challenge
        if !verify_pow(challenge.prefix.as_str(), nonce.as_str(), challenge.difficulty) {
            tracing::warn!(
                challenge_id = %challenge.id,
                difficulty = challenge.difficulty.digits(),
                "Invalid nonce"
            );
            return Err(PowError::ProofInvalid);
        }

        match self
            .challenge_repo
            .try_consume(challenge.id, self.config.now_ms())
            .await?
        {
            ConsumeOutcome::Consumed => {
                challenge.consumed_at = Some(self.config.clock.now());
                tracing::info!(
                    challenge_id = %challenge.id,
                    kind = %challenge.scope.kind(),
                    "PoW verification successful"
                );
                Ok(challenge)
            }
            ConsumeOutcome::AlreadyConsumed => {
                tracing::warn!(challenge_id = %challenge.id, "Proof already used");
                Err(PowError::ProofAlreadyUsed)
            }
            ConsumeOutcome::Expired => Err(PowError::ChallengeExpired),
            ConsumeOutcome::NotFound => Err(PowError::ChallengeNotFound),
        }
    }
}
