//! Authorize Action Use Case
//!
//! Second half of the action flow. A request moves through
//! key check -> proof -> rate limit -> receipt, and stops at the first
//! failure. Once the proof is accepted the challenge stays consumed even
//! if the rate limiter then says no, so a solved proof cannot be parked
//! and replayed later. A rate-limit slot is only kept once its receipt
//! is stored.

use std::sync::Arc;

use kernel::ActionKind;
use kernel::id::{ActionReceiptId, AgentKeyId, ChallengeId};
use platform::rate_limit::RateLimitSnapshot;
use pow::{ChallengeRepository, ChallengeScope, PowConfig, VerifySolutionInput, VerifySolutionUseCase};

use crate::application::config::AgentConfig;
use crate::application::rate_limiter::{RateDecision, RateLimiter};
use crate::application::resolve_agent::{AgentCredential, ResolveAgentUseCase};
use crate::domain::entity::ActionReceipt;
use crate::domain::repository::{AgentKeyRepository, RateLimitRepository, ReceiptRepository};
use crate::domain::value_object::ReceiptToken;
use crate::error::AgentResult;

/// Authorize action input
#[derive(Debug)]
pub struct AuthorizeActionInput {
    pub credential: AgentCredential,
    pub challenge_id: ChallengeId,
    pub nonce: String,
    pub action_kind: ActionKind,
}

/// Authorize action output
#[derive(Debug)]
pub struct AuthorizeActionOutput {
    pub receipt_id: ActionReceiptId,
    /// One-time bearer token for the downstream write
    pub receipt: ReceiptToken,
    pub agent_key_id: AgentKeyId,
    pub action_kind: ActionKind,
    pub expires_at_ms: i64,
    pub rate_limit: RateLimitSnapshot,
}

/// Authorize action use case
pub struct AuthorizeActionUseCase<C, K, L, P>
where
    C: ChallengeRepository,
    K: AgentKeyRepository,
    L: RateLimitRepository,
    P: ReceiptRepository,
{
    challenge_repo: Arc<C>,
    key_repo: Arc<K>,
    limit_repo: Arc<L>,
    receipt_repo: Arc<P>,
    pow_config: Arc<PowConfig>,
    config: Arc<AgentConfig>,
}

impl<C, K, L, P> AuthorizeActionUseCase<C, K, L, P>
where
    C: ChallengeRepository,
    K: AgentKeyRepository,
    L: RateLimitRepository,
    P: ReceiptRepository,
{
    pub fn new(
        challenge_repo: Arc<C>,
        key_repo: Arc<K>,
        limit_repo: Arc<L>,
        receipt_repo: Arc<P>,
        pow_config: Arc<PowConfig>,
        config: Arc<AgentConfig>,
    ) -> Self {
        Self {
            challenge_repo,
            key_repo,
            limit_repo,
            receipt_repo,
            pow_config,
            config,
        }
    }

    pub async fn execute(&self, input: AuthorizeActionInput) -> AgentResult<AuthorizeActionOutput> {
        // The key may have been revoked since the challenge was issued
        let key = ResolveAgentUseCase::new(self.key_repo.clone())
            .require_active(&input.credential)
            .await?;

        let verify = VerifySolutionUseCase::new(self.challenge_repo.clone(), self.pow_config.clone());
        let challenge = verify
            .execute(VerifySolutionInput {
                challenge_id: input.challenge_id,
                nonce: input.nonce,
                expected: ChallengeScope::action(key.id, input.action_kind),
            })
            .await?;

        let limiter = RateLimiter::new(self.limit_repo.clone(), self.config.clone());
        let snapshot = match limiter.check_and_increment(key.id, input.action_kind).await? {
            RateDecision::Allowed(snapshot) => snapshot,
            RateDecision::Denied(snapshot) => {
                tracing::warn!(
                    agent_key_id = %key.id,
                    challenge_id = %challenge.id,
                    "Valid proof spent on a full rate-limit window"
                );
                return Err(limiter.exceeded(&snapshot));
            }
        };

        let token = ReceiptToken::generate();
        let receipt = ActionReceipt::new(
            &token,
            key.id,
            input.action_kind,
            challenge.id,
            self.config.now_ms(),
            self.config.receipt_ttl_ms(),
        );

        // No receipt, no slot
        if let Err(e) = self.receipt_repo.create(&receipt).await {
            if let Err(release_err) = limiter.release(key.id, input.action_kind, &snapshot).await {
                tracing::error!(
                    agent_key_id = %key.id,
                    action_kind = %input.action_kind,
                    error = %release_err,
                    "Failed to release rate-limit slot"
                );
            }
            return Err(e);
        }

        // Counters only; the receipt is already valid
        if let Err(e) = self
            .key_repo
            .record_action(key.id, input.action_kind, self.config.clock.now())
            .await
        {
            tracing::warn!(
                agent_key_id = %key.id,
                action_kind = %input.action_kind,
                error = %e,
                "Failed to record agent action counters"
            );
        }

        tracing::info!(
            agent_key_id = %key.id,
            action_kind = %input.action_kind,
            receipt_id = %receipt.id,
            used = snapshot.used,
            ceiling = snapshot.ceiling,
            "Action authorized"
        );

        Ok(AuthorizeActionOutput {
            receipt_id: receipt.id,
            receipt: token,
            agent_key_id: key.id,
            action_kind: input.action_kind,
            expires_at_ms: receipt.expires_at_ms,
            rate_limit: snapshot,
        })
    }
}
