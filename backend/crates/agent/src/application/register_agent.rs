//! Register Agent Use Case
//!
//! Trades a solved registration challenge for a new agent key.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use kernel::id::{AgentKeyId, ChallengeId};
use pow::{ChallengeRepository, ChallengeScope, PowConfig, VerifySolutionInput, VerifySolutionUseCase};

use crate::application::config::AgentConfig;
use crate::domain::entity::AgentKey;
use crate::domain::repository::AgentKeyRepository;
use crate::domain::value_object::{AgentName, AgentSecret, normalize_description};
use crate::error::{AgentError, AgentResult};

/// Register agent input
#[derive(Debug, Clone)]
pub struct RegisterAgentInput {
    pub challenge_id: ChallengeId,
    pub nonce: String,
    pub username: String,
    pub description: Option<String>,
}

/// Register agent output
///
/// The only value in the system that carries the plaintext secret.
#[derive(Debug)]
pub struct RegisterAgentOutput {
    pub agent_key_id: AgentKeyId,
    pub username: AgentName,
    pub secret: AgentSecret,
    pub key_hint: String,
    pub created_at: DateTime<Utc>,
}

/// Register agent use case
pub struct RegisterAgentUseCase<C, K>
where
    C: ChallengeRepository,
    K: AgentKeyRepository,
{
    challenge_repo: Arc<C>,
    key_repo: Arc<K>,
    pow_config: Arc<PowConfig>,
    config: Arc<AgentConfig>,
}

impl<C, K> RegisterAgentUseCase<C, K>
where
    C: ChallengeRepository,
    K: AgentKeyRepository,
{
    pub fn new(
        challenge_repo: Arc<C>,
        key_repo: Arc<K>,
        pow_config: Arc<PowConfig>,
        config: Arc<AgentConfig>,
    ) -> Self {
        Self {
            challenge_repo,
            key_repo,
            pow_config,
            config,
        }
    }

    pub async fn execute(&self, input: RegisterAgentInput) -> AgentResult<RegisterAgentOutput> {
        let username = AgentName::parse(&input.username)?;
        let description = normalize_description(input.description).map_err(AgentError::Validation)?;

        // Checked before the proof so a taken name does not burn the challenge
        if self.key_repo.exists_by_username(&username).await? {
            tracing::debug!(username = %username, "Registration for taken username");
            return Err(AgentError::UsernameTaken);
        }

        let verify = VerifySolutionUseCase::new(self.challenge_repo.clone(), self.pow_config.clone());
        let challenge = verify
            .execute(VerifySolutionInput {
                challenge_id: input.challenge_id,
                nonce: input.nonce,
                expected: ChallengeScope::Registration,
            })
            .await?;

        let secret = AgentSecret::generate(
            &self.config.secret_prefix,
            self.config.secret_random_bytes,
            self.config.now_ms(),
        );
        let key = AgentKey::new(username, description, &secret, self.config.clock.now());

        // The unique index settles a race between two registrations
        self.key_repo.create(&key).await?;

        tracing::info!(
            agent_key_id = %key.id,
            username = %key.username,
            challenge_id = %challenge.id,
            "Agent registered"
        );

        Ok(RegisterAgentOutput {
            agent_key_id: key.id,
            key_hint: key.key_hint,
            created_at: key.created_at,
            username: key.username,
            secret,
        })
    }
}
