//! Provision Managed Agent Use Case
//!
//! The server registers an agent on an operator's behalf: it issues a
//! cheap registration challenge, mines it within the configured budget,
//! and redeems it through the normal registration path.

use std::sync::Arc;

use pow::{ChallengeRepository, IssueChallengeInput, IssueChallengeUseCase, MineSolutionUseCase, PowConfig};

use crate::application::config::AgentConfig;
use crate::application::register_agent::{
    RegisterAgentInput, RegisterAgentOutput, RegisterAgentUseCase,
};
use crate::domain::repository::AgentKeyRepository;
use crate::domain::value_object::AgentName;
use crate::error::{AgentError, AgentResult};

/// Provision managed agent input
#[derive(Debug, Clone)]
pub struct ProvisionManagedAgentInput {
    pub username: String,
    pub description: Option<String>,
}

/// Provision managed agent use case
pub struct ProvisionManagedAgentUseCase<C, K>
where
    C: ChallengeRepository,
    K: AgentKeyRepository,
{
    challenge_repo: Arc<C>,
    key_repo: Arc<K>,
    pow_config: Arc<PowConfig>,
    config: Arc<AgentConfig>,
}

impl<C, K> ProvisionManagedAgentUseCase<C, K>
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

    pub async fn execute(
        &self,
        input: ProvisionManagedAgentInput,
    ) -> AgentResult<RegisterAgentOutput> {
        // Don't spend CPU on a name we would reject anyway
        let username = AgentName::parse(&input.username)?;
        if self.key_repo.exists_by_username(&username).await? {
            return Err(AgentError::UsernameTaken);
        }

        let issued = IssueChallengeUseCase::new(self.challenge_repo.clone(), self.pow_config.clone())
            .execute(IssueChallengeInput {
                difficulty: Some(self.config.managed_difficulty),
                ..IssueChallengeInput::registration()
            })
            .await?;

        let solution = MineSolutionUseCase::new(self.pow_config.mining)
            .execute(&issued.prefix, issued.difficulty)
            .await?;

        let output = RegisterAgentUseCase::new(
            self.challenge_repo.clone(),
            self.key_repo.clone(),
            self.pow_config.clone(),
            self.config.clone(),
        )
        .execute(RegisterAgentInput {
            challenge_id: issued.challenge_id,
            nonce: solution.nonce,
            username: input.username,
            description: input.description,
        })
        .await?;

        tracing::info!(
            agent_key_id = %output.agent_key_id,
            attempts = solution.attempts,
            elapsed_ms = solution.elapsed.as_millis() as u64,
            "Managed agent provisioned"
        );

        Ok(output)
    }
}
